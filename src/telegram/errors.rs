use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    /// The Bot API answered with `ok: false`.
    #[error("telegram api rejected the call: {0}")]
    Api(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// `getFile` succeeded but returned no downloadable path.
    #[error("document {file_id} has no retrievable file path")]
    MissingFilePath { file_id: String },
}
