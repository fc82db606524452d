// Chat transport - delivery and retrieval of messages over the Telegram Bot API
//
// The rest of the crate only depends on the `ChatTransport` trait; the
// reqwest-backed client is the production implementation.

pub mod client;
pub mod errors;
pub mod types;

pub use client::TelegramClient;
pub use errors::TelegramError;
pub use types::{
    CallbackQuery, Chat, Document, InlineButton, InlineKeyboard, Message, MessageId, RequesterId,
    Update, User,
};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Outbound side of the chat transport.
///
/// Inbound updates are polled by the binary directly from the concrete
/// client; everything the core flow sends out goes through this trait so
/// tests can substitute a recording transport.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver a text message, returning the id needed to edit it later.
    async fn send_message(&self, to: RequesterId, text: &str)
        -> Result<MessageId, TelegramError>;

    /// Replace the text of a previously sent message.
    async fn edit_message_text(
        &self,
        to: RequesterId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError>;

    /// Deliver a photo by URL, optionally with an inline keyboard.
    async fn send_photo(
        &self,
        to: RequesterId,
        photo_url: &str,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), TelegramError>;

    /// Deliver a document from in-memory bytes.
    async fn send_document(
        &self,
        to: RequesterId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError>;

    /// Fetch the raw bytes of an uploaded document.
    async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError>;
}
