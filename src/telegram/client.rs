use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::errors::TelegramError;
use super::types::{InlineKeyboard, MessageId, RequesterId, Update};
use super::ChatTransport;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Rate-limited Telegram Bot API client.
///
/// Telegram allows roughly 30 messages per second bot-wide but throttles much
/// lower per chat, so outbound calls go through a conservative 1 req/s limiter
/// with burst capacity rather than risking 429 storms during progress edits.
#[derive(Debug)]
pub struct TelegramClient {
    http: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    // no serde(default) here: it would force a T: Default bound on the
    // derived impl, and a missing field already deserializes to None
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self, TelegramError> {
        Self::with_base_url(token, TELEGRAM_API_BASE.to_string())
    }

    /// Point the client at a different API host. Used by tests to run against
    /// a local mock server.
    pub fn with_base_url(token: String, base_url: String) -> Result<Self, TelegramError> {
        let quota = Quota::per_second(NonZeroU32::new(1).unwrap())
            .allow_burst(NonZeroU32::new(10).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            rate_limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        debug!(method, "calling telegram bot api");
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        Self::unwrap_response(response.json().await?)
    }

    fn unwrap_response<T>(response: ApiResponse<T>) -> Result<T, TelegramError> {
        if !response.ok {
            return Err(TelegramError::Api(
                response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        response
            .result
            .ok_or_else(|| TelegramError::Api("ok response without result".to_string()))
    }

    /// Long-poll for the next batch of updates. `offset` must be one past the
    /// highest update id already processed.
    pub async fn next_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .json(&json!({ "offset": offset, "timeout": timeout_secs }))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await?;
        Self::unwrap_response(response.json().await?)
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        to: RequesterId,
        text: &str,
    ) -> Result<MessageId, TelegramError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({ "chat_id": to.0, "text": text, "parse_mode": "Markdown" }),
            )
            .await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_message_text(
        &self,
        to: RequesterId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "editMessageText",
            json!({ "chat_id": to.0, "message_id": message_id.0, "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        to: RequesterId,
        photo_url: &str,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "chat_id": to.0,
            "photo": photo_url,
            "caption": caption,
            "parse_mode": "Markdown",
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| TelegramError::Api(format!("unserializable keyboard: {e}")))?;
        }
        self.call::<serde_json::Value>("sendPhoto", body).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        to: RequesterId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let form = Form::new()
            .text("chat_id", to.0.to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name.to_string()));

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;
        Self::unwrap_response::<serde_json::Value>(response.json().await?)?;
        Ok(())
    }

    async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        let info: FileInfo = self.call("getFile", json!({ "file_id": file_id })).await?;
        let file_path = info.file_path.ok_or_else(|| TelegramError::MissingFilePath {
            file_id: file_id.to_string(),
        })?;

        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, file_path);
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(120))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
