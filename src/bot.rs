// Update dispatcher - wires incoming Telegram events to the pending-request
// state machine

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::challenge::{validate, ChallengeOutcome};
use crate::config::ObfusbotConfig;
use crate::engine::ObfuscationEngine;
use crate::orchestrator::Orchestrator;
use crate::pending::{PendingRequest, PendingStore};
use crate::security_code::{generate_security_code, DEFAULT_CODE_LENGTH};
use crate::staging::StagedSource;
use crate::telegram::{
    CallbackQuery, ChatTransport, InlineKeyboard, Message, RequesterId, Update, User,
};

const USAGE_TEXT: &str = "⚠️ Please reply to a .js file with /encinv to encrypt it.";
const DOWNLOAD_FAILED_TEXT: &str = "❌ Failed to download the file.";
const EXPIRED_TEXT: &str = "⏰ Security code expired. Please run /encinv again.";

pub struct Bot {
    transport: Arc<dyn ChatTransport>,
    engine: Arc<dyn ObfuscationEngine>,
    store: Arc<PendingStore>,
    config: Arc<ObfusbotConfig>,
}

impl Bot {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        engine: Arc<dyn ObfuscationEngine>,
        store: Arc<PendingStore>,
        config: Arc<ObfusbotConfig>,
    ) -> Self {
        Self {
            transport,
            engine,
            store,
            config,
        }
    }

    /// Entry point for one polled update. Failures are logged here; nothing
    /// propagates far enough to take the process down.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        if let Err(e) = self.dispatch(update).await {
            error!(update_id, error = %e, "update handling failed");
        }
    }

    async fn dispatch(&self, update: Update) -> Result<()> {
        if let Some(callback) = update.callback_query {
            return self.handle_callback(callback).await;
        }
        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }
        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(text) = message.text.clone() else {
            // non-text messages (stickers, uploads without a caption) carry
            // no challenge reply and no command
            return Ok(());
        };

        if text.starts_with("/start") {
            return self.handle_start(&message).await;
        }
        if text.starts_with("/encinv") {
            return self.handle_encrypt_request(&message).await;
        }
        self.handle_code_reply(&message, &text).await
    }

    async fn handle_start(&self, message: &Message) -> Result<()> {
        let requester = RequesterId(message.chat.id);
        let first_name = message
            .from
            .as_ref()
            .map(|user| user.first_name.as_str())
            .unwrap_or("there");

        let keyboard = InlineKeyboard::default()
            .row("⚡ Enc Menu", "enc_menu")
            .row("📖 Help", "help")
            .row("👤 About", "about");

        let caption = format!(
            "👋 Welcome *{first_name}*!\n\n🤖 This is *{}*",
            self.config.display.bot_name
        );
        self.transport
            .send_photo(
                requester,
                &self.config.display.welcome_photo_url,
                &caption,
                Some(keyboard),
            )
            .await?;
        Ok(())
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> Result<()> {
        let Some(chat_id) = callback.message.as_ref().map(|m| m.chat.id) else {
            return Ok(());
        };
        let requester = RequesterId(chat_id);
        let display = &self.config.display;

        match callback.data.as_deref() {
            Some("help") | Some("enc_menu") => {
                let text = format!(
                    "📖 *How to use {}*:\n\n\
                     1. Upload a .js file\n\
                     2. Reply the file with the command /encinv\n\
                     3. Enter Security Code when prompted\n\
                     4. Wait for the encrypted file",
                    display.bot_name
                );
                self.transport.send_message(requester, &text).await?;
            }
            Some("about") => {
                let owner_line = match self.config.telegram.owner_id {
                    Some(owner_id) => format!("🆔 ID: {owner_id}\n"),
                    None => String::new(),
                };
                let text = format!(
                    "👤 *About*\n\n🤖 Bot: {}\n👑 Owner: {}\n{}📦 Version: {}",
                    display.bot_name, display.owner_name, owner_line, display.version
                );
                self.transport.send_message(requester, &text).await?;
            }
            other => debug!(?other, "ignoring unknown callback data"),
        }
        Ok(())
    }

    /// `/encinv` replying to an uploaded `.js` document: stage the file,
    /// issue a security code, and park the request until the code comes back.
    async fn handle_encrypt_request(&self, message: &Message) -> Result<()> {
        let requester = RequesterId(message.chat.id);

        let document = message
            .reply_to_message
            .as_ref()
            .and_then(|reply| reply.document.as_ref());
        let Some(document) = document else {
            self.transport.send_message(requester, USAGE_TEXT).await?;
            return Ok(());
        };
        let Some(file_name) = document
            .file_name
            .as_deref()
            .filter(|name| name.ends_with(".js"))
        else {
            self.transport.send_message(requester, USAGE_TEXT).await?;
            return Ok(());
        };

        let bytes = match self.transport.download_document(&document.file_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%requester, error = %e, "document download failed");
                self.transport
                    .send_message(requester, DOWNLOAD_FAILED_TEXT)
                    .await?;
                return Ok(());
            }
        };

        let staged = match StagedSource::stage(&self.config.staging.dir, file_name, &bytes).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(%requester, error = %e, "staging failed");
                self.transport
                    .send_message(requester, DOWNLOAD_FAILED_TEXT)
                    .await?;
                return Ok(());
            }
        };

        let code = generate_security_code(DEFAULT_CODE_LENGTH);
        let record = PendingRequest::new(
            requester,
            file_name.to_string(),
            code.clone(),
            staged,
            Utc::now(),
        );
        // The record must be in the store before the prompt goes out, so a
        // fast reply always finds it.
        self.store.put(record).await;
        info!(%requester, file = %file_name, "pending request created");

        self.transport
            .send_message(
                requester,
                &format!(
                    "🔒 Security Code: *{code}*\n\n\
                     This code is valid for 1 minute. Reply this message with the code to continue."
                ),
            )
            .await?;

        let who = describe_user(message.from.as_ref(), requester);
        self.notify_operator(&format!("📢 User {who} requested encrypt for {file_name}"))
            .await;
        Ok(())
    }

    /// Any other text message: check it against the pending store. Wrong
    /// codes and unrelated chatter are deliberately ignored so the code gate
    /// never becomes a guessing oracle.
    async fn handle_code_reply(&self, message: &Message, text: &str) -> Result<()> {
        let requester = RequesterId(message.chat.id);

        match validate(&self.store, requester, text, Utc::now()).await {
            ChallengeOutcome::NoPending | ChallengeOutcome::Rejected => Ok(()),
            ChallengeOutcome::Expired => {
                self.transport.send_message(requester, EXPIRED_TEXT).await?;
                Ok(())
            }
            ChallengeOutcome::Accepted(record) => {
                let who = describe_user(message.from.as_ref(), requester);
                let orchestrator = Orchestrator::new(
                    self.transport.clone(),
                    self.engine.clone(),
                    self.config.clone(),
                );
                orchestrator.run(record, &who).await;
                Ok(())
            }
        }
    }

    /// Best-effort operator notification; a missing owner id makes this a
    /// no-op and delivery failures are swallowed.
    async fn notify_operator(&self, text: &str) {
        let Some(owner_id) = self.config.telegram.owner_id else {
            return;
        };
        if let Err(e) = self
            .transport
            .send_message(RequesterId(owner_id), text)
            .await
        {
            debug!(owner_id, error = %e, "operator notification failed, ignoring");
        }
    }
}

fn describe_user(user: Option<&User>, requester: RequesterId) -> String {
    match user {
        Some(user) => format!("{} ({})", user.display(), user.id),
        None => format!("chat {requester}"),
    }
}
