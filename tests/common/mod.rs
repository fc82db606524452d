// Recording test doubles shared by the integration tests - no side effects

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use obfusbot::config::ObfusbotConfig;
use obfusbot::engine::{EngineError, ObfuscationEngine, ObfuscationProfile};
use obfusbot::telegram::{ChatTransport, InlineKeyboard, MessageId, RequesterId, TelegramError};

/// Chat transport that records every outbound call and serves document
/// downloads from an in-memory map.
#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Mutex<Vec<(RequesterId, String)>>,
    pub edits: Mutex<Vec<(RequesterId, MessageId, String)>>,
    pub documents: Mutex<Vec<(RequesterId, String, Vec<u8>, String)>>,
    pub photos: Mutex<Vec<(RequesterId, String)>>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    next_message_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn messages_to(&self, to: RequesterId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == to)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn documents_to(&self, to: RequesterId) -> Vec<(String, Vec<u8>, String)> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, ..)| *recipient == to)
            .map(|(_, name, bytes, caption)| (name.clone(), bytes.clone(), caption.clone()))
            .collect()
    }

    /// All recorded traffic (messages, edits, documents, photos) aimed at
    /// `to`. Used to prove the operator channel stayed silent.
    pub fn total_calls_to(&self, to: RequesterId) -> usize {
        self.messages_to(to).len()
            + self.documents_to(to).len()
            + self
                .edits
                .lock()
                .unwrap()
                .iter()
                .filter(|(recipient, ..)| *recipient == to)
                .count()
            + self
                .photos
                .lock()
                .unwrap()
                .iter()
                .filter(|(recipient, _)| *recipient == to)
                .count()
    }
}

#[async_trait::async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        to: RequesterId,
        text: &str,
    ) -> Result<MessageId, TelegramError> {
        self.messages.lock().unwrap().push((to, text.to_string()));
        Ok(MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message_text(
        &self,
        to: RequesterId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.edits
            .lock()
            .unwrap()
            .push((to, message_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(
        &self,
        to: RequesterId,
        photo_url: &str,
        _caption: &str,
        _keyboard: Option<InlineKeyboard>,
    ) -> Result<(), TelegramError> {
        self.photos.lock().unwrap().push((to, photo_url.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        to: RequesterId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        self.documents
            .lock()
            .unwrap()
            .push((to, file_name.to_string(), bytes, caption.to_string()));
        Ok(())
    }

    async fn download_document(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| TelegramError::MissingFilePath {
                file_id: file_id.to_string(),
            })
    }
}

/// Engine double that counts invocations and either echoes a marked copy of
/// the source or fails.
pub struct ScriptedEngine {
    pub calls: AtomicUsize,
    fail: bool,
}

impl ScriptedEngine {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ObfuscationEngine for ScriptedEngine {
    async fn obfuscate(
        &self,
        source: &str,
        _profile: &ObfuscationProfile,
    ) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::Failed {
                code: Some(1),
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(format!("OBF::{source}"))
    }
}

/// Config pointed at a temp staging dir, with a fast progress cadence.
pub fn test_config(staging_dir: &std::path::Path, owner_id: Option<i64>) -> Arc<ObfusbotConfig> {
    let mut config = ObfusbotConfig::default();
    config.telegram.owner_id = owner_id;
    config.staging.dir = staging_dir.to_path_buf();
    config.progress.interval_ms = 10;
    Arc::new(config)
}
