//! End-to-end flows through the update dispatcher with recording doubles:
//! request creation, challenge acceptance, engine failure, operator policy.

mod common;

use common::{test_config, RecordingTransport, ScriptedEngine};
use obfusbot::bot::Bot;
use obfusbot::engine::ObfuscationEngine;
use obfusbot::pending::PendingStore;
use obfusbot::telegram::{ChatTransport, RequesterId, Update};
use std::sync::Arc;

const USER: RequesterId = RequesterId(42);
const OWNER: RequesterId = RequesterId(999);

fn encrypt_request_update(update_id: i64) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": 2,
            "chat": { "id": 42 },
            "from": { "id": 42, "first_name": "Ada", "username": "ada" },
            "text": "/encinv",
            "reply_to_message": {
                "message_id": 1,
                "chat": { "id": 42 },
                "document": { "file_id": "f1", "file_name": "app.js" }
            }
        }
    }))
    .unwrap()
}

fn text_update(update_id: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": 3,
            "chat": { "id": 42 },
            "from": { "id": 42, "first_name": "Ada", "username": "ada" },
            "text": text
        }
    }))
    .unwrap()
}

/// Pull the security code out of the prompt message sent to the user.
fn issued_code(transport: &RecordingTransport) -> String {
    let prompt = transport
        .messages_to(USER)
        .into_iter()
        .find(|text| text.contains("Security Code"))
        .expect("security code prompt was sent");
    prompt.split('*').nth(1).expect("code in prompt").to_string()
}

struct Harness {
    transport: Arc<RecordingTransport>,
    engine: Arc<ScriptedEngine>,
    store: Arc<PendingStore>,
    bot: Bot,
    _staging: tempfile::TempDir,
}

fn harness(engine: Arc<ScriptedEngine>, owner_id: Option<i64>) -> Harness {
    let staging = tempfile::tempdir().unwrap();
    let transport = RecordingTransport::new();
    transport.add_file("f1", b"console.log(1)");
    let store = Arc::new(PendingStore::new());
    let config = test_config(staging.path(), owner_id);
    let bot = Bot::new(
        transport.clone() as Arc<dyn ChatTransport>,
        engine.clone() as Arc<dyn ObfuscationEngine>,
        store.clone(),
        config,
    );
    Harness {
        transport,
        engine,
        store,
        bot,
        _staging: staging,
    }
}

fn staged_file_count(harness: &Harness) -> usize {
    std::fs::read_dir(harness._staging.path())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn accepted_code_transforms_exactly_once() {
    let h = harness(ScriptedEngine::succeeding(), Some(OWNER.0));

    h.bot.handle_update(encrypt_request_update(1)).await;
    assert!(h.store.contains(USER).await);
    assert_eq!(staged_file_count(&h), 1);

    // the code round-trips case-insensitively
    let code = issued_code(&h.transport).to_ascii_lowercase();
    h.bot.handle_update(text_update(2, &code)).await;

    assert_eq!(h.engine.call_count(), 1);
    assert!(h.store.is_empty().await);
    assert_eq!(staged_file_count(&h), 0);

    let delivered = h.transport.documents_to(USER);
    assert_eq!(delivered.len(), 1);
    let (name, bytes, caption) = &delivered[0];
    assert_eq!(name, "enc_app.js");
    assert_eq!(bytes.as_slice(), b"OBF::console.log(1)");
    assert!(caption.contains("Encrypted file"));

    // operator got the request notice and a copy of the output
    assert_eq!(h.transport.documents_to(OWNER).len(), 1);
    assert!(h
        .transport
        .messages_to(OWNER)
        .iter()
        .any(|text| text.contains("requested encrypt for app.js")));
}

#[tokio::test]
async fn replaying_a_consumed_code_does_nothing() {
    let h = harness(ScriptedEngine::succeeding(), None);

    h.bot.handle_update(encrypt_request_update(1)).await;
    let code = issued_code(&h.transport);
    h.bot.handle_update(text_update(2, &code)).await;
    assert_eq!(h.engine.call_count(), 1);

    h.bot.handle_update(text_update(3, &code)).await;
    assert_eq!(h.engine.call_count(), 1);
    assert_eq!(h.transport.documents_to(USER).len(), 1);
}

#[tokio::test]
async fn wrong_code_is_silently_ignored_and_record_survives() {
    let h = harness(ScriptedEngine::succeeding(), Some(OWNER.0));

    h.bot.handle_update(encrypt_request_update(1)).await;
    let messages_before = h.transport.messages_to(USER).len();

    let wrong = if issued_code(&h.transport) == "WRONG1" {
        "WRONG2"
    } else {
        "WRONG1"
    };
    h.bot.handle_update(text_update(2, wrong)).await;

    assert_eq!(h.engine.call_count(), 0);
    assert!(h.store.contains(USER).await);
    assert_eq!(staged_file_count(&h), 1);
    // no reply at all on a mismatch
    assert_eq!(h.transport.messages_to(USER).len(), messages_before);

    // the stored record is still valid: the right code works afterwards
    let code = issued_code(&h.transport);
    h.bot.handle_update(text_update(3, &code)).await;
    assert_eq!(h.engine.call_count(), 1);
}

#[tokio::test]
async fn engine_failure_notifies_requester_and_skips_operator() {
    let h = harness(ScriptedEngine::failing(), Some(OWNER.0));

    h.bot.handle_update(encrypt_request_update(1)).await;
    let code = issued_code(&h.transport);
    let operator_messages_before = h.transport.messages_to(OWNER).len();

    h.bot.handle_update(text_update(2, &code)).await;

    assert_eq!(h.engine.call_count(), 1);
    assert!(h.store.is_empty().await);
    assert_eq!(staged_file_count(&h), 0);
    assert!(h.transport.documents_to(USER).is_empty());

    // failure lands as the final progress edit
    let failed = h
        .transport
        .edits
        .lock()
        .unwrap()
        .iter()
        .any(|(to, _, text)| *to == USER && text.contains("Obfuscation failed"));
    assert!(failed);

    // no output copy and no extra chatter for the operator on this path
    assert!(h.transport.documents_to(OWNER).is_empty());
    assert_eq!(h.transport.messages_to(OWNER).len(), operator_messages_before);
}

#[tokio::test]
async fn missing_operator_means_zero_operator_calls() {
    let h = harness(ScriptedEngine::succeeding(), None);

    h.bot.handle_update(encrypt_request_update(1)).await;
    let code = issued_code(&h.transport);
    h.bot.handle_update(text_update(2, &code)).await;

    assert_eq!(h.engine.call_count(), 1);
    assert_eq!(h.transport.documents_to(USER).len(), 1);
    assert_eq!(h.transport.total_calls_to(OWNER), 0);
}

#[tokio::test]
async fn encinv_without_a_js_document_creates_no_state() {
    let h = harness(ScriptedEngine::succeeding(), None);

    h.bot.handle_update(text_update(1, "/encinv")).await;

    assert!(h.store.is_empty().await);
    assert_eq!(staged_file_count(&h), 0);
    assert!(h
        .transport
        .messages_to(USER)
        .iter()
        .any(|text| text.contains("reply to a .js file")));
}

#[tokio::test]
async fn failed_download_creates_no_state() {
    let h = harness(ScriptedEngine::succeeding(), None);

    let update: Update = serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 2,
            "chat": { "id": 42 },
            "text": "/encinv",
            "reply_to_message": {
                "message_id": 1,
                "chat": { "id": 42 },
                "document": { "file_id": "unknown", "file_name": "app.js" }
            }
        }
    }))
    .unwrap();
    h.bot.handle_update(update).await;

    assert!(h.store.is_empty().await);
    assert_eq!(staged_file_count(&h), 0);
    assert!(h
        .transport
        .messages_to(USER)
        .iter()
        .any(|text| text.contains("Failed to download")));
}

#[tokio::test]
async fn second_request_supersedes_and_releases_the_first() {
    let h = harness(ScriptedEngine::succeeding(), None);

    h.bot.handle_update(encrypt_request_update(1)).await;
    let first_code = issued_code(&h.transport);
    h.bot.handle_update(encrypt_request_update(2)).await;

    assert_eq!(h.store.len().await, 1);
    assert_eq!(staged_file_count(&h), 1);

    // the superseded code is dead; only the fresh one is honored
    let codes: Vec<String> = h
        .transport
        .messages_to(USER)
        .into_iter()
        .filter(|text| text.contains("Security Code"))
        .map(|text| text.split('*').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(codes.len(), 2);
    let second_code = codes[1].clone();

    if first_code != second_code {
        h.bot.handle_update(text_update(3, &first_code)).await;
        assert_eq!(h.engine.call_count(), 0);
    }

    h.bot.handle_update(text_update(4, &second_code)).await;
    assert_eq!(h.engine.call_count(), 1);
}
