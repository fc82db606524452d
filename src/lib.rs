// Obfusbot Library - security-code gated JavaScript obfuscation over Telegram
// This exposes the core components for testing and integration

pub mod bot;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod pending;
pub mod progress;
pub mod security_code;
pub mod staging;
pub mod telegram;
pub mod telemetry;

// Re-export key types for easy access
pub use bot::Bot;
pub use challenge::{validate, ChallengeOutcome};
pub use config::ObfusbotConfig;
pub use engine::{CommandEngine, EngineError, ObfuscationEngine, ObfuscationProfile};
pub use orchestrator::{Orchestrator, TransformOutcome};
pub use pending::{PendingRequest, PendingSnapshot, PendingStore, CODE_TTL_SECS};
pub use progress::{ProgressHandle, ProgressReporter, PROGRESS_FRAMES};
pub use security_code::{generate_security_code, CODE_ALPHABET, DEFAULT_CODE_LENGTH};
pub use staging::StagedSource;
pub use telegram::{ChatTransport, MessageId, RequesterId, TelegramClient, TelegramError};
pub use telemetry::{create_update_span, generate_correlation_id, init_telemetry};
