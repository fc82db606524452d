// Obfuscation engine collaborator - a black box mapping source text to
// obfuscated text, or failing

use serde::Serialize;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Fixed obfuscation options handed to the engine, mirroring the js-confuser
/// option names. Not user-tunable; [`ObfuscationProfile::high`] is the only
/// profile this bot uses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscationProfile {
    pub target: String,
    pub preset: String,
    pub compact: bool,
    pub minify: bool,
    pub flatten: bool,
    pub string_encoding: bool,
    pub string_concealing: bool,
    pub string_compression: bool,
    pub control_flow_flattening: f64,
    pub opaque_predicates: f64,
    pub dispatcher: bool,
}

impl ObfuscationProfile {
    /// Maximal obfuscation/compaction preset.
    pub fn high() -> Self {
        Self {
            target: "node".to_string(),
            preset: "high".to_string(),
            compact: true,
            minify: true,
            flatten: true,
            string_encoding: true,
            string_concealing: true,
            string_compression: true,
            control_flow_flattening: 1.0,
            opaque_predicates: 0.9,
            dispatcher: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to run obfuscator: {0}")]
    Io(#[from] std::io::Error),

    #[error("obfuscator exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("obfuscator produced non-utf8 output")]
    InvalidOutput(#[from] std::string::FromUtf8Error),

    #[error("failed to encode profile: {0}")]
    Profile(#[from] serde_json::Error),
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait ObfuscationEngine: Send + Sync {
    /// Transform `source` according to `profile`. Pure with respect to this
    /// crate's state; may fail on malformed input or internal engine limits.
    async fn obfuscate(
        &self,
        source: &str,
        profile: &ObfuscationProfile,
    ) -> Result<String, EngineError>;
}

/// Production engine: pipes source through an external obfuscator process.
///
/// The source arrives on stdin, the profile as JSON in the
/// `OBFUSBOT_PROFILE` environment variable, and the obfuscated output is
/// read from stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait::async_trait]
impl ObfuscationEngine for CommandEngine {
    async fn obfuscate(
        &self,
        source: &str,
        profile: &ObfuscationProfile,
    ) -> Result<String, EngineError> {
        let profile_json = serde_json::to_string(profile)?;
        debug!(program = %self.program, "invoking obfuscation engine");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("OBFUSBOT_PROFILE", profile_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}
