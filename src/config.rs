use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Obfusbot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObfusbotConfig {
    /// Telegram transport settings
    pub telegram: TelegramConfig,
    /// Display strings used in chat copy
    pub display: DisplayConfig,
    /// Staged-file handling
    pub staging: StagingConfig,
    /// External obfuscation engine invocation
    pub engine: EngineConfig,
    /// Progress animation settings
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot API token (can be set via env var)
    pub bot_token: Option<String>,
    /// Operator chat id for best-effort notifications; absent means all
    /// operator steps become no-ops
    pub owner_id: Option<i64>,
    /// Long-poll timeout in seconds
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub bot_name: String,
    pub owner_name: String,
    pub version: String,
    /// Photo shown with the /start welcome message
    pub welcome_photo_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// Directory temporary copies of uploads are written to
    pub dir: std::path::PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Obfuscator executable; receives source on stdin, profile JSON in
    /// OBFUSBOT_PROFILE, and writes output to stdout
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Milliseconds between progress-bar edits
    pub interval_ms: u64,
}

impl Default for ObfusbotConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: None, // read from env at load time
                owner_id: None,
                poll_timeout_secs: 30,
            },
            display: DisplayConfig {
                bot_name: "Obfusbot".to_string(),
                owner_name: "unknown".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                welcome_photo_url: "https://files.catbox.moe/yc6qsr.jpg".to_string(),
            },
            staging: StagingConfig {
                dir: std::path::PathBuf::from(".obfusbot/staging"),
            },
            engine: EngineConfig {
                program: "js-confuser".to_string(),
                args: vec![],
            },
            progress: ProgressConfig { interval_ms: 1000 },
        }
    }
}

impl ObfusbotConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (obfusbot.toml)
    /// 3. Environment variables (prefixed with OBFUSBOT_)
    pub fn load() -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&ObfusbotConfig::default())?);

        if Path::new("obfusbot.toml").exists() {
            builder = builder.add_source(File::with_name("obfusbot"));
        }

        builder = builder.add_source(
            Environment::with_prefix("OBFUSBOT")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ObfusbotConfig = builder.build()?.try_deserialize()?;

        // Token and owner id commonly come from plain env vars
        if config.telegram.bot_token.is_none() {
            if let Ok(token) = std::env::var("BOT_TOKEN") {
                config.telegram.bot_token = Some(token);
            }
        }
        if config.telegram.owner_id.is_none() {
            if let Ok(owner) = std::env::var("OWNER_ID") {
                config.telegram.owner_id = owner.parse().ok();
            }
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Copy with the token replaced, for printing
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.telegram.bot_token.is_some() {
            copy.telegram.bot_token = Some("<redacted>".to_string());
        }
        copy
    }
}
