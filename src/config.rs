use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Límites de cola
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Resolución
    #[serde(with = "humantime_serde_compat")]
    pub resolve_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "sen!".to_string()),

            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("MAX_PLAYLIST_SIZE inválido")?,

            resolve_timeout: humantime::parse_duration(
                &std::env::var("RESOLVE_TIMEOUT").unwrap_or_else(|_| "30s".to_string()),
            )
            .context("RESOLVE_TIMEOUT inválido")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Command prefix must not be empty
    /// - Queue and playlist limits must be greater than 0
    /// - Resolve timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {}\n  \
            Limits: {} queue, {} playlist entries\n  \
            Resolver: yt-dlp, {} timeout",
            self.command_prefix,
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.resolve_timeout),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin token por defecto)
            discord_token: String::new(),
            command_prefix: "sen!".to_string(),

            max_queue_size: 1000,
            max_playlist_size: 100,

            resolve_timeout: Duration::from_secs(30),
        }
    }
}

/// (De)serializa `Duration` como texto humantime ("30s", "1m 30s")
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
