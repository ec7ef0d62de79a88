use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue behaviour shared by every guild queue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueSettings {
    /// Initial volume of new queues, in percent
    pub default_volume: u8,
    pub max_queue_size: usize,
    /// How long an empty, idle queue keeps its voice connection
    #[serde(with = "humantime_serde_compat")]
    pub idle_timeout: Duration,
    /// Delay before trying the next track after a failure
    #[serde(with = "humantime_serde_compat")]
    pub retry_backoff: Duration,
    /// How long a dropped voice connection may take to come back
    #[serde(with = "humantime_serde_compat")]
    pub disconnect_grace: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_volume: 50,
            max_queue_size: 1000,
            idle_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(3),
            disconnect_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Registers commands per guild while developing

    // Queue
    pub queue: QueueSettings,

    // Resolver
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = QueueSettings::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Queue
            queue: QueueSettings {
                default_volume: std::env::var("DEFAULT_VOLUME")
                    .unwrap_or_else(|_| defaults.default_volume.to_string())
                    .parse()
                    .context("DEFAULT_VOLUME must be an integer percent")?,
                max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                    .unwrap_or_else(|_| defaults.max_queue_size.to_string())
                    .parse()
                    .context("MAX_QUEUE_SIZE must be an integer")?,
                idle_timeout: env_duration("IDLE_TIMEOUT", defaults.idle_timeout)?,
                retry_backoff: env_duration("RETRY_BACKOFF", defaults.retry_backoff)?,
                disconnect_grace: env_duration("DISCONNECT_GRACE", defaults.disconnect_grace)?,
            },

            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must be between 0 and 100
    /// - Max queue size must be greater than 0
    /// - Idle timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.queue.default_volume > 100 {
            anyhow::bail!(
                "Default volume must be between 0 and 100, got: {}",
                self.queue.default_volume
            );
        }

        if self.queue.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.queue.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Queue: {}% default vol, {} max tracks\n  \
            Timers: idle {}, retry {}, grace {}\n  \
            Resolver: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("for guild {}", id)),
            self.queue.default_volume,
            self.queue.max_queue_size,
            humantime::format_duration(self.queue.idle_timeout),
            humantime::format_duration(self.queue.retry_backoff),
            humantime::format_duration(self.queue.disconnect_grace),
            self.ytdlp_path,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            queue: QueueSettings::default(),

            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Reads a duration like `300s` or `5m`; a bare number is taken as seconds.
fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_duration(&raw)
            .with_context(|| format!("{} must be a duration like 300s or 5m, got: {}", key, raw)),
        _ => Ok(default),
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    Ok(humantime::parse_duration(raw)?)
}

/// Serializes durations in humantime notation (`5m`, `3s`).
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_accepts_seconds_and_humantime() {
        assert_eq!(parse_duration("300").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults_match_queue_policy() {
        let settings = QueueSettings::default();
        assert_eq!(settings.default_volume, 50);
        assert_eq!(settings.idle_timeout, Duration::from_secs(300));
        assert_eq!(settings.retry_backoff, Duration::from_secs(3));
        assert_eq!(settings.disconnect_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            discord_token: "token".into(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        config.queue.default_volume = 150;
        assert!(config.validate().is_err());

        config.queue.default_volume = 50;
        config.queue.max_queue_size = 0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".into(),
            guild_id: Some(42),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("for guild 42"));
        assert!(summary.contains("idle 5m"));
    }

    #[test]
    fn test_settings_serialize_durations_readably() {
        let json = serde_json::to_string(&QueueSettings::default()).unwrap();
        assert!(json.contains("\"idle_timeout\":\"5m\""));

        let back: QueueSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, QueueSettings::default());
    }
}
