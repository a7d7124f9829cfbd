//! Sink configuration.
//!
//! Defaults match a typical panel; every field can be overridden from JSON:
//!
//! ```
//! use logpane::SinkConfig;
//!
//! let config = SinkConfig::from_json(r#"{"early_replay_cap": 50, "colors": {"warn": "magenta"}}"#)
//!     .unwrap();
//! assert_eq!(config.early_replay_cap, 50);
//! assert_eq!(config.colors.info, "cyan");
//! ```

use std::time::Duration;

use colored::Color;
use serde::Deserialize;
use thiserror::Error;

use crate::entry::LogKind;

/// Default number of early entries replayed on attach.
pub const DEFAULT_EARLY_REPLAY_CAP: usize = 200;

/// Default number of admitted entries retained by a sink.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default delay before a throttle status entry is appended.
pub const DEFAULT_STATUS_DELAY_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sink config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown color {value:?} for {channel} channel")]
    UnknownColor { channel: LogKind, value: String },
}

/// Colour name per channel. Cosmetic only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelColors {
    pub log: String,
    pub info: String,
    pub warn: String,
    pub error: String,
}

impl Default for ChannelColors {
    fn default() -> Self {
        Self {
            log: "white".to_string(),
            info: "cyan".to_string(),
            warn: "yellow".to_string(),
            error: "red".to_string(),
        }
    }
}

impl ChannelColors {
    pub fn name(&self, kind: LogKind) -> &str {
        match kind {
            LogKind::Log => &self.log,
            LogKind::Info => &self.info,
            LogKind::Warn => &self.warn,
            LogKind::Error => &self.error,
        }
    }

    /// Parsed colour for `kind`. Unknown names fall back to white; use
    /// [`ChannelColors::validate`] to reject them up front.
    pub fn color(&self, kind: LogKind) -> Color {
        self.name(kind).parse().unwrap_or(Color::White)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in LogKind::ALL {
            let value = self.name(kind);
            if value.parse::<Color>().is_err() {
                return Err(ConfigError::UnknownColor {
                    channel: kind,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration passed to [`crate::Sink::attach`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub colors: ChannelColors,
    /// Most recent early entries replayed on attach.
    pub early_replay_cap: usize,
    /// Admitted entries retained; older ones are dropped.
    pub max_entries: usize,
    /// Delay before a throttle change is announced as an entry.
    pub status_delay_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            colors: ChannelColors::default(),
            early_replay_cap: DEFAULT_EARLY_REPLAY_CAP,
            max_entries: DEFAULT_MAX_ENTRIES,
            status_delay_ms: DEFAULT_STATUS_DELAY_MS,
        }
    }
}

impl SinkConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SinkConfig = serde_json::from_str(json)?;
        config.colors.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_early_replay_cap(mut self, cap: usize) -> Self {
        self.early_replay_cap = cap;
        self
    }

    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    #[must_use]
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_colors(mut self, colors: ChannelColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn status_delay(&self) -> Duration {
        Duration::from_millis(self.status_delay_ms)
    }
}
