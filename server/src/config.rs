//! Game configuration: built-in defaults, an optional JSON file, then CLI overrides.

use crate::error::ConfigError;
use serde::Deserialize;
use shared::{DEFAULT_CONTROL_PORT, DEFAULT_GUESS_PORT};
use std::path::Path;
use std::time::Duration;

/// Inclusive bounds of the secret number and of accepted guesses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessRange {
    pub low: i32,
    pub high: i32,
}

impl GuessRange {
    pub fn new(low: i32, high: i32) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// Every tunable of the game server
///
/// The probe and notice intervals are kept as plain settings; their
/// defaults carry no meaning beyond being what the game has always used.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub bind_address: String,
    pub control_port: u16,
    pub guess_port: u16,
    pub min_players: usize,
    pub max_players: usize,
    pub guess_cooldown: Duration,
    pub round_duration: Duration,
    pub guess_range: GuessRange,
    /// Interval between liveness probes on each control channel
    pub probe_interval: Duration,
    /// How long the lone survivor has to answer the continue prompt
    pub prompt_timeout: Duration,
    /// Coordinator wake-up period while a round is open
    pub round_tick: Duration,
    /// Pause between the score summary and the next round
    pub intermission: Duration,
    pub time_notice_interval: Duration,
    /// How long a fresh connection may take to send its `JOIN` line
    pub join_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            guess_port: DEFAULT_GUESS_PORT,
            min_players: 2,
            max_players: 4,
            guess_cooldown: Duration::from_secs(10),
            round_duration: Duration::from_secs(60),
            guess_range: GuessRange::new(1, 100),
            probe_interval: Duration::from_secs(2),
            prompt_timeout: Duration::from_secs(30),
            round_tick: Duration::from_secs(1),
            intermission: Duration::from_secs(5),
            time_notice_interval: Duration::from_secs(10),
            join_timeout: Duration::from_secs(30),
        }
    }
}

impl GameConfig {
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn guess_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.guess_port)
    }

    /// Rejects settings the round state machine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players == 0 {
            return Err(ConfigError::Invalid("min_players must be at least 1".into()));
        }
        if self.max_players < self.min_players {
            return Err(ConfigError::Invalid(format!(
                "max_players ({}) is below min_players ({})",
                self.max_players, self.min_players
            )));
        }
        if self.guess_range.low > self.guess_range.high {
            return Err(ConfigError::Invalid(format!(
                "empty guess range {}..={}",
                self.guess_range.low, self.guess_range.high
            )));
        }
        let intervals = [
            ("probe_interval", self.probe_interval),
            ("round_tick", self.round_tick),
            ("round_duration", self.round_duration),
            ("time_notice_interval", self.time_notice_interval),
            ("join_timeout", self.join_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

/// On-disk overrides; every key is optional and durations are whole seconds
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bind_address: Option<String>,
    pub control_port: Option<u16>,
    pub guess_port: Option<u16>,
    pub min_players: Option<usize>,
    pub max_players: Option<usize>,
    pub guess_cooldown_secs: Option<u64>,
    pub round_duration_secs: Option<u64>,
    pub guess_low: Option<i32>,
    pub guess_high: Option<i32>,
    pub probe_interval_secs: Option<u64>,
    pub prompt_timeout_secs: Option<u64>,
    pub round_tick_secs: Option<u64>,
    pub intermission_secs: Option<u64>,
    pub time_notice_interval_secs: Option<u64>,
    pub join_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply(self, config: &mut GameConfig) {
        let secs = Duration::from_secs;

        if let Some(v) = self.bind_address {
            config.bind_address = v;
        }
        if let Some(v) = self.control_port {
            config.control_port = v;
        }
        if let Some(v) = self.guess_port {
            config.guess_port = v;
        }
        if let Some(v) = self.min_players {
            config.min_players = v;
        }
        if let Some(v) = self.max_players {
            config.max_players = v;
        }
        if let Some(v) = self.guess_cooldown_secs {
            config.guess_cooldown = secs(v);
        }
        if let Some(v) = self.round_duration_secs {
            config.round_duration = secs(v);
        }
        if let Some(v) = self.guess_low {
            config.guess_range.low = v;
        }
        if let Some(v) = self.guess_high {
            config.guess_range.high = v;
        }
        if let Some(v) = self.probe_interval_secs {
            config.probe_interval = secs(v);
        }
        if let Some(v) = self.prompt_timeout_secs {
            config.prompt_timeout = secs(v);
        }
        if let Some(v) = self.round_tick_secs {
            config.round_tick = secs(v);
        }
        if let Some(v) = self.intermission_secs {
            config.intermission = secs(v);
        }
        if let Some(v) = self.time_notice_interval_secs {
            config.time_notice_interval = secs(v);
        }
        if let Some(v) = self.join_timeout_secs {
            config.join_timeout = secs(v);
        }
    }
}
