//! Player Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry and timing policy of the device switch worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchPolicy {
    /// Apply/verify attempts before giving up
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay_ms: u64,

    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: u32,

    /// Upper bound for the retry delay
    pub max_delay_ms: u64,

    /// Time the output gets to settle before the device is read back
    pub settle_ms: u64,

    /// How long a restart cycle waits for the player to report playing
    pub playing_wait_ms: u64,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 150,
            backoff_multiplier: 2,
            max_delay_ms: 2000,
            settle_ms: 100,
            playing_wait_ms: 2000,
        }
    }
}

impl SwitchPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn playing_wait(&self) -> Duration {
        Duration::from_millis(self.playing_wait_ms)
    }

    /// Delay following `delay`, capped at `max_delay_ms`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let next = delay.saturating_mul(self.backoff_multiplier.max(1));
        next.min(Duration::from_millis(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Switch policy needs at least one attempt".into());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "Initial delay {}ms exceeds max delay {}ms",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        if self.backoff_multiplier == 0 {
            return Err("Backoff multiplier must be positive".into());
        }
        Ok(())
    }
}

/// Playback core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How long an enumerated device list stays valid
    pub device_cache_ttl_ms: u64,

    /// Default step for seek forward/backward
    pub seek_step_secs: u64,

    pub switch: SwitchPolicy,

    /// Output modules whose device changes only take effect after a
    /// stop/play cycle (desktop mixer style backends)
    pub restart_modules: Vec<String>,

    /// Output modules probed for devices, first non-empty list wins
    pub probe_modules: Vec<String>,

    /// Output module selected when a player is created
    pub output_module: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device_cache_ttl_ms: 30_000,
            seek_step_secs: 5,
            switch: SwitchPolicy::default(),
            restart_modules: ["pulse", "pulseaudio", "pipewire", "mmdevice", "directsound"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            probe_modules: default_probe_modules(),
            output_module: None,
        }
    }
}

impl PlayerConfig {
    pub fn device_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.device_cache_ttl_ms)
    }

    pub fn seek_step(&self) -> Duration {
        Duration::from_secs(self.seek_step_secs)
    }

    /// Whether device changes on `module` need a restart cycle
    pub fn is_restart_module(&self, module: &str) -> bool {
        self.restart_modules
            .iter()
            .any(|m| m.eq_ignore_ascii_case(module))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.seek_step_secs == 0 {
            return Err("Seek step must be positive".into());
        }
        if self.probe_modules.iter().any(|m| m.trim().is_empty()) {
            return Err("Probe modules must not be empty names".into());
        }
        self.switch.validate()
    }
}

#[cfg(target_os = "windows")]
fn default_probe_modules() -> Vec<String> {
    vec!["directx".into(), "waveout".into(), "mmdevice".into()]
}

#[cfg(not(target_os = "windows"))]
fn default_probe_modules() -> Vec<String> {
    vec!["alsa".into(), "pulse".into(), "oss".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.device_cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.seek_step(), Duration::from_secs(5));
        assert_eq!(config.switch.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = SwitchPolicy::default();
        let mut delay = policy.initial_delay();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_millis());
            delay = policy.next_delay(delay);
        }
        assert_eq!(seen, vec![150, 300, 600, 1200, 2000, 2000]);
    }

    #[test]
    fn test_restart_module_match_ignores_case() {
        let config = PlayerConfig::default();
        assert!(config.is_restart_module("PulseAudio"));
        assert!(config.is_restart_module("mmdevice"));
        assert!(!config.is_restart_module("alsa"));
    }

    #[test]
    fn test_invalid_policy() {
        let policy = SwitchPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = SwitchPolicy {
            initial_delay_ms: 5000,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_config_missing_fields_default() {
        let config: PlayerConfig = serde_json::from_str(r#"{"seek_step_secs": 10}"#).unwrap();
        assert_eq!(config.seek_step_secs, 10);
        assert_eq!(config.device_cache_ttl_ms, 30_000);
        assert_eq!(config.switch, SwitchPolicy::default());
    }
}
