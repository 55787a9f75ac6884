// src/config.rs
//! Environment-driven startup configuration.

use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PROGRESS_MESSAGE_SECS: u64 = 4;

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub api_key: String,
    pub base_url: String,
    pub bind_addr: String,
    /// Prebuilt TTS voice for narration; the client default when unset.
    pub tts_voice: Option<String>,
    pub workflow: WorkflowConfig,
}

/// Timing knobs for the video workflow.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowConfig {
    /// Fixed period between status checks of an in-flight job.
    pub poll_interval: Duration,
    /// How long each progress message stays on screen.
    pub progress_cadence: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            progress_cadence: Duration::from_secs(DEFAULT_PROGRESS_MESSAGE_SECS),
        }
    }
}

impl StudioConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`StudioConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = non_blank("GEMINI_API_KEY")
            .or_else(|| non_blank("API_KEY"))
            .ok_or(ConfigError::MissingCredential)?;

        let base_url = lookup("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let bind_addr = lookup("STUDIO_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let tts_voice = non_blank("GEMINI_TTS_VOICE").map(|voice| voice.trim().to_string());

        let poll_secs = parse_secs(
            "VIDEO_POLL_INTERVAL_SECS",
            lookup("VIDEO_POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let progress_secs = parse_secs(
            "PROGRESS_MESSAGE_SECS",
            lookup("PROGRESS_MESSAGE_SECS"),
            DEFAULT_PROGRESS_MESSAGE_SECS,
        )?;

        Ok(Self {
            api_key,
            base_url,
            bind_addr,
            tts_voice,
            workflow: WorkflowConfig {
                poll_interval: Duration::from_secs(poll_secs),
                progress_cadence: Duration::from_secs(progress_secs),
            },
        })
    }
}

fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let result = StudioConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingCredential)));

        let blank = StudioConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")]));
        assert!(matches!(blank, Err(ConfigError::MissingCredential)));
    }

    #[test]
    fn test_blank_primary_key_falls_back_to_api_key() {
        let config = StudioConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "  "),
            ("API_KEY", "fallback-secret"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "fallback-secret");
    }

    #[test]
    fn test_tts_voice_is_optional() {
        let unset = StudioConfig::from_lookup(lookup_from(&[("API_KEY", "k")])).unwrap();
        assert_eq!(unset.tts_voice, None);

        let set = StudioConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("GEMINI_TTS_VOICE", " Kore ")])).unwrap();
        assert_eq!(set.tts_voice.as_deref(), Some("Kore"));
    }

    #[test]
    fn test_defaults_and_api_key_fallback() {
        let config = StudioConfig::from_lookup(lookup_from(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.workflow.poll_interval, Duration::from_secs(10));
        assert_eq!(config.workflow.progress_cadence, Duration::from_secs(4));
    }

    #[test]
    fn test_overrides_and_invalid_numbers() {
        let config = StudioConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://127.0.0.1:9999/"),
            ("VIDEO_POLL_INTERVAL_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.workflow.poll_interval, Duration::from_secs(3));

        let bad = StudioConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("VIDEO_POLL_INTERVAL_SECS", "soon"),
        ]));
        assert!(matches!(
            bad,
            Err(ConfigError::InvalidValue { name: "VIDEO_POLL_INTERVAL_SECS", .. })
        ));
    }
}
