//! Startup configuration.
//!
//! The engine is launched by a host process that passes a fixed set of
//! flags; there is no interactive CLI surface and no config file.
//!
//! ```text
//! pushtalk --model-dir ./parakeet_model \
//!          --type-into-active-app true \
//!          --paste-mode auto \
//!          [--poll-hotkey]
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::deliver::PasteMode;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("flag {0} requires a value")]
    MissingValue(String),

    #[error("invalid value {value:?} for {flag}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("unknown flag {0}")]
    UnknownFlag(String),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process-wide settings, immutable after startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the recognizer model file.
    pub model_dir: PathBuf,
    /// Whether transcripts are injected into the focused application (the
    /// transcript event is emitted either way).
    pub type_into_active_app: bool,
    /// Delivery strategy.
    pub paste_mode: PasteMode,
    /// Use polling-mode hotkey detection instead of hook events.
    pub poll_hotkey: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./model"),
            type_into_active_app: true,
            paste_mode: PasteMode::Auto,
            poll_hotkey: false,
        }
    }
}

impl Config {
    /// Parse the host-supplied argument list (program name already
    /// stripped).
    pub fn from_args(args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut args = args;

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--model-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                    config.model_dir = PathBuf::from(value);
                }
                "--type-into-active-app" => {
                    let value = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                    config.type_into_active_app = parse_bool(&flag, &value)?;
                }
                "--paste-mode" => {
                    let value = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                    config.paste_mode =
                        value
                            .parse::<PasteMode>()
                            .map_err(|reason| ConfigError::InvalidValue {
                                flag: flag.clone(),
                                value,
                                reason,
                            })?;
                }
                "--poll-hotkey" => config.poll_hotkey = true,
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        Ok(config)
    }
}

fn parse_bool(flag: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
            reason: "expected true|false".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, ConfigError> {
        Config::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_args() {
        let c = parse(&[]).unwrap();
        assert!(c.type_into_active_app);
        assert_eq!(c.paste_mode, PasteMode::Auto);
        assert!(!c.poll_hotkey);
    }

    #[test]
    fn full_flag_set() {
        let c = parse(&[
            "--model-dir",
            "/opt/models/base",
            "--type-into-active-app",
            "false",
            "--paste-mode",
            "typing",
            "--poll-hotkey",
        ])
        .unwrap();
        assert_eq!(c.model_dir, PathBuf::from("/opt/models/base"));
        assert!(!c.type_into_active_app);
        assert_eq!(c.paste_mode, PasteMode::Typing);
        assert!(c.poll_hotkey);
    }

    #[test]
    fn missing_value_is_an_error() {
        assert!(matches!(
            parse(&["--model-dir"]),
            Err(ConfigError::MissingValue(_))
        ));
    }

    #[test]
    fn bad_paste_mode_is_an_error() {
        assert!(matches!(
            parse(&["--paste-mode", "teleport"]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(matches!(
            parse(&["--frobnicate"]),
            Err(ConfigError::UnknownFlag(_))
        ));
    }
}
