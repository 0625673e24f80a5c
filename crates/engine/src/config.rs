//! Engine configuration: named proxy groups with timeout and retry settings.
//!
//! ```yaml
//! groups:
//!   default:
//!     start_to_close_timeout: 5m
//!     retry:
//!       initial_interval: 1s
//!       maximum_attempts: 10
//!   long_running:
//!     start_to_close_timeout: 2h
//!     activities: [transcribe_media, extract_pdf_with_vision]
//! ```

use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::EngineError, executor::ActivityOptions};

/// Environment variable naming the engine configuration file.
pub const CONFIG_ENV_VAR: &str = "DOCFLOW_ENGINE_CONFIG";

/// Options for one proxy group plus the activities explicitly assigned to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(flatten)]
    pub options: ActivityOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub groups: IndexMap<String, GroupConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut groups = IndexMap::new();
        groups.insert(Self::DEFAULT_GROUP.to_string(), GroupConfig::default());
        groups.insert(
            Self::LONG_RUNNING_GROUP.to_string(),
            GroupConfig {
                options: ActivityOptions::long_running(),
                activities: Vec::new(),
            },
        );
        Self { groups }
    }
}

impl EngineConfig {
    pub const DEFAULT_GROUP: &'static str = "default";
    pub const LONG_RUNNING_GROUP: &'static str = "long_running";

    /// Parse a YAML or JSON configuration document.
    ///
    /// Built-in groups absent from the document keep their defaults.
    pub fn parse(content: &str) -> Result<Self> {
        let parsed: EngineConfig = serde_yaml::from_str(content).context("Failed to parse engine configuration")?;
        let mut config = Self::default();
        for (name, group) in parsed.groups {
            config.groups.insert(name, group);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read engine configuration: {}", path.display()))?;
        let config = Self::parse(&content).with_context(|| format!("Invalid engine configuration: {}", path.display()))?;
        debug!(path = %path.display(), group_count = config.groups.len(), "engine configuration loaded");
        Ok(config)
    }

    /// Load from the file named by `DOCFLOW_ENGINE_CONFIG`, or fall back to defaults.
    pub fn from_env() -> Result<Self> {
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn options(&self, group: &str) -> Result<&ActivityOptions, EngineError> {
        self.groups
            .get(group)
            .map(|group| &group.options)
            .ok_or_else(|| EngineError::UnknownGroup(group.to_string()))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen: Vec<&str> = Vec::new();
        for group in self.groups.values() {
            group.options.retry.validate()?;
            for activity in &group.activities {
                if seen.contains(&activity.as_str()) {
                    return Err(EngineError::DuplicateBinding(activity.clone()));
                }
                seen.push(activity);
            }
        }
        Ok(())
    }
}

/// Parse a duration such as `500ms`, `30s`, `5m`, `2h`, or bare seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(number) = trimmed.strip_suffix("ms") {
        return number.trim().parse().ok().map(Duration::from_millis);
    }
    let last_character = trimmed.chars().last()?;
    if last_character.is_ascii_alphabetic() {
        let number = &trimmed[..trimmed.len() - 1];
        let value: u64 = number.trim().parse().ok()?;
        return match last_character {
            's' | 'S' => Some(Duration::from_secs(value)),
            'm' | 'M' => value.checked_mul(60).map(Duration::from_secs),
            'h' | 'H' => value.checked_mul(60 * 60).map(Duration::from_secs),
            _ => None,
        };
    }
    trimmed.parse().ok().map(Duration::from_secs)
}

/// Render a duration in the shortest unit [`parse_duration`] reads back exactly.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() != 0 {
        return format!("{}ms", duration.as_millis());
    }
    let seconds = duration.as_secs();
    if seconds != 0 && seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds != 0 && seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Serde adapter for duration fields written as strings or bare seconds.
pub(crate) mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            RawDuration::Text(text) => {
                super::parse_duration(&text).ok_or_else(|| de::Error::custom(format!("invalid duration '{}'", text)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_types::ErrorKind;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn format_duration_reads_back() {
        for duration in [Duration::from_millis(250), Duration::from_secs(90), Duration::from_secs(600), Duration::from_secs(7200)] {
            assert_eq!(parse_duration(&format_duration(duration)), Some(duration));
        }
    }

    #[test]
    fn defaults_provide_both_groups() {
        let config = EngineConfig::default();
        let default = config.options(EngineConfig::DEFAULT_GROUP).expect("default group");
        assert_eq!(default.start_to_close_timeout, Duration::from_secs(300));
        assert_eq!(default.retry.maximum_attempts, 10);
        assert_eq!(default.retry.non_retryable_error_kinds.len(), ErrorKind::ALL.len());
        let long = config.options(EngineConfig::LONG_RUNNING_GROUP).expect("long group");
        assert_eq!(long.start_to_close_timeout, Duration::from_secs(7200));
        assert_eq!(long.retry.maximum_interval, Duration::from_secs(600));
        assert!(matches!(config.options("missing"), Err(EngineError::UnknownGroup(_))));
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let config = EngineConfig::parse(
            r#"
groups:
  default:
    start_to_close_timeout: 30s
    retry:
      maximum_attempts: 3
      non_retryable_error_kinds: [TokenExpiredError]
  webhooks:
    start_to_close_timeout: 10
    activities: [notify_webhook]
"#,
        )
        .expect("parse");
        let default = config.options(EngineConfig::DEFAULT_GROUP).expect("default");
        assert_eq!(default.start_to_close_timeout, Duration::from_secs(30));
        assert_eq!(default.retry.maximum_attempts, 3);
        assert_eq!(default.retry.initial_interval, Duration::from_secs(1));
        assert_eq!(default.retry.non_retryable_error_kinds.iter().copied().collect::<Vec<_>>(), vec![ErrorKind::TokenExpired]);
        assert!(config.groups.contains_key(EngineConfig::LONG_RUNNING_GROUP));
        assert_eq!(config.groups["webhooks"].activities, vec!["notify_webhook"]);
    }

    #[test]
    fn activity_listed_in_two_groups_is_rejected() {
        let error = EngineConfig::parse(
            r#"
groups:
  a: { activities: [x] }
  b: { activities: [x] }
"#,
        )
        .expect_err("duplicate");
        assert!(format!("{error:#}").contains("more than one proxy group"));
    }

    #[test]
    fn load_reads_file() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let path = temp_dir.path().join("engine.yaml");
        fs::write(&path, "groups:\n  default:\n    start_to_close_timeout: 1m\n").expect("write");
        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.options("default").expect("default").start_to_close_timeout, Duration::from_secs(60));
        assert!(EngineConfig::load(temp_dir.path().join("absent.yaml")).is_err());
    }
}
