//! Bridge configuration
//!
//! Runtime policy for a session: how aggressively boundary operations are
//! wrapped, and the engine stack ceiling. Loaded from a TOML file, a TOML
//! string, or defaults, with an environment-variable override
//! (`CAUSEWAY_WRAP_POLICY`) applied last.

use std::path::{Path, PathBuf};

use causeway_engine::DEFAULT_STACK_LIMIT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML syntax: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Which boundary operations run inside a protected scope.
///
/// Failure-prone operations are always wrapped; the policy decides whether
/// the infallible ones are too. `Complete` is the simpler, slightly slower
/// strategy; `Curated` relies on the operation classification and skips the
/// scope where nothing can raise. The protected-call gate's safety argument
/// holds under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapPolicy {
    Curated,
    Complete,
}

impl WrapPolicy {
    /// Whether infallible operations also run inside a protected scope.
    pub fn wraps_infallible(self) -> bool {
        matches!(self, WrapPolicy::Complete)
    }
}

/// Session-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BridgeConfig {
    pub wrap_policy: WrapPolicy,
    pub stack_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wrap_policy: WrapPolicy::Curated,
            stack_limit: DEFAULT_STACK_LIMIT,
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document. Missing fields fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply environment overrides (`CAUSEWAY_WRAP_POLICY=curated|complete`).
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var("CAUSEWAY_WRAP_POLICY") {
            self.wrap_policy = match raw.as_str() {
                "curated" => WrapPolicy::Curated,
                "complete" => WrapPolicy::Complete,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "wrap-policy".to_string(),
                        reason: format!("unrecognized policy '{}'", other),
                    })
                }
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_limit < 16 {
            return Err(ConfigError::InvalidValue {
                field: "stack-limit".to_string(),
                reason: format!("{} is below the minimum of 16", self.stack_limit),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.wrap_policy, WrapPolicy::Curated);
        assert_eq!(config.stack_limit, DEFAULT_STACK_LIMIT);
    }

    #[test]
    fn test_from_toml_str() {
        let config = BridgeConfig::from_toml_str(
            r#"
            wrap-policy = "complete"
            stack-limit = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.wrap_policy, WrapPolicy::Complete);
        assert_eq!(config.stack_limit, 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BridgeConfig::from_toml_str(r#"wrap-policy = "complete""#).unwrap();
        assert_eq!(config.wrap_policy, WrapPolicy::Complete);
        assert_eq!(config.stack_limit, DEFAULT_STACK_LIMIT);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = BridgeConfig::from_toml_str(r#"wrap-polcy = "complete""#);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_stack_limit_floor() {
        let result = BridgeConfig::from_toml_str("stack-limit = 2");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "stack-limit"
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = BridgeConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
