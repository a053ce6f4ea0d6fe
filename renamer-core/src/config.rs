//! Renamer configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rules::{RuleKind, TrimPosition};

/// Defaults applied to newly added rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenamerConfig {
    /// Kind of rule created by "add rule".
    pub default_rule_kind: RuleKind,
    /// Regex flags a new rule starts with.
    pub default_regex_flags: String,
    /// Side a new trim rule cuts from.
    pub default_trim_position: TrimPosition,
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            default_rule_kind: RuleKind::Replace,
            default_regex_flags: "g".to_string(),
            default_trim_position: TrimPosition::Start,
        }
    }
}

impl RenamerConfig {
    /// Parse a config from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
