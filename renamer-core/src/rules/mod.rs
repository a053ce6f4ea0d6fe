//! Rename Rules
//!
//! A [`Rule`] is one step of the transformation applied to a filename's
//! base. Rules form a chain: they apply left to right, each one to the
//! output of the previous.
//!
//! The UI edits rules through a [`RuleChain`], whose entries keep every
//! editable field in its own signal. [`RuleChain::active_rules`] projects
//! the enabled, valid entries into plain [`Rule`] values for the transform.

mod chain;

pub use chain::{RuleChain, RuleEdit, RuleEntry, RuleId};

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a rule, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    #[default]
    Replace,
    ReplaceCaseInsensitive,
    Regex,
    Trim,
    TrimWhitespace,
    Prefix,
    Suffix,
    RemoveParentheses,
    RemoveSquareBrackets,
    RemoveCurlyBrackets,
}

impl RuleKind {
    /// Every kind, in the order the UI lists them.
    pub const ALL: [RuleKind; 10] = [
        RuleKind::Replace,
        RuleKind::ReplaceCaseInsensitive,
        RuleKind::Regex,
        RuleKind::Trim,
        RuleKind::TrimWhitespace,
        RuleKind::Prefix,
        RuleKind::Suffix,
        RuleKind::RemoveParentheses,
        RuleKind::RemoveSquareBrackets,
        RuleKind::RemoveCurlyBrackets,
    ];

    /// The kebab-case tag used in serialized rules.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Replace => "replace",
            RuleKind::ReplaceCaseInsensitive => "replace-case-insensitive",
            RuleKind::Regex => "regex",
            RuleKind::Trim => "trim",
            RuleKind::TrimWhitespace => "trim-whitespace",
            RuleKind::Prefix => "prefix",
            RuleKind::Suffix => "suffix",
            RuleKind::RemoveParentheses => "remove-parentheses",
            RuleKind::RemoveSquareBrackets => "remove-square-brackets",
            RuleKind::RemoveCurlyBrackets => "remove-curly-brackets",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the base a trim rule cuts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimPosition {
    #[default]
    Start,
    End,
}

/// A single transformation step with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Rule {
    /// Literal replacement of every occurrence.
    Replace { search: String, replacement: String },

    /// Literal replacement of every occurrence, ignoring case.
    ReplaceCaseInsensitive { search: String, replacement: String },

    /// Regular expression replacement.
    Regex {
        pattern: String,
        #[serde(default)]
        replacement: String,
        #[serde(default = "default_flags")]
        flags: String,
    },

    /// Cut `count` characters from one end.
    Trim { position: TrimPosition, count: usize },

    /// Trim both ends and collapse interior whitespace runs.
    TrimWhitespace,

    Prefix { text: String },

    Suffix { text: String },

    RemoveParentheses,

    RemoveSquareBrackets,

    RemoveCurlyBrackets,
}

fn default_flags() -> String {
    "g".to_string()
}

impl Rule {
    /// The kind of this rule.
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Replace { .. } => RuleKind::Replace,
            Rule::ReplaceCaseInsensitive { .. } => RuleKind::ReplaceCaseInsensitive,
            Rule::Regex { .. } => RuleKind::Regex,
            Rule::Trim { .. } => RuleKind::Trim,
            Rule::TrimWhitespace => RuleKind::TrimWhitespace,
            Rule::Prefix { .. } => RuleKind::Prefix,
            Rule::Suffix { .. } => RuleKind::Suffix,
            Rule::RemoveParentheses => RuleKind::RemoveParentheses,
            Rule::RemoveSquareBrackets => RuleKind::RemoveSquareBrackets,
            Rule::RemoveCurlyBrackets => RuleKind::RemoveCurlyBrackets,
        }
    }

    /// Whether the rule's required parameters are filled in.
    ///
    /// Invalid rules are skipped by the transform.
    pub fn is_valid(&self) -> bool {
        match self {
            Rule::Replace { search, .. } | Rule::ReplaceCaseInsensitive { search, .. } => {
                !search.is_empty()
            }
            Rule::Regex { pattern, .. } => !pattern.is_empty(),
            Rule::Trim { count, .. } => *count > 0,
            Rule::Prefix { text } | Rule::Suffix { text } => !text.is_empty(),
            Rule::TrimWhitespace
            | Rule::RemoveParentheses
            | Rule::RemoveSquareBrackets
            | Rule::RemoveCurlyBrackets => true,
        }
    }
}
