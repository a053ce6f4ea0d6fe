//! The editable rule chain.
//!
//! Each [`RuleEntry`] holds one signal per editable field, so switching a
//! rule's kind keeps the text typed into the other fields. The chain itself
//! is a signal over a `Vec` of entries, replaced wholesale on every
//! structural change.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::RenamerConfig;
use crate::reactive::Signal;

use super::{Rule, RuleKind, TrimPosition};

/// Unique identifier for a rule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(u64);

impl RuleId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// One edit to a single field of a rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEdit {
    Kind(RuleKind),
    Enabled(bool),
    Search(String),
    Replacement(String),
    Pattern(String),
    Flags(String),
    TrimPosition(TrimPosition),
    TrimCount(usize),
    Text(String),
}

/// A rule in the chain, with a signal per editable field.
///
/// Clones share their signals. Entries compare by identity.
#[derive(Clone)]
pub struct RuleEntry {
    id: RuleId,
    pub kind: Signal<RuleKind>,
    pub enabled: Signal<bool>,
    pub search: Signal<String>,
    pub replacement: Signal<String>,
    pub pattern: Signal<String>,
    pub flags: Signal<String>,
    pub trim_position: Signal<TrimPosition>,
    pub trim_count: Signal<usize>,
    pub text: Signal<String>,
}

impl RuleEntry {
    /// A new enabled entry with neutral parameters.
    pub fn new(config: &RenamerConfig) -> Self {
        Self {
            id: RuleId::new(),
            kind: Signal::new(config.default_rule_kind),
            enabled: Signal::new(true),
            search: Signal::new(String::new()),
            replacement: Signal::new(String::new()),
            pattern: Signal::new(String::new()),
            flags: Signal::new(config.default_regex_flags.clone()),
            trim_position: Signal::new(config.default_trim_position),
            trim_count: Signal::new(0),
            text: Signal::new(String::new()),
        }
    }

    /// An enabled entry whose fields are filled from `rule`.
    pub fn from_rule(rule: &Rule, config: &RenamerConfig) -> Self {
        let entry = Self::new(config);
        entry.kind.set(rule.kind());
        match rule {
            Rule::Replace {
                search,
                replacement,
            }
            | Rule::ReplaceCaseInsensitive {
                search,
                replacement,
            } => {
                entry.search.set(search.clone());
                entry.replacement.set(replacement.clone());
            }
            Rule::Regex {
                pattern,
                replacement,
                flags,
            } => {
                entry.pattern.set(pattern.clone());
                entry.replacement.set(replacement.clone());
                entry.flags.set(flags.clone());
            }
            Rule::Trim { position, count } => {
                entry.trim_position.set(*position);
                entry.trim_count.set(*count);
            }
            Rule::Prefix { text } | Rule::Suffix { text } => {
                entry.text.set(text.clone());
            }
            Rule::TrimWhitespace
            | Rule::RemoveParentheses
            | Rule::RemoveSquareBrackets
            | Rule::RemoveCurlyBrackets => {}
        }
        entry
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Build the rule this entry currently describes.
    ///
    /// Only the fields the current kind uses are read, so an effect calling
    /// this does not re-run when an unrelated field is edited.
    pub fn rule(&self) -> Rule {
        match self.kind.get() {
            RuleKind::Replace => Rule::Replace {
                search: self.search.get(),
                replacement: self.replacement.get(),
            },
            RuleKind::ReplaceCaseInsensitive => Rule::ReplaceCaseInsensitive {
                search: self.search.get(),
                replacement: self.replacement.get(),
            },
            RuleKind::Regex => Rule::Regex {
                pattern: self.pattern.get(),
                replacement: self.replacement.get(),
                flags: self.flags.get(),
            },
            RuleKind::Trim => Rule::Trim {
                position: self.trim_position.get(),
                count: self.trim_count.get(),
            },
            RuleKind::TrimWhitespace => Rule::TrimWhitespace,
            RuleKind::Prefix => Rule::Prefix {
                text: self.text.get(),
            },
            RuleKind::Suffix => Rule::Suffix {
                text: self.text.get(),
            },
            RuleKind::RemoveParentheses => Rule::RemoveParentheses,
            RuleKind::RemoveSquareBrackets => Rule::RemoveSquareBrackets,
            RuleKind::RemoveCurlyBrackets => Rule::RemoveCurlyBrackets,
        }
    }

    /// The rule, if this entry is enabled and valid.
    pub fn active_rule(&self) -> Option<Rule> {
        if !self.enabled.get() {
            return None;
        }
        Some(self.rule()).filter(Rule::is_valid)
    }

    /// Apply one field edit. Returns whether the field changed.
    pub fn apply(&self, edit: RuleEdit) -> bool {
        match edit {
            RuleEdit::Kind(kind) => self.kind.set(kind),
            RuleEdit::Enabled(enabled) => self.enabled.set(enabled),
            RuleEdit::Search(search) => self.search.set(search),
            RuleEdit::Replacement(replacement) => self.replacement.set(replacement),
            RuleEdit::Pattern(pattern) => self.pattern.set(pattern),
            RuleEdit::Flags(flags) => self.flags.set(flags),
            RuleEdit::TrimPosition(position) => self.trim_position.set(position),
            RuleEdit::TrimCount(count) => self.trim_count.set(count),
            RuleEdit::Text(text) => self.text.set(text),
        }
    }
}

impl PartialEq for RuleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RuleEntry {}

impl std::fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEntry")
            .field("id", &self.id)
            .field("enabled", &self.enabled.get_untracked())
            .field("kind", &self.kind.get_untracked())
            .finish()
    }
}

/// The ordered list of rules plus the selection cursor.
#[derive(Clone)]
pub struct RuleChain {
    entries: Signal<Vec<RuleEntry>>,
    selected: Signal<Option<usize>>,
    config: RenamerConfig,
}

impl RuleChain {
    pub fn new(config: RenamerConfig) -> Self {
        Self {
            entries: Signal::new(Vec::new()),
            selected: Signal::new(None),
            config,
        }
    }

    /// The entries, in application order (tracked).
    pub fn entries(&self) -> Vec<RuleEntry> {
        self.entries.get()
    }

    /// The entry at `index`, if any (tracked).
    pub fn get(&self, index: usize) -> Option<RuleEntry> {
        self.entries.with(|entries| entries.get(index).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The selection cursor (tracked).
    pub fn selected(&self) -> Option<usize> {
        self.selected.get()
    }

    /// Append a rule with the configured defaults.
    pub fn add_rule(&self) -> RuleEntry {
        self.push_entry(RuleEntry::new(&self.config))
    }

    /// Append an entry describing `rule`.
    pub fn push(&self, rule: &Rule) -> RuleEntry {
        self.push_entry(RuleEntry::from_rule(rule, &self.config))
    }

    fn push_entry(&self, entry: RuleEntry) -> RuleEntry {
        let added = entry.clone();
        self.entries.update(|entries| {
            let mut next = entries.clone();
            next.push(entry);
            next
        });
        tracing::debug!(rules = self.entries.with_untracked(Vec::len), "added rule");
        added
    }

    /// Move the cursor to `index`. Out-of-range indexes are ignored.
    pub fn select(&self, index: usize) -> bool {
        if index >= self.entries.with_untracked(Vec::len) {
            return false;
        }
        self.selected.set(Some(index));
        true
    }

    pub fn clear_selection(&self) {
        self.selected.set(None);
    }

    /// Delete the selected rule and clear the cursor.
    pub fn remove_selected(&self) -> bool {
        let Some(index) = self.selected.get_untracked() else {
            return false;
        };
        if index >= self.entries.with_untracked(Vec::len) {
            return false;
        }

        self.entries.update(|entries| {
            let mut next = entries.clone();
            next.remove(index);
            next
        });
        self.selected.set(None);
        tracing::debug!(index, "removed rule");
        true
    }

    /// Swap the selected rule with the one before it.
    pub fn move_up(&self) -> bool {
        match self.selected.get_untracked() {
            Some(index) if index > 0 => self.swap_selected(index, index - 1),
            _ => false,
        }
    }

    /// Swap the selected rule with the one after it.
    pub fn move_down(&self) -> bool {
        match self.selected.get_untracked() {
            Some(index) => self.swap_selected(index, index + 1),
            None => false,
        }
    }

    fn swap_selected(&self, from: usize, to: usize) -> bool {
        let len = self.entries.with_untracked(Vec::len);
        if from >= len || to >= len {
            return false;
        }

        self.entries.update(|entries| {
            let mut next = entries.clone();
            next.swap(from, to);
            next
        });
        self.selected.set(Some(to));
        tracing::debug!(from, to, "moved rule");
        true
    }

    /// Flip the enabled flag of the rule at `index`.
    pub fn toggle_enabled(&self, index: usize) -> bool {
        match self.entries.with_untracked(|entries| entries.get(index).cloned()) {
            Some(entry) => entry.enabled.update(|enabled| !enabled),
            None => false,
        }
    }

    /// Edit one field of the rule at `index`.
    ///
    /// Returns `false` if there is no such rule or the value is unchanged.
    pub fn edit(&self, index: usize, edit: RuleEdit) -> bool {
        match self.entries.with_untracked(|entries| entries.get(index).cloned()) {
            Some(entry) => entry.apply(edit),
            None => false,
        }
    }

    /// The enabled, valid rules in chain order (tracked).
    pub fn active_rules(&self) -> Vec<Rule> {
        self.entries
            .get()
            .iter()
            .filter_map(RuleEntry::active_rule)
            .collect()
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        Self::new(RenamerConfig::default())
    }
}
