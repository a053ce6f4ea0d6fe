//! Regex rule support: flag parsing and replacement templates.
//!
//! Patterns and replacement text are typed by users who know regexes from
//! the browser, so flags and `$` tokens follow that dialect:
//!
//! | token      | inserts                                  |
//! |------------|------------------------------------------|
//! | `$$`       | a literal `$`                            |
//! | `$&`       | the whole match                          |
//! | `` $` ``   | the text before the match                |
//! | `$'`       | the text after the match                 |
//! | `$n` `$nn` | capture group `n` (1-99) if it exists    |
//! | `$<name>`  | named group `name` (pattern must have one)|
//!
//! Anything else is copied literally.
//!
//! Backreferences (`\1`) and lookaround (`(?=`, `(?<!`) are supported.

use std::collections::HashSet;

use fancy_regex::{Captures, Regex};

/// A compiled regex rule.
#[derive(Debug, Clone)]
pub(crate) struct RegexStep {
    matcher: Regex,
    template: Vec<Piece>,
    global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
    Before,
    After,
}

/// Why a regex rule could not be compiled.
#[derive(Debug)]
pub(crate) enum PatternError {
    Flag(char),
    DuplicateFlag(char),
    Syntax(Box<fancy_regex::Error>),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Flag(flag) => write!(f, "unsupported flag {flag:?}"),
            PatternError::DuplicateFlag(flag) => write!(f, "duplicate flag {flag:?}"),
            PatternError::Syntax(err) => write!(f, "{err}"),
        }
    }
}

impl RegexStep {
    pub(crate) fn compile(
        pattern: &str,
        replacement: &str,
        flags: &str,
    ) -> Result<Self, PatternError> {
        let mut inline = String::new();
        let mut seen = HashSet::new();
        let mut global = false;

        for flag in flags.chars() {
            if !seen.insert(flag) {
                return Err(PatternError::DuplicateFlag(flag));
            }
            match flag {
                'g' => global = true,
                'i' | 'm' | 's' => inline.push(flag),
                // Unicode matching is always on.
                'u' => {}
                other => return Err(PatternError::Flag(other)),
            }
        }

        let source = if inline.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{inline}){pattern}")
        };
        let matcher = Regex::new(&source).map_err(|err| PatternError::Syntax(Box::new(err)))?;
        let template = parse_template(replacement, &matcher);

        Ok(Self {
            matcher,
            template,
            global,
        })
    }

    pub(crate) fn apply(&self, base: &str) -> String {
        let mut out = String::with_capacity(base.len());
        let mut last = 0;

        for caps in self.matcher.captures_iter(base) {
            let caps = match caps {
                Ok(caps) => caps,
                Err(err) => {
                    tracing::warn!(pattern = self.matcher.as_str(), error = %err, "regex matching stopped");
                    break;
                }
            };
            let Some(whole) = caps.get(0) else {
                continue;
            };

            out.push_str(&base[last..whole.start()]);
            out.push_str(&self.expand(base, &caps));
            last = whole.end();

            if !self.global {
                break;
            }
        }

        out.push_str(&base[last..]);
        out
    }

    fn expand(&self, haystack: &str, caps: &Captures<'_>) -> String {
        let mut out = String::new();
        for piece in &self.template {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Group(index) => {
                    if let Some(m) = caps.get(*index) {
                        out.push_str(m.as_str());
                    }
                }
                Piece::Named(name) => {
                    if let Some(m) = caps.name(name) {
                        out.push_str(m.as_str());
                    }
                }
                Piece::Before => {
                    if let Some(m) = caps.get(0) {
                        out.push_str(&haystack[..m.start()]);
                    }
                }
                Piece::After => {
                    if let Some(m) = caps.get(0) {
                        out.push_str(&haystack[m.end()..]);
                    }
                }
            }
        }
        out
    }
}

fn parse_template(template: &str, matcher: &Regex) -> Vec<Piece> {
    // Group 0 is the whole match, so this is one more than the group count.
    let groups = matcher.captures_len();
    let has_names = matcher.capture_names().flatten().next().is_some();

    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        literal.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        let (piece, consumed) = match after.chars().next() {
            Some('$') => {
                literal.push('$');
                rest = &after[1..];
                continue;
            }
            Some('&') => (Some(Piece::Group(0)), 1),
            Some('`') => (Some(Piece::Before), 1),
            Some('\'') => (Some(Piece::After), 1),
            Some(c) if c.is_ascii_digit() => group_reference(after, groups),
            Some('<') if has_names => match after.find('>') {
                Some(close) => (Some(Piece::Named(after[1..close].to_string())), close + 1),
                None => (None, 0),
            },
            _ => (None, 0),
        };

        match piece {
            Some(piece) => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(piece);
                rest = &after[consumed..];
            }
            None => {
                literal.push('$');
                rest = after;
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// Resolve `$n` / `$nn`, preferring the two-digit group when it exists.
fn group_reference(after: &str, groups: usize) -> (Option<Piece>, usize) {
    let digits: Vec<usize> = after
        .chars()
        .take(2)
        .map_while(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();

    if digits.len() == 2 {
        let two = digits[0] * 10 + digits[1];
        if two >= 1 && two < groups {
            return (Some(Piece::Group(two)), 2);
        }
    }

    match digits.first() {
        Some(&one) if one >= 1 && one < groups => (Some(Piece::Group(one)), 1),
        _ => (None, 0),
    }
}
