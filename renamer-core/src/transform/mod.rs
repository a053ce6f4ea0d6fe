//! Filename Transformation
//!
//! Applies a rule chain to a filename. The transform is pure and total:
//! the same filename and rules always give the same result, and a rule that
//! cannot be applied (a malformed regex, say) is skipped with a warning
//! instead of failing the whole name.
//!
//! # Algorithm
//!
//! 1. Split the filename at its last `.`, unless that dot is the first
//!    character. The extension, dot included, is put back untouched.
//! 2. Run every valid rule over the base, left to right.
//! 3. Reassemble base and extension.
//!
//! A [`Pipeline`] compiles the chain once (regexes included) so the live
//! preview can run it over every loaded file cheaply.

mod pattern;

use std::sync::Arc;

use regex::{NoExpand, Regex, RegexBuilder};

use crate::rules::{Rule, TrimPosition};

use self::pattern::RegexStep;

/// Split a filename into base and extension at the last non-leading `.`.
///
/// The extension keeps its dot. A name starting with its only dot (like
/// `.bashrc`) has no extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => filename.split_at(index),
        _ => (filename, ""),
    }
}

/// Apply `rules` to `filename`. Invalid rules are skipped.
pub fn apply_rules(filename: &str, rules: &[Rule]) -> String {
    Pipeline::new(rules.to_vec()).apply(filename)
}

/// A compiled rule chain.
///
/// Two pipelines are equal when they were built from equal rules.
#[derive(Debug, Clone)]
pub struct Pipeline {
    rules: Vec<Rule>,
    steps: Arc<[Step]>,
}

#[derive(Debug, Clone)]
enum Step {
    Replace { search: String, replacement: String },
    ReplaceCaseInsensitive { matcher: Regex, replacement: String },
    Regex(RegexStep),
    Trim { position: TrimPosition, count: usize },
    TrimWhitespace,
    Prefix(String),
    Suffix(String),
    RemoveSpans { open: char, close: char },
}

impl Pipeline {
    /// Compile `rules`, dropping the ones that are invalid or fail to compile.
    pub fn new(rules: Vec<Rule>) -> Self {
        let steps: Vec<Step> = rules
            .iter()
            .filter(|rule| rule.is_valid())
            .filter_map(compile)
            .collect();

        Self {
            rules,
            steps: steps.into(),
        }
    }

    /// The rules this pipeline was built from.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules that will actually run.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Transform one filename.
    pub fn apply(&self, filename: &str) -> String {
        let (base, extension) = split_extension(filename);
        let mut base = base.to_string();

        for step in self.steps.iter() {
            base = step.apply(&base);
        }

        base.push_str(extension);
        base
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
    }
}

impl Eq for Pipeline {}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn compile(rule: &Rule) -> Option<Step> {
    let step = match rule {
        Rule::Replace {
            search,
            replacement,
        } => Step::Replace {
            search: search.clone(),
            replacement: replacement.clone(),
        },
        Rule::ReplaceCaseInsensitive {
            search,
            replacement,
        } => match RegexBuilder::new(&regex::escape(search))
            .case_insensitive(true)
            .build()
        {
            Ok(matcher) => Step::ReplaceCaseInsensitive {
                matcher,
                replacement: replacement.clone(),
            },
            Err(err) => {
                tracing::warn!(%search, error = %err, "skipping case-insensitive replace");
                return None;
            }
        },
        Rule::Regex {
            pattern,
            replacement,
            flags,
        } => match RegexStep::compile(pattern, replacement, flags) {
            Ok(step) => Step::Regex(step),
            Err(err) => {
                tracing::warn!(%pattern, %flags, error = %err, "skipping invalid regex rule");
                return None;
            }
        },
        Rule::Trim { position, count } => Step::Trim {
            position: *position,
            count: *count,
        },
        Rule::TrimWhitespace => Step::TrimWhitespace,
        Rule::Prefix { text } => Step::Prefix(text.clone()),
        Rule::Suffix { text } => Step::Suffix(text.clone()),
        Rule::RemoveParentheses => Step::RemoveSpans {
            open: '(',
            close: ')',
        },
        Rule::RemoveSquareBrackets => Step::RemoveSpans {
            open: '[',
            close: ']',
        },
        Rule::RemoveCurlyBrackets => Step::RemoveSpans {
            open: '{',
            close: '}',
        },
    };
    Some(step)
}

impl Step {
    fn apply(&self, base: &str) -> String {
        match self {
            Step::Replace {
                search,
                replacement,
            } => base.replace(search.as_str(), replacement),
            Step::ReplaceCaseInsensitive {
                matcher,
                replacement,
            } => matcher
                .replace_all(base, NoExpand(replacement))
                .into_owned(),
            Step::Regex(step) => step.apply(base),
            Step::Trim { position, count } => trim_chars(base, *position, *count),
            Step::TrimWhitespace => collapse_whitespace(base),
            Step::Prefix(text) => format!("{text}{base}"),
            Step::Suffix(text) => format!("{base}{text}"),
            Step::RemoveSpans { open, close } => remove_spans(base, *open, *close),
        }
    }
}

/// Remove `count` characters from one end. Over-trimming empties the base.
fn trim_chars(base: &str, position: TrimPosition, count: usize) -> String {
    match position {
        TrimPosition::Start => base.chars().skip(count).collect(),
        TrimPosition::End => {
            let keep = base.chars().count().saturating_sub(count);
            base.chars().take(keep).collect()
        }
    }
}

/// Trim both ends, then turn every interior run of two or more whitespace
/// characters into one space. Lone whitespace characters are kept as is.
fn collapse_whitespace(base: &str) -> String {
    let mut out = String::with_capacity(base.len());
    let mut run: Option<(char, usize)> = None;

    for c in base.trim().chars() {
        if c.is_whitespace() {
            run = Some(match run {
                Some((first, len)) => (first, len + 1),
                None => (c, 1),
            });
            continue;
        }
        match run.take() {
            Some((first, 1)) => out.push(first),
            Some(_) => out.push(' '),
            None => {}
        }
        out.push(c);
    }

    out
}

/// Remove every shortest span from `open` to the next `close`.
///
/// Brackets are not balanced: in `a(b(c)d)e` the span is `(b(c)`, leaving
/// `ad)e`. A span never crosses a newline, and an opener without a closer
/// is kept.
fn remove_spans(base: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(base.len());
    let mut rest = base;

    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len_utf8()..];
        match after_open.find(|c: char| c == close || c == '\n') {
            Some(end) if after_open[end..].starts_with(close) => {
                out.push_str(&rest[..start]);
                rest = &after_open[end + close.len_utf8()..];
            }
            _ => {
                out.push_str(&rest[..start + open.len_utf8()]);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(search: &str, replacement: &str) -> Rule {
        Rule::Replace {
            search: search.into(),
            replacement: replacement.into(),
        }
    }

    #[test]
    fn split_uses_last_non_leading_dot() {
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
        assert_eq!(split_extension(".config.json"), (".config", ".json"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
    }

    #[test]
    fn empty_and_disabled_chains_are_no_ops() {
        assert_eq!(apply_rules("photo.jpg", &[]), "photo.jpg");
        assert_eq!(apply_rules("photo.jpg", &[replace("", "x")]), "photo.jpg");
    }

    #[test]
    fn replace_is_literal() {
        assert_eq!(apply_rules("a.b.txt", &[replace(".", "_")]), "a_b.txt");
        assert_eq!(apply_rules("a+b*c.txt", &[replace("+", "-")]), "a-b*c.txt");
    }

    #[test]
    fn extension_is_never_touched() {
        let rules = [replace("t", "T"), Rule::Suffix { text: "_v2".into() }];
        assert_eq!(apply_rules("test.txt", &rules), "TesT_v2.txt");
    }

    #[test]
    fn case_insensitive_replace() {
        let rule = Rule::ReplaceCaseInsensitive {
            search: "foo".into(),
            replacement: "X".into(),
        };
        assert_eq!(apply_rules("FOO-bar.txt", &[rule]), "X-bar.txt");
    }

    #[test]
    fn case_insensitive_replace_escapes_search_and_keeps_replacement_literal() {
        let rule = Rule::ReplaceCaseInsensitive {
            search: "(A)".into(),
            replacement: "$1".into(),
        };
        assert_eq!(apply_rules("x(a)y.md", &[rule]), "x$1y.md");
    }

    #[test]
    fn invalid_regex_is_skipped() {
        let rules = [
            Rule::Regex {
                pattern: "([".into(),
                replacement: "x".into(),
                flags: "g".into(),
            },
            Rule::Prefix { text: "ok-".into() },
        ];
        assert_eq!(apply_rules("song.mp3", &rules), "ok-song.mp3");
    }

    #[test]
    fn regex_backreference_and_lookahead() {
        let repeated = Rule::Regex {
            pattern: "(a)\\1".into(),
            replacement: "x".into(),
            flags: "g".into(),
        };
        assert_eq!(apply_rules("aab.txt", &[repeated]), "xb.txt");

        let before_dash = Rule::Regex {
            pattern: "\\d(?=-)".into(),
            replacement: "#".into(),
            flags: "".into(),
        };
        assert_eq!(apply_rules("v1-final.txt", &[before_dash]), "v#-final.txt");
    }

    #[test]
    fn regex_replaces_in_base_only() {
        let rule = Rule::Regex {
            pattern: "\\s+".into(),
            replacement: "_".into(),
            flags: "g".into(),
        };
        assert_eq!(apply_rules("my holiday  pic.jpeg", &[rule]), "my_holiday_pic.jpeg");
    }

    #[test]
    fn trim_boundaries() {
        let start = Rule::Trim {
            position: TrimPosition::Start,
            count: 10,
        };
        assert_eq!(apply_rules("hello.png", &[start]), ".png");

        let end = Rule::Trim {
            position: TrimPosition::End,
            count: 2,
        };
        assert_eq!(apply_rules("hello.png", &[end]), "hel.png");
    }

    #[test]
    fn trim_counts_characters_not_bytes() {
        let rule = Rule::Trim {
            position: TrimPosition::Start,
            count: 1,
        };
        assert_eq!(apply_rules("éclair.txt", &[rule]), "clair.txt");
    }

    #[test]
    fn trim_whitespace_collapses_runs_only() {
        assert_eq!(
            apply_rules("  a  b c\t\td .txt", &[Rule::TrimWhitespace]),
            "a b c d.txt"
        );
        assert_eq!(apply_rules("a\tb.txt", &[Rule::TrimWhitespace]), "a\tb.txt");
    }

    #[test]
    fn affixes() {
        let rules = [
            Rule::Prefix { text: "2024 - ".into() },
            Rule::Suffix { text: " (final)".into() },
        ];
        assert_eq!(apply_rules("report.pdf", &rules), "2024 - report (final).pdf");
    }

    #[test]
    fn bracket_removal_is_shortest_span() {
        assert_eq!(
            apply_rules("a(b(c)d)e.txt", &[Rule::RemoveParentheses]),
            "ad)e.txt"
        );
        assert_eq!(apply_rules("(a(b)c).txt", &[Rule::RemoveParentheses]), "c).txt");
        assert_eq!(
            apply_rules("Movie [1080p] [x264].mkv", &[Rule::RemoveSquareBrackets]),
            "Movie  .mkv"
        );
        assert_eq!(apply_rules("a{b}c{d.txt", &[Rule::RemoveCurlyBrackets]), "ac{d.txt");
    }

    #[test]
    fn rules_apply_in_order() {
        let brackets_then_tidy = [Rule::RemoveSquareBrackets, Rule::TrimWhitespace];
        assert_eq!(
            apply_rules("Show [HD] S01E02 [eng].mkv", &brackets_then_tidy),
            "Show S01E02.mkv"
        );

        let tidy_then_brackets = [Rule::TrimWhitespace, Rule::RemoveSquareBrackets];
        assert_eq!(
            apply_rules("Show [HD] S01E02 [eng].mkv", &tidy_then_brackets),
            "Show  S01E02 .mkv"
        );
    }

    #[test]
    fn transform_is_deterministic() {
        let pipeline = Pipeline::new(vec![Rule::Prefix { text: "x".into() }]);
        assert_eq!(pipeline.apply("a.txt"), pipeline.apply("a.txt"));
        assert_eq!(pipeline.apply(&pipeline.apply("a.txt")), "xxa.txt");
    }

    #[test]
    fn pipeline_skips_invalid_rules_when_compiling() {
        let pipeline = Pipeline::new(vec![replace("", "x"), Rule::TrimWhitespace]);
        assert_eq!(pipeline.step_count(), 1);
        assert_eq!(pipeline.rules().len(), 2);
        assert_eq!(pipeline, Pipeline::new(vec![replace("", "x"), Rule::TrimWhitespace]));
    }
}
