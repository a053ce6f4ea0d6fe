//! Rename batches.
//!
//! A batch computes every target name up front, sends the changed ones to
//! the collaborator in one call, then merges the outcomes back in a single
//! reactive turn.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{FileEntry, FileRegistry};
use crate::error::{FsError, RenameError};
use crate::fs::{FileSystem, RenameOutcome, RenameRequest};
use crate::reactive::Runtime;
use crate::transform::Pipeline;

/// Results of the last batch in registry order.
///
/// Keyed by original name. When two loaded files share a name, the later
/// one is keyed by its original path instead.
pub type RenameResults = IndexMap<String, RenameResult>;

/// What happened to one file in the last batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FsError>,
    /// The rules left the name as it was; nothing was sent to the filesystem.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unchanged: bool,
}

impl RenameResult {
    pub fn renamed(new_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            success: true,
            new_name: Some(new_name.into()),
            path: Some(path.into()),
            error: None,
            unchanged: false,
        }
    }

    pub fn unchanged(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            unchanged: true,
            ..Self::renamed(name, path)
        }
    }

    pub fn failed(error: FsError) -> Self {
        Self {
            success: false,
            new_name: None,
            path: None,
            error: Some(error),
            unchanged: false,
        }
    }

    /// The error text to show next to the file.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

impl From<RenameOutcome> for RenameResult {
    fn from(outcome: RenameOutcome) -> Self {
        match outcome.result {
            Ok(file) => Self::renamed(file.new_name, file.path),
            Err(error) => Self::failed(error),
        }
    }
}

/// Per-row status shown next to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RowStatus {
    /// Not part of the last batch.
    Pending,
    Renamed { new_name: String },
    Unchanged,
    Failed { error: String },
}

impl From<Option<&RenameResult>> for RowStatus {
    fn from(result: Option<&RenameResult>) -> Self {
        match result {
            None => RowStatus::Pending,
            Some(result) if result.unchanged => RowStatus::Unchanged,
            Some(result) if result.success => RowStatus::Renamed {
                new_name: result.new_name.clone().unwrap_or_default(),
            },
            Some(result) => RowStatus::Failed {
                error: result.error_message().unwrap_or_default(),
            },
        }
    }
}

/// Counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenameSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl RenameSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.unchanged
    }

    fn record(&mut self, result: &RenameResult) {
        if result.unchanged {
            self.unchanged += 1;
        } else if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl fmt::Display for RenameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.succeeded == 1 { "file" } else { "files" };
        write!(f, "Renamed {} {noun}", self.succeeded)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.unchanged > 0 {
            write!(f, ", {} unchanged", self.unchanged)?;
        }
        Ok(())
    }
}

/// Replace the final segment of `path` with `new_name`.
///
/// `new_name` is inserted as-is; nothing in it is interpreted.
pub fn rewrite_final_segment(path: &str, new_name: &str) -> String {
    match path.rfind(std::path::is_separator) {
        Some(index) => {
            let mut rewritten = String::with_capacity(index + 1 + new_name.len());
            rewritten.push_str(&path[..=index]);
            rewritten.push_str(new_name);
            rewritten
        }
        None => new_name.to_string(),
    }
}

enum Plan {
    Unchanged,
    Failed(FsError),
    Submitted { new_name: String },
}

impl FileRegistry {
    /// Rename every loaded file through `pipeline`.
    ///
    /// Fails without touching anything when there are no files or no rules.
    /// Otherwise every file gets a result, and the summary counts them.
    pub async fn rename_all<F: FileSystem>(
        &self,
        fs: &F,
        pipeline: &Pipeline,
    ) -> Result<RenameSummary, RenameError> {
        let entries = self.files.get_untracked();
        if entries.is_empty() {
            return Err(RenameError::NoFiles);
        }
        if pipeline.rules().is_empty() {
            return Err(RenameError::NoRules);
        }

        let mut plans = Vec::with_capacity(entries.len());
        let mut requests = Vec::new();

        for entry in &entries {
            let name = entry.name.get_untracked();
            let new_name = pipeline.apply(&name);

            let plan = if new_name == name {
                Plan::Unchanged
            } else if !entry.has_path() {
                Plan::Failed(FsError::UnresolvedPath)
            } else {
                requests.push(RenameRequest {
                    original_path: entry.path.get_untracked(),
                    original_name: name.clone(),
                    new_name: new_name.clone(),
                });
                Plan::Submitted { new_name }
            };
            plans.push((name, plan));
        }

        // Names repeat across folders, so outcomes are matched by path.
        let mut outcomes: HashMap<String, VecDeque<RenameOutcome>> = HashMap::new();
        if !requests.is_empty() {
            tracing::debug!(requests = requests.len(), "submitting rename batch");
            for outcome in fs.rename_batch(requests).await {
                outcomes
                    .entry(outcome.original_path.clone())
                    .or_default()
                    .push_back(outcome);
            }
        }

        let mut results = RenameResults::with_capacity(entries.len());
        let mut keyed = Vec::with_capacity(entries.len());
        let mut renames = Vec::new();
        let mut summary = RenameSummary::default();

        for (index, (entry, (name, plan))) in entries.iter().zip(plans).enumerate() {
            let path = entry.path.get_untracked();
            let result = match plan {
                Plan::Unchanged => RenameResult::unchanged(&name, &path),
                Plan::Failed(error) => RenameResult::failed(error),
                Plan::Submitted { new_name } => {
                    match outcomes.get_mut(&path).and_then(VecDeque::pop_front) {
                        Some(outcome) => {
                            let result = RenameResult::from(outcome);
                            if result.success {
                                renames.push((entry.clone(), new_name));
                            }
                            result
                        }
                        None => RenameResult::failed(FsError::MissingResult(name.clone())),
                    }
                }
            };

            if let Some(error) = &result.error {
                tracing::warn!(%name, %error, "file not renamed");
            }
            summary.record(&result);

            let key = result_key(&results, name, &path, index);
            results.insert(key.clone(), result);
            keyed.push((entry.clone(), key));
        }

        Runtime::batch(|| {
            for (entry, key) in keyed {
                entry.set_result_key(Some(key));
            }
            for (entry, new_name) in &renames {
                apply_rename(entry, new_name);
            }
            self.results.set(results);
        });

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            unchanged = summary.unchanged,
            "rename batch finished"
        );
        Ok(summary)
    }
}

/// A results key unique within this batch: the original name, then the
/// original path, then the name tagged with the row index.
fn result_key(results: &RenameResults, name: String, path: &str, index: usize) -> String {
    if !results.contains_key(&name) {
        return name;
    }
    if !path.is_empty() && !results.contains_key(path) {
        return path.to_string();
    }
    format!("{name}#{index}")
}

fn apply_rename(entry: &FileEntry, new_name: &str) {
    let path = rewrite_final_segment(&entry.path.get_untracked(), new_name);
    entry.name.set(new_name.to_string());
    entry.path.set(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::tests::FakeFs;
    use crate::fs::FileSpec;
    use crate::rules::Rule;

    fn registry(files: &[(&str, &str)]) -> FileRegistry {
        let registry = FileRegistry::new();
        registry.set_files(
            files
                .iter()
                .map(|(name, path)| FileSpec {
                    name: name.to_string(),
                    path: path.to_string(),
                    size: 1,
                })
                .collect(),
        );
        registry
    }

    fn replace(search: &str, replacement: &str) -> Pipeline {
        Pipeline::new(vec![Rule::Replace {
            search: search.into(),
            replacement: replacement.into(),
        }])
    }

    #[test]
    fn rewrites_only_the_final_segment() {
        assert_eq!(rewrite_final_segment("/a/b/old.txt", "new.txt"), "/a/b/new.txt");
        assert_eq!(rewrite_final_segment("old.txt", "new.txt"), "new.txt");
        assert_eq!(rewrite_final_segment("/old/old.txt", "$&.txt"), "/old/$&.txt");
        // A separator in the new name is kept verbatim; the filesystem
        // rejects it before the path is ever rewritten.
        assert_eq!(rewrite_final_segment("/a/b/old.txt", "x/y.txt"), "/a/b/x/y.txt");
    }

    #[test]
    fn summary_message() {
        let summary = RenameSummary {
            succeeded: 2,
            failed: 1,
            unchanged: 0,
        };
        assert_eq!(summary.to_string(), "Renamed 2 files, 1 failed");
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn row_status_from_results() {
        assert_eq!(RowStatus::from(None), RowStatus::Pending);
        assert_eq!(
            RowStatus::from(Some(&RenameResult::unchanged("a", "/a"))),
            RowStatus::Unchanged
        );
        assert_eq!(
            RowStatus::from(Some(&RenameResult::failed(FsError::Io("busy".into())))),
            RowStatus::Failed {
                error: "busy".into()
            }
        );
    }

    #[test]
    fn result_serializes_without_empty_fields() {
        let json = serde_json::to_value(RenameResult::renamed("b.txt", "/x/b.txt")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "newName": "b.txt", "path": "/x/b.txt"})
        );
    }

    #[tokio::test]
    async fn validation_blocks_the_batch() {
        let fs = FakeFs::default();

        let empty = FileRegistry::new();
        assert_eq!(
            empty.rename_all(&fs, &replace("a", "b")).await,
            Err(RenameError::NoFiles)
        );

        let files = registry(&[("a.txt", "/d/a.txt")]);
        assert_eq!(
            files.rename_all(&fs, &Pipeline::default()).await,
            Err(RenameError::NoRules)
        );
        assert!(fs.submitted.lock().is_empty());
        assert!(files.results().is_empty());
    }

    #[tokio::test]
    async fn unchanged_files_never_reach_the_filesystem() {
        let fs = FakeFs::default();
        let files = registry(&[("keep.txt", "/d/keep.txt"), ("old.txt", "/d/old.txt")]);

        let summary = files.rename_all(&fs, &replace("old", "new")).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.unchanged, 1);
        let submitted = fs.submitted.lock();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].original_name, "old.txt");

        let results = files.results();
        assert!(results["keep.txt"].unchanged);
        assert!(results["keep.txt"].success);
    }

    #[tokio::test]
    async fn successful_renames_update_name_and_path() {
        let fs = FakeFs::default();
        let files = registry(&[("old.txt", "/a/b/old.txt")]);

        files.rename_all(&fs, &replace("old", "new")).await.unwrap();

        let entry = &files.entries()[0];
        assert_eq!(entry.name.get_untracked(), "new.txt");
        assert_eq!(entry.path.get_untracked(), "/a/b/new.txt");
        assert_eq!(entry.result_key().as_deref(), Some("old.txt"));
        assert_eq!(
            files.result_for(entry),
            Some(RenameResult::renamed("new.txt", "/a/b/new.txt"))
        );
    }

    #[tokio::test]
    async fn partial_failure_keeps_other_results() {
        let mut fs = FakeFs::default();
        fs.failing
            .insert("two.txt".into(), "permission denied".into());
        let files = registry(&[
            ("one.txt", "/d/one.txt"),
            ("two.txt", "/d/two.txt"),
            ("three.txt", "/d/three.txt"),
        ]);

        let summary = files.rename_all(&fs, &replace("t", "T")).await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unchanged, 1);

        let results = files.results();
        let keys: Vec<_> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["one.txt", "two.txt", "three.txt"]);
        assert_eq!(
            results["two.txt"].error_message().as_deref(),
            Some("permission denied")
        );
        assert_eq!(files.entries()[1].name.get_untracked(), "two.txt");
        assert_eq!(files.entries()[2].name.get_untracked(), "Three.txt");
    }

    #[tokio::test]
    async fn entries_without_a_path_fail_fast() {
        let fs = FakeFs::default();
        let files = registry(&[("lost.txt", "")]);

        let summary = files.rename_all(&fs, &replace("lost", "found")).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(fs.submitted.lock().is_empty());
        assert_eq!(
            files.results()["lost.txt"].error,
            Some(FsError::UnresolvedPath)
        );
    }

    #[tokio::test]
    async fn a_new_batch_replaces_old_results() {
        let fs = FakeFs::default();
        let files = registry(&[("a.txt", "/d/a.txt")]);

        files.rename_all(&fs, &replace("a", "b")).await.unwrap();
        files.rename_all(&fs, &replace("b", "c")).await.unwrap();

        let results = files.results();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("b.txt"));
        assert_eq!(files.entries()[0].path.get_untracked(), "/d/c.txt");
    }

    #[tokio::test]
    async fn duplicate_names_in_different_folders() {
        let fs = FakeFs::default();
        let files = registry(&[
            ("a.txt", "/x/a.txt"),
            ("a.txt", "/y/a.txt"),
            ("b.txt", "/x/b.txt"),
        ]);
        let pipeline = Pipeline::new(vec![Rule::Prefix { text: "new-".into() }]);

        let summary = files.rename_all(&fs, &pipeline).await.unwrap();
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);

        let entries = files.entries();
        let paths: Vec<_> = entries.iter().map(|e| e.path.get_untracked()).collect();
        assert_eq!(paths, vec!["/x/new-a.txt", "/y/new-a.txt", "/x/new-b.txt"]);

        assert_eq!(entries[0].result_key().as_deref(), Some("a.txt"));
        assert_eq!(entries[1].result_key().as_deref(), Some("/y/a.txt"));
        assert_eq!(entries[2].result_key().as_deref(), Some("b.txt"));

        assert_eq!(
            files.result_for(&entries[0]),
            Some(RenameResult::renamed("new-a.txt", "/x/new-a.txt"))
        );
        assert_eq!(
            files.result_for(&entries[1]),
            Some(RenameResult::renamed("new-a.txt", "/y/new-a.txt"))
        );
        assert_eq!(
            files.result_for(&entries[2]),
            Some(RenameResult::renamed("new-b.txt", "/x/new-b.txt"))
        );
    }

    #[test]
    fn result_keys_stay_unique() {
        let mut results = RenameResults::new();
        results.insert("a.txt".into(), RenameResult::unchanged("a.txt", "/x/a.txt"));
        results.insert("/y/a.txt".into(), RenameResult::unchanged("a.txt", "/y/a.txt"));

        assert_eq!(result_key(&results, "b.txt".into(), "/x/b.txt", 0), "b.txt");
        assert_eq!(result_key(&results, "a.txt".into(), "/z/a.txt", 2), "/z/a.txt");
        assert_eq!(result_key(&results, "a.txt".into(), "/y/a.txt", 3), "a.txt#3");
        assert_eq!(result_key(&results, "a.txt".into(), "", 4), "a.txt#4");
    }
}
