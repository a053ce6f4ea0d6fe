//! Renamer
//!
//! The surface a shell binds to: the rule chain, the file list, and live
//! derived values for the preview table. The compiled pipeline is a
//! [`Computed`], so it is rebuilt once per flush after a rule edit and every
//! preview cell downstream re-runs only if the pipeline really changed.
//!
//! Rule and selection edits made by the shell take effect at the next
//! [`flush`](crate::reactive::flush), or immediately when wrapped in
//! [`batch`](crate::reactive::batch).
//!
//! The reactive runtime is per thread, so a `Renamer` must be driven from
//! the thread that created it. Run its futures on a current-thread tokio
//! runtime or a `LocalSet`; a multi-thread runtime may resume them on a
//! worker whose runtime knows none of the renamer's effects.

use std::thread::{self, ThreadId};

use serde::Serialize;

use crate::config::RenamerConfig;
use crate::error::RenameError;
use crate::files::{FileEntry, FileRegistry, LoadReport, RenameSummary, RowStatus};
use crate::fs::FileSystem;
use crate::reactive::{Computed, Runtime};
use crate::rules::RuleChain;
use crate::transform::Pipeline;

/// One row of the preview table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub name: String,
    pub preview: String,
    pub changed: bool,
    pub selected: bool,
}

/// Rule chain, file list and the live preview over both.
#[derive(Clone)]
pub struct Renamer {
    config: RenamerConfig,
    rules: RuleChain,
    files: FileRegistry,
    pipeline: Computed<Pipeline>,
    home: ThreadId,
}

impl Renamer {
    pub fn new(config: RenamerConfig) -> Self {
        let rules = RuleChain::new(config.clone());
        let pipeline = {
            let rules = rules.clone();
            Computed::new(move || Pipeline::new(rules.active_rules()))
        };

        Self {
            config,
            rules,
            files: FileRegistry::new(),
            pipeline,
            home: thread::current().id(),
        }
    }

    /// Whether the caller runs on the thread whose runtime holds this
    /// renamer's effects.
    pub fn on_home_thread(&self) -> bool {
        thread::current().id() == self.home
    }

    pub fn config(&self) -> &RenamerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleChain {
        &self.rules
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    /// The pipeline built from the enabled rules.
    pub fn pipeline(&self) -> &Computed<Pipeline> {
        &self.pipeline
    }

    /// Live preview of the new name for `entry`.
    pub fn preview(&self, entry: &FileEntry) -> Computed<String> {
        let pipeline = self.pipeline.clone();
        let name = entry.name.clone();
        Computed::new(move || {
            let name = name.get();
            pipeline.with(|pipeline| pipeline.apply(&name))
        })
    }

    /// Live status badge for `entry`, from the last rename batch.
    pub fn status(&self, entry: &FileEntry) -> Computed<RowStatus> {
        let files = self.files.clone();
        let entry = entry.clone();
        Computed::new(move || RowStatus::from(files.result_for(&entry).as_ref()))
    }

    /// Live preview of the whole table.
    pub fn preview_rows(&self) -> Computed<Vec<PreviewRow>> {
        let pipeline = self.pipeline.clone();
        let files = self.files.clone();
        Computed::new(move || {
            let entries = files.entries();
            pipeline.with(|pipeline| {
                entries
                    .iter()
                    .map(|entry| {
                        let name = entry.name.get();
                        let preview = pipeline.apply(&name);
                        PreviewRow {
                            changed: preview != name,
                            selected: entry.selected.get(),
                            name,
                            preview,
                        }
                    })
                    .collect()
            })
        })
    }

    /// Replace the file list with `sources` and refresh everything derived
    /// from it.
    ///
    /// Must be polled on the renamer's home thread.
    pub async fn add_files<F: FileSystem>(&self, fs: &F, sources: &[F::Handle]) -> LoadReport {
        let report = self.files.add_files(fs, sources).await;
        debug_assert!(self.on_home_thread(), "Renamer::add_files resumed off its home thread");
        Runtime::flush();
        report
    }

    /// Rename every loaded file with the current rules.
    ///
    /// Must be polled on the renamer's home thread.
    pub async fn commit_rename<F: FileSystem>(&self, fs: &F) -> Result<RenameSummary, RenameError> {
        debug_assert!(self.on_home_thread(), "Renamer::commit_rename polled off its home thread");
        // Rule edits still queued must reach the pipeline first.
        Runtime::flush();
        let pipeline = self.pipeline.get_untracked();
        let summary = self.files.rename_all(fs, &pipeline).await;
        debug_assert!(self.on_home_thread(), "Renamer::commit_rename resumed off its home thread");
        summary
    }
}

impl Default for Renamer {
    fn default() -> Self {
        Self::new(RenamerConfig::default())
    }
}
