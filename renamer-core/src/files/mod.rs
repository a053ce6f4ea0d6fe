//! File Registry
//!
//! The ordered list of loaded files, their selection state, and the
//! results of the last rename batch.
//!
//! Loading is a destructive replace: every load swaps in a new list and
//! drops the previous results. Selection only flips per-entry flags and
//! never affects what gets renamed.

mod rename;

pub use rename::{rewrite_final_segment, RenameResult, RenameResults, RenameSummary, RowStatus};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FsError;
use crate::fs::{FileSpec, FileSystem};
use crate::reactive::Signal;

/// Unique identifier for a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u64);

impl FileId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A loaded file.
///
/// `name` and `path` change together after a successful rename; only the
/// final segment of `path` is ever rewritten. Clones share their signals
/// and entries compare by identity.
#[derive(Clone)]
pub struct FileEntry {
    id: FileId,
    pub name: Signal<String>,
    pub path: Signal<String>,
    size: u64,
    pub selected: Signal<bool>,
    /// Key of this entry in the current results table.
    result_key: Signal<Option<String>>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            id: FileId::new(),
            name: Signal::new(name.into()),
            path: Signal::new(path.into()),
            size,
            selected: Signal::new(false),
            result_key: Signal::new(None),
        }
    }

    pub fn from_spec(spec: FileSpec) -> Self {
        Self::new(spec.name, spec.path, spec.size)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the entry can be renamed at all.
    pub fn has_path(&self) -> bool {
        self.path.with_untracked(|path| !path.is_empty())
    }

    /// Key of this entry in the results table, if the last batch covered it.
    pub fn result_key(&self) -> Option<String> {
        self.result_key.get()
    }

    pub(crate) fn set_result_key(&self, key: Option<String>) {
        self.result_key.set(key);
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FileEntry {}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("id", &self.id)
            .field("name", &self.name.get_untracked())
            .field("path", &self.path.get_untracked())
            .field("size", &self.size)
            .field("selected", &self.selected.get_untracked())
            .finish()
    }
}

/// Modifier keys held during a row click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    /// Select the range from the last clicked row.
    pub shift: bool,
    /// Toggle the clicked row, keeping the rest of the selection.
    pub toggle: bool,
}

/// A source that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub name: String,
    pub error: FsError,
}

/// What happened while loading a set of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries now in the registry.
    pub added: usize,
    /// Sources kept as entries without a path (un-renameable).
    pub unresolved: Vec<String>,
    /// Sources that produced no entries.
    pub failures: Vec<LoadFailure>,
}

/// The loaded files and the last rename results.
#[derive(Clone)]
pub struct FileRegistry {
    files: Signal<Vec<FileEntry>>,
    results: Signal<RenameResults>,
    anchor: Signal<Option<usize>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self {
            files: Signal::new(Vec::new()),
            results: Signal::new(RenameResults::new()),
            anchor: Signal::new(None),
        }
    }

    /// The entries, in display order (tracked).
    pub fn entries(&self) -> Vec<FileEntry> {
        self.files.get()
    }

    /// The entry at `index`, if any (tracked).
    pub fn get(&self, index: usize) -> Option<FileEntry> {
        self.files.with(|files| files.get(index).cloned())
    }

    pub fn len(&self) -> usize {
        self.files.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Results of the last rename batch, keyed by original name (tracked).
    pub fn results(&self) -> RenameResults {
        self.results.get()
    }

    /// The result recorded for `entry` by the last batch (tracked).
    pub fn result_for(&self, entry: &FileEntry) -> Option<RenameResult> {
        let key = entry.result_key()?;
        self.results.with(|results| results.get(&key).cloned())
    }

    /// Replace the file list with the given sources.
    ///
    /// Each source is resolved through `fs`. Folders are expanded to the
    /// files directly inside them. A source whose path cannot be resolved
    /// is still listed, without a path. Clears the previous results.
    pub async fn add_files<F: FileSystem>(&self, fs: &F, sources: &[F::Handle]) -> LoadReport {
        let mut entries = Vec::new();
        let mut report = LoadReport::default();

        for handle in sources {
            let name = fs.handle_name(handle);
            let path = match fs.resolve_path(handle).await {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!(%name, error = %err, "could not resolve path");
                    report.unresolved.push(name.clone());
                    let size = fs.handle_size(handle).await;
                    entries.push(FileEntry::new(name, String::new(), size));
                    continue;
                }
            };

            if !fs.is_directory(&path).await {
                let size = fs.handle_size(handle).await;
                entries.push(FileEntry::new(name, path, size));
                continue;
            }

            match fs.list_immediate_files(&path).await {
                Ok(children) => entries.extend(children.into_iter().map(FileEntry::from_spec)),
                Err(error) => {
                    tracing::warn!(%name, %error, "could not list folder");
                    report.failures.push(LoadFailure { name, error });
                }
            }
        }

        report.added = entries.len();
        self.replace(entries);
        report
    }

    /// Replace the file list with already-resolved files.
    pub fn set_files(&self, specs: Vec<FileSpec>) {
        self.replace(specs.into_iter().map(FileEntry::from_spec).collect());
    }

    fn replace(&self, entries: Vec<FileEntry>) {
        tracing::debug!(files = entries.len(), "replaced file list");
        self.files.set(entries);
        self.results.set(RenameResults::new());
        self.anchor.set(None);
    }

    /// Remove every file and every result.
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// Drop the selected entries from the list.
    pub fn remove_selected(&self) -> usize {
        let before = self.files.with_untracked(Vec::len);
        self.files.update(|files| {
            files
                .iter()
                .filter(|entry| !entry.selected.get_untracked())
                .cloned()
                .collect()
        });
        self.anchor.set(None);
        before - self.files.with_untracked(Vec::len)
    }

    pub fn select_all(&self) {
        self.for_each_entry(|_, entry| {
            entry.selected.set(true);
        });
    }

    pub fn deselect_all(&self) {
        self.for_each_entry(|_, entry| {
            entry.selected.set(false);
        });
    }

    pub fn invert_selection(&self) {
        self.for_each_entry(|_, entry| {
            entry.selected.update(|selected| !selected);
        });
    }

    /// Flip the selection of one row.
    pub fn toggle(&self, index: usize) -> bool {
        match self.files.with_untracked(|files| files.get(index).cloned()) {
            Some(entry) => {
                entry.selected.update(|selected| !selected);
                self.anchor.set(Some(index));
                true
            }
            None => false,
        }
    }

    /// Handle a click on a row.
    ///
    /// A plain click selects only that row. With `toggle` the row flips and
    /// the rest stays. With `shift` the range from the last clicked row is
    /// selected, replacing the selection unless `toggle` is also held.
    pub fn click(&self, index: usize, modifiers: ClickModifiers) -> bool {
        if index >= self.files.with_untracked(Vec::len) {
            return false;
        }

        let anchor = self.anchor.get_untracked();
        match (modifiers.shift, anchor) {
            (true, Some(anchor)) => {
                let (low, high) = (anchor.min(index), anchor.max(index));
                self.for_each_entry(|i, entry| {
                    let in_range = (low..=high).contains(&i);
                    if in_range {
                        entry.selected.set(true);
                    } else if !modifiers.toggle {
                        entry.selected.set(false);
                    }
                });
            }
            _ if modifiers.toggle => {
                return self.toggle(index);
            }
            _ => {
                self.for_each_entry(|i, entry| {
                    entry.selected.set(i == index);
                });
                self.anchor.set(Some(index));
            }
        }
        true
    }

    /// The selected entries (tracked).
    pub fn selected(&self) -> Vec<FileEntry> {
        self.files
            .get()
            .into_iter()
            .filter(|entry| entry.selected.get())
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected().len()
    }

    fn for_each_entry(&self, mut f: impl FnMut(usize, &FileEntry)) {
        self.files.with_untracked(|files| {
            for (i, entry) in files.iter().enumerate() {
                f(i, entry);
            }
        });
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::{RenameOutcome, RenameRequest};
    use std::collections::{HashMap, HashSet};

    /// In-memory collaborator for registry and renamer tests.
    #[derive(Default)]
    pub(crate) struct FakeFs {
        pub unresolvable: HashSet<String>,
        pub folders: HashMap<String, Vec<FileSpec>>,
        pub broken_folders: HashSet<String>,
        pub failing: HashMap<String, String>,
        pub submitted: parking_lot::Mutex<Vec<RenameRequest>>,
    }

    impl FileSystem for FakeFs {
        type Handle = String;

        fn handle_name(&self, handle: &String) -> String {
            handle.rsplit('/').next().unwrap_or_default().to_string()
        }

        async fn handle_size(&self, handle: &String) -> u64 {
            handle.len() as u64
        }

        async fn resolve_path(&self, handle: &String) -> Result<String, FsError> {
            if self.unresolvable.contains(handle) {
                return Err(FsError::UnresolvablePath {
                    name: handle.clone(),
                    reason: "not a local file".into(),
                });
            }
            Ok(handle.clone())
        }

        async fn is_directory(&self, path: &str) -> bool {
            self.folders.contains_key(path) || self.broken_folders.contains(path)
        }

        async fn list_immediate_files(&self, path: &str) -> Result<Vec<FileSpec>, FsError> {
            if self.broken_folders.contains(path) {
                return Err(FsError::ListDirectory {
                    path: path.to_string(),
                    reason: "permission denied".into(),
                });
            }
            Ok(self.folders.get(path).cloned().unwrap_or_default())
        }

        async fn rename_batch(&self, requests: Vec<RenameRequest>) -> Vec<RenameOutcome> {
            self.submitted.lock().extend(requests.iter().cloned());
            requests
                .into_iter()
                .rev()
                .map(|request| match self.failing.get(&request.original_name) {
                    Some(reason) => RenameOutcome::failure(&request, FsError::Io(reason.clone())),
                    None => {
                        let path = rewrite_final_segment(&request.original_path, &request.new_name);
                        RenameOutcome::success(&request, path)
                    }
                })
                .collect()
        }
    }

    fn spec(name: &str) -> FileSpec {
        FileSpec {
            name: name.to_string(),
            path: format!("/photos/{name}"),
            size: 10,
        }
    }

    fn registry_with(names: &[&str]) -> FileRegistry {
        let registry = FileRegistry::new();
        registry.set_files(names.iter().map(|name| spec(name)).collect());
        registry
    }

    fn selected_names(registry: &FileRegistry) -> Vec<String> {
        registry
            .selected()
            .iter()
            .map(|entry| entry.name.get_untracked())
            .collect()
    }

    #[tokio::test]
    async fn add_files_expands_folders_and_keeps_unresolved() {
        let mut fs = FakeFs::default();
        fs.folders.insert("/music".into(), vec![spec("a.mp3"), spec("b.mp3")]);
        fs.unresolvable.insert("/cloud/remote.doc".into());

        let registry = FileRegistry::new();
        let sources = vec![
            "/music".to_string(),
            "/docs/readme.md".to_string(),
            "/cloud/remote.doc".to_string(),
        ];
        let report = registry.add_files(&fs, &sources).await;

        assert_eq!(report.added, 4);
        assert_eq!(report.unresolved, vec!["remote.doc".to_string()]);
        assert!(report.failures.is_empty());

        let entries = registry.entries();
        let names: Vec<_> = entries.iter().map(|e| e.name.get_untracked()).collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3", "readme.md", "remote.doc"]);
        assert_eq!(entries[2].path.get_untracked(), "/docs/readme.md");
        assert_eq!(entries[2].size(), "/docs/readme.md".len() as u64);
        assert!(!entries[3].has_path());
        assert_eq!(entries[3].size(), "/cloud/remote.doc".len() as u64);
    }

    #[tokio::test]
    async fn add_files_replaces_and_reports_listing_failures() {
        let mut fs = FakeFs::default();
        fs.broken_folders.insert("/locked".into());

        let registry = registry_with(&["old.txt"]);
        let report = registry
            .add_files(&fs, &["/locked".to_string(), "/new.txt".to_string()])
            .await;

        assert_eq!(report.added, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "locked");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name.get_untracked(), "new.txt");
    }

    #[test]
    fn select_all_deselect_all_and_invert() {
        let registry = registry_with(&["a", "b", "c"]);

        registry.select_all();
        assert_eq!(registry.selected_count(), 3);

        registry.deselect_all();
        assert_eq!(registry.selected_count(), 0);

        registry.toggle(1);
        registry.invert_selection();
        assert_eq!(selected_names(&registry), vec!["a", "c"]);
    }

    #[test]
    fn plain_click_selects_only_that_row() {
        let registry = registry_with(&["a", "b", "c"]);
        registry.select_all();

        assert!(registry.click(1, ClickModifiers::default()));
        assert_eq!(selected_names(&registry), vec!["b"]);
        assert!(!registry.click(9, ClickModifiers::default()));
    }

    #[test]
    fn shift_click_selects_a_range_from_the_anchor() {
        let registry = registry_with(&["a", "b", "c", "d", "e"]);

        registry.click(3, ClickModifiers::default());
        registry.click(
            1,
            ClickModifiers {
                shift: true,
                toggle: false,
            },
        );
        assert_eq!(selected_names(&registry), vec!["b", "c", "d"]);
    }

    #[test]
    fn toggle_click_adds_to_the_selection() {
        let registry = registry_with(&["a", "b", "c", "d"]);
        let toggle = ClickModifiers {
            shift: false,
            toggle: true,
        };

        registry.click(0, ClickModifiers::default());
        registry.click(2, toggle);
        assert_eq!(selected_names(&registry), vec!["a", "c"]);

        registry.click(0, toggle);
        assert_eq!(selected_names(&registry), vec!["c"]);
    }

    #[test]
    fn remove_selected_and_clear() {
        let registry = registry_with(&["a", "b", "c"]);
        registry.toggle(0);
        registry.toggle(2);

        assert_eq!(registry.remove_selected(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name.get_untracked(), "b");

        registry.clear();
        assert!(registry.is_empty());
    }
}
