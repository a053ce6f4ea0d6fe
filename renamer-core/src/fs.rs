//! Filesystem Collaborator
//!
//! The renamer never touches the filesystem directly. Everything it needs
//! (resolving picked items to paths, expanding folders, the rename itself)
//! goes through the [`FileSystem`] trait, so a shell can plug in its own
//! implementation and tests can use an in-memory one.
//!
//! [`LocalFileSystem`] is the implementation for local disks, on `tokio::fs`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// A file as reported by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// One rename in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub original_path: String,
    pub original_name: String,
    pub new_name: String,
}

/// The collaborator's answer for one [`RenameRequest`].
///
/// Outcomes are matched back to their requests by `original_path`; names
/// alone are not unique across folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    pub original_path: String,
    pub original_name: String,
    pub result: Result<RenamedFile, FsError>,
}

/// Where a renamed file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamedFile {
    pub new_name: String,
    pub path: String,
}

impl RenameOutcome {
    pub fn success(request: &RenameRequest, path: impl Into<String>) -> Self {
        Self::for_request(
            request,
            Ok(RenamedFile {
                new_name: request.new_name.clone(),
                path: path.into(),
            }),
        )
    }

    pub fn failure(request: &RenameRequest, error: FsError) -> Self {
        Self::for_request(request, Err(error))
    }

    fn for_request(request: &RenameRequest, result: Result<RenamedFile, FsError>) -> Self {
        Self {
            original_path: request.original_path.clone(),
            original_name: request.original_name.clone(),
            result,
        }
    }
}

/// Operations the renamer needs from its host.
///
/// All calls may suspend. The renamer awaits them one at a time.
#[allow(async_fn_in_trait)]
pub trait FileSystem {
    /// Whatever the host hands over for a picked or dropped item.
    type Handle;

    /// Display name of a picked item, known without touching the disk.
    fn handle_name(&self, handle: &Self::Handle) -> String;

    /// Size of a picked item in bytes, 0 if unknown.
    async fn handle_size(&self, handle: &Self::Handle) -> u64;

    /// Map a picked item to an absolute path.
    async fn resolve_path(&self, handle: &Self::Handle) -> Result<String, FsError>;

    async fn is_directory(&self, path: &str) -> bool;

    /// The files directly inside `path`, not recursing into subfolders.
    async fn list_immediate_files(&self, path: &str) -> Result<Vec<FileSpec>, FsError>;

    /// Rename every request independently: one failure must not stop the
    /// others. Returns one outcome per request, in any order.
    async fn rename_batch(&self, requests: Vec<RenameRequest>) -> Vec<RenameOutcome>;
}

/// [`FileSystem`] over the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    async fn rename_one(&self, request: &RenameRequest) -> Result<RenamedFile, FsError> {
        validate_name(&request.new_name)?;

        let source = Path::new(&request.original_path);
        let target = source.with_file_name(&request.new_name);

        // On case-insensitive disks a case-only rename finds the source
        // itself at the target path.
        if target != source
            && tokio::fs::try_exists(&target).await?
            && !is_same_file(source, &target).await
        {
            return Err(FsError::AlreadyExists(request.new_name.clone()));
        }

        tokio::fs::rename(source, &target).await?;

        Ok(RenamedFile {
            new_name: request.new_name.clone(),
            path: target.to_string_lossy().into_owned(),
        })
    }
}

/// A new name must be a single, ordinary path segment.
fn validate_name(name: &str) -> Result<(), FsError> {
    let has_separator = name.chars().any(std::path::is_separator);
    if name.is_empty() || name == "." || name == ".." || has_separator || name.contains('\0') {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Whether two paths name the same file on disk.
#[cfg(unix)]
async fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (tokio::fs::metadata(a).await, tokio::fs::metadata(b).await) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

/// Whether two paths name the same file on disk.
#[cfg(not(unix))]
async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl FileSystem for LocalFileSystem {
    type Handle = PathBuf;

    fn handle_name(&self, handle: &PathBuf) -> String {
        handle
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    async fn handle_size(&self, handle: &PathBuf) -> u64 {
        tokio::fs::metadata(handle)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    async fn resolve_path(&self, handle: &PathBuf) -> Result<String, FsError> {
        tokio::fs::canonicalize(handle)
            .await
            .map(|path| path.to_string_lossy().into_owned())
            .map_err(|err| FsError::UnresolvablePath {
                name: handle.display().to_string(),
                reason: err.to_string(),
            })
    }

    async fn is_directory(&self, path: &str) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn list_immediate_files(&self, path: &str) -> Result<Vec<FileSpec>, FsError> {
        let listing_error = |err: std::io::Error| FsError::ListDirectory {
            path: path.to_string(),
            reason: err.to_string(),
        };

        let mut dir = tokio::fs::read_dir(path).await.map_err(listing_error)?;
        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(listing_error)? {
            let meta = entry.metadata().await.map_err(listing_error)?;
            if !meta.is_file() {
                continue;
            }
            files.push(FileSpec {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().into_owned(),
                size: meta.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn rename_batch(&self, requests: Vec<RenameRequest>) -> Vec<RenameOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in &requests {
            let result = self.rename_one(request).await;
            if let Err(err) = &result {
                tracing::warn!(
                    name = %request.original_name,
                    new_name = %request.new_name,
                    error = %err,
                    "rename failed"
                );
            }
            outcomes.push(RenameOutcome::for_request(request, result));
        }

        outcomes
    }
}
