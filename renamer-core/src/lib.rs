//! Renamer Core
//!
//! This crate provides the core of a batch file renamer. It implements:
//!
//! - Reactive primitives (signals, effects, computed values)
//! - A rule chain of filename transformations
//! - The transformation engine that applies a chain to a filename
//! - A file registry with selection and batched renames
//!
//! Hosts plug in their filesystem through the [`fs::FileSystem`] trait.
//! [`fs::LocalFileSystem`] covers local disks.
//!
//! # Architecture
//!
//! - `reactive`: signals, effects, computed values and the flush scheduler
//! - `rules`: the rule model and the editable rule chain
//! - `transform`: the pure filename transformation
//! - `files`: loaded files, selection, rename batches
//! - `renamer`: the surface a shell binds to
//!
//! # Example
//!
//! ```rust
//! use renamer_core::reactive::batch;
//! use renamer_core::rules::Rule;
//! use renamer_core::{FileSpec, Renamer};
//!
//! let renamer = Renamer::default();
//! renamer.files().set_files(vec![FileSpec {
//!     name: "IMG_0042.jpg".into(),
//!     path: "/photos/IMG_0042.jpg".into(),
//!     size: 2048,
//! }]);
//!
//! let entry = renamer.files().get(0).unwrap();
//! let preview = renamer.preview(&entry);
//!
//! batch(|| {
//!     renamer.rules().push(&Rule::Replace {
//!         search: "IMG_".into(),
//!         replacement: "beach-".into(),
//!     });
//! });
//!
//! assert_eq!(preview.get(), "beach-0042.jpg");
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod fs;
pub mod reactive;
pub mod renamer;
pub mod rules;
pub mod transform;

pub use config::RenamerConfig;
pub use error::{ConfigError, FsError, RenameError};
pub use files::{ClickModifiers, FileEntry, FileRegistry, LoadReport, RenameResult, RenameSummary, RowStatus};
pub use fs::{FileSpec, FileSystem, LocalFileSystem, RenameOutcome, RenameRequest};
pub use renamer::{PreviewRow, Renamer};
pub use rules::{Rule, RuleChain, RuleKind, TrimPosition};
pub use transform::{apply_rules, Pipeline};
