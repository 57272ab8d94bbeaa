//! # devlauncher-sync
//!
//! Mirrors source trees into a live target directory.
//!
//! - [`mirror_file`] applies the size + mtime staleness rule to one file.
//! - [`sync_directory`] runs a full recursive pass.
//! - [`SyncSession`] does the initial pass, then keeps the target current
//!   from filesystem notifications until it is closed.

pub mod error;
pub mod filter;
pub mod mirror;
pub mod session;
pub mod tree;
pub mod watcher;

pub use error::SyncError;
pub use filter::FileFilter;
pub use mirror::{decide, mirror_file, CopyDecision, FileStamp, MirrorOutcome};
pub use session::{SyncPair, SyncSession};
pub use tree::{remove_path, sync_directory, sync_directory_with, SyncOptions};
pub use watcher::{Change, ChangeKind, ChangeOutcome, DirectoryWatcher, WatchBackend, WatchRegistration};
