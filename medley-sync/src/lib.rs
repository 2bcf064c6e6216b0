//! medley-sync library interface
//!
//! Library synchronization for the Medley media cache: the remote catalog
//! contract, the tag-addressable task scheduler, per-provider and
//! all-providers sync jobs, and the `MediaLibrary` facade tying them to the
//! cache database.

pub mod error;
pub mod library;
pub mod provider;
pub mod scheduler;
pub mod sync;

pub use crate::error::{ProviderError, SyncError, SyncResult};
pub use crate::library::{MediaLibrary, SYNC_ALL_TAG};
pub use crate::provider::{LibraryGenerator, LibraryPage, MediaProvider, ProviderRegistry};
pub use crate::scheduler::{RunOptions, TaskHandle, TaskOutcome, TaskScheduler, TaskStatus};
