//! Library synchronization jobs

mod aggregate;
mod job;

pub use aggregate::AggregateSyncJob;
pub use job::SyncJob;
