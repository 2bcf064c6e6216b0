//! Database bootstrap, executor and queries

pub mod init;
pub mod media_database;
pub mod queries;
pub mod retry;
pub mod schema;
pub mod state;
pub mod transaction;

pub use init::*;
pub use media_database::MediaDatabase;
pub use state::sync_resume_key;
pub use transaction::{ResultRow, SqlParam, SqlTransaction, TransactionResults};
