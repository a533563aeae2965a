// State management module
// Handles SQLite persistence and reconciliation of profile groups

pub mod db;
pub mod models;
pub mod queries;
pub mod reconcile;
pub mod storage;

pub use db::{open_db, open_in_memory, DbConnection, DbError, DbResult};
pub use models::{GroupSummary, Profile, ProfileGroup};
pub use reconcile::{save_group, ReconcileError, ReconcileResult};
pub use storage::{read_checksum_file, StorageError};
