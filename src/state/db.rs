// SQLite database setup and migrations
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

// Thread-safe database connection wrapper
pub struct DbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

impl Clone for DbConnection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Open (or create) a registry database at the given path
pub fn open_db(path: &Path) -> DbResult<DbConnection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Run migrations
    run_migrations(&conn)?;

    Ok(DbConnection::new(conn))
}

/// Open an in-memory registry database, mainly for tests and dry runs
pub fn open_in_memory() -> DbResult<DbConnection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    run_migrations(&conn)?;
    Ok(DbConnection::new(conn))
}

fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current_version < 1 {
        migration_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [1])?;
    }

    Ok(())
}

fn migration_v1(conn: &Connection) -> DbResult<()> {
    // Profile groups, keyed by their source-artifact checksum pair
    conn.execute(
        "CREATE TABLE IF NOT EXISTS profile_group (
            id INTEGER PRIMARY KEY,
            biosynthetic_checksum TEXT NOT NULL,
            subprofile_checksum TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // At most one group row per checksum pair
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_profile_group_checksums
         ON profile_group(biosynthetic_checksum, subprofile_checksum)",
        [],
    )?;

    // Profiles table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS profile (
            id INTEGER PRIMARY KEY,
            group_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            accession TEXT,
            model_length INTEGER NOT NULL,
            FOREIGN KEY (group_id) REFERENCES profile_group(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Reconciliation resolves members by (group_id, name) and parents by
    // (group_id, accession)
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_profile_group_name ON profile(group_id, name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_profile_group_accession ON profile(group_id, accession)",
        [],
    )?;

    // Parent/child links between profiles of the same group
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subprofile_relation (
            profile_id INTEGER NOT NULL,
            parent_profile_id INTEGER NOT NULL,
            PRIMARY KEY (profile_id, parent_profile_id),
            FOREIGN KEY (profile_id) REFERENCES profile(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_profile_id) REFERENCES profile(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subprofile_relation_parent
         ON subprofile_relation(parent_profile_id)",
        [],
    )?;

    Ok(())
}
