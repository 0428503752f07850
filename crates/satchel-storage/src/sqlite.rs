//! SQLite-backed transport

use chrono::Utc;
use rusqlite::OptionalExtension;
use std::path::Path;
use std::time::Duration;

use crate::database::Database;
use crate::error::StorageError;
use crate::transport::{validate_name, SessionTransport};
use crate::Result;

/// Stores each session blob as one row in `session_data`.
///
/// Rows are namespaced by the store name passed to [`SessionTransport::open`],
/// so several logical stores can share one database file.
#[derive(Clone, Default)]
pub struct SqliteTransport {
    db: Option<Database>,
    store_name: String,
}

impl SqliteTransport {
    /// An unopened transport. `open` decides where the database file lives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an already-open database. A later `open` only sets the store name.
    pub fn with_database(db: Database) -> Self {
        Self {
            db: Some(db),
            store_name: String::new(),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    fn db(&self) -> Result<&Database> {
        self.db.as_ref().ok_or(StorageError::NotOpen)
    }
}

impl SessionTransport for SqliteTransport {
    fn open(&mut self, save_path: &Path, name: &str) -> Result<()> {
        validate_name(name)?;

        if self.db.is_none() {
            std::fs::create_dir_all(save_path)?;
            let path = save_path.join(format!("{name}.db"));
            tracing::info!(path = %path.display(), "Opening session database");
            self.db = Some(Database::open(&path)?);
        }

        self.store_name = name.to_string();
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let store_name = &self.store_name;
        self.db()?.with_connection(|conn| {
            let payload: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT payload FROM session_data WHERE store_name = ?1 AND id = ?2",
                    [store_name.as_str(), id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(payload.unwrap_or_default())
        })
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let updated_at = Utc::now().timestamp_millis();
        let store_name = &self.store_name;

        self.db()?.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session_data (store_name, id, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![store_name, id, data, updated_at],
            )?;
            Ok(())
        })?;

        tracing::debug!(session_id = %id, bytes = data.len(), "Wrote session payload");
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        let store_name = &self.store_name;
        self.db()?.with_connection(|conn| {
            conn.execute(
                "DELETE FROM session_data WHERE store_name = ?1 AND id = ?2",
                [store_name.as_str(), id],
            )?;
            Ok(())
        })
    }

    fn gc(&self, max_lifetime: Duration) -> Result<usize> {
        // A lifetime too long to subtract means nothing can have expired
        let Some(cutoff) = i64::try_from(max_lifetime.as_millis())
            .ok()
            .and_then(|lifetime| Utc::now().timestamp_millis().checked_sub(lifetime))
        else {
            return Ok(0);
        };
        let store_name = &self.store_name;

        let removed = self.db()?.with_connection(|conn| {
            Ok(conn.execute(
                "DELETE FROM session_data WHERE store_name = ?1 AND updated_at < ?2",
                rusqlite::params![store_name, cutoff],
            )?)
        })?;

        tracing::info!(store = %store_name, removed, "Collected expired sessions");
        Ok(removed)
    }
}
