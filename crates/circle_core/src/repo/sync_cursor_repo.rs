//! Per-owner incremental sync checkpoint.

use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Stored sync checkpoint of one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub owner_id: String,
    /// Opaque directory token for "changes since" listings.
    pub sync_token: Option<String>,
    pub last_bulk_sync_at: Option<i64>,
}

/// Repository interface for sync cursors.
pub trait SyncCursorRepository {
    fn get_cursor(&self, owner_id: &str) -> RepoResult<Option<SyncCursor>>;
    /// Stores the token and timestamp of a completed bulk run.
    fn save_cursor(
        &self,
        owner_id: &str,
        sync_token: Option<&str>,
        last_bulk_sync_at: i64,
    ) -> RepoResult<()>;
    /// Drops a token the directory no longer accepts, keeping the timestamp.
    fn clear_token(&self, owner_id: &str) -> RepoResult<()>;
    fn delete_cursor(&self, owner_id: &str) -> RepoResult<()>;
}

/// SQLite-backed sync cursor store.
pub struct SqliteSyncCursorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSyncCursorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SyncCursorRepository for SqliteSyncCursorRepository<'_> {
    fn get_cursor(&self, owner_id: &str) -> RepoResult<Option<SyncCursor>> {
        let cursor = self
            .conn
            .query_row(
                "SELECT owner_id, sync_token, last_bulk_sync_at
                 FROM sync_cursors
                 WHERE owner_id = ?1;",
                [owner_id],
                |row| {
                    Ok(SyncCursor {
                        owner_id: row.get(0)?,
                        sync_token: row.get(1)?,
                        last_bulk_sync_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(cursor)
    }

    fn save_cursor(
        &self,
        owner_id: &str,
        sync_token: Option<&str>,
        last_bulk_sync_at: i64,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO sync_cursors (owner_id, sync_token, last_bulk_sync_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET
                sync_token = excluded.sync_token,
                last_bulk_sync_at = excluded.last_bulk_sync_at;",
            params![owner_id, sync_token, last_bulk_sync_at],
        )?;
        Ok(())
    }

    fn clear_token(&self, owner_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE sync_cursors SET sync_token = NULL WHERE owner_id = ?1;",
            [owner_id],
        )?;
        Ok(())
    }

    fn delete_cursor(&self, owner_id: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM sync_cursors WHERE owner_id = ?1;", [owner_id])?;
        Ok(())
    }
}
