//! Friend repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide owner-scoped get/update access to local friends.
//! - Own link bookkeeping (`external_id`, `external_etag`, `last_synced_at`).
//!
//! # Invariants
//! - Write paths call `Friend::validate()` before SQL mutations.
//! - A given external id links to at most one friend per owner.

use crate::model::friend::{ContactLink, Friend, FriendId, FriendValidationError};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{ffi, params, Connection, Row};
use uuid::Uuid;

const FRIEND_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    name,
    email,
    phone,
    address,
    birthday,
    employer,
    occupation,
    photo_ref,
    photo_source_url,
    external_id,
    external_etag,
    last_synced_at
FROM friends";

/// Link-state filter for friend listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkFilter {
    #[default]
    Any,
    Linked,
    Unlinked,
}

/// Query options for listing one owner's friends.
#[derive(Debug, Clone, Default)]
pub struct FriendListQuery {
    pub link: LinkFilter,
}

/// Repository interface for the local friend store.
pub trait FriendRepository {
    fn create_friend(&self, friend: &Friend) -> RepoResult<FriendId>;
    /// Replaces every stored column of an existing friend, link included.
    fn update_friend(&self, friend: &Friend) -> RepoResult<()>;
    fn get_friend(&self, owner_id: &str, id: FriendId) -> RepoResult<Option<Friend>>;
    /// Lists friends sorted by name, then id.
    fn list_friends(&self, owner_id: &str, query: &FriendListQuery) -> RepoResult<Vec<Friend>>;
    fn find_by_external_id(&self, owner_id: &str, external_id: &str)
        -> RepoResult<Option<Friend>>;
    /// Sets or clears the contact link. Clearing also drops `last_synced_at`.
    fn set_link(&self, owner_id: &str, id: FriendId, link: Option<&ContactLink>)
        -> RepoResult<()>;
    /// Records a completed reconciliation against `etag`.
    fn mark_synced(&self, owner_id: &str, id: FriendId, etag: &str, synced_at: i64)
        -> RepoResult<()>;
    /// Clears the links of every friend of the owner; returns the cleared count.
    fn clear_links(&self, owner_id: &str) -> RepoResult<usize>;
}

/// SQLite-backed friend repository.
pub struct SqliteFriendRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFriendRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FriendRepository for SqliteFriendRepository<'_> {
    fn create_friend(&self, friend: &Friend) -> RepoResult<FriendId> {
        friend.validate()?;

        self.conn
            .execute(
                "INSERT INTO friends (
                    id,
                    owner_id,
                    name,
                    email,
                    phone,
                    address,
                    birthday,
                    employer,
                    occupation,
                    photo_ref,
                    photo_source_url,
                    external_id,
                    external_etag,
                    last_synced_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
                params![
                    friend.id.to_string(),
                    friend.owner_id.as_str(),
                    friend.name.trim(),
                    friend.email.as_deref(),
                    friend.phone.as_deref(),
                    friend.address.as_deref(),
                    friend.birthday.as_deref(),
                    friend.employer.as_deref(),
                    friend.occupation.as_deref(),
                    friend.photo_ref.as_deref(),
                    friend.photo_source_url.as_deref(),
                    friend.link.as_ref().map(|link| link.external_id.as_str()),
                    friend.link.as_ref().map(|link| link.etag.as_str()),
                    friend.last_synced_at,
                ],
            )
            .map_err(|err| link_conflict(err, friend.external_id()))?;

        Ok(friend.id)
    }

    fn update_friend(&self, friend: &Friend) -> RepoResult<()> {
        friend.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE friends
                 SET
                    name = ?3,
                    email = ?4,
                    phone = ?5,
                    address = ?6,
                    birthday = ?7,
                    employer = ?8,
                    occupation = ?9,
                    photo_ref = ?10,
                    photo_source_url = ?11,
                    external_id = ?12,
                    external_etag = ?13,
                    last_synced_at = ?14,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE owner_id = ?1 AND id = ?2;",
                params![
                    friend.owner_id.as_str(),
                    friend.id.to_string(),
                    friend.name.trim(),
                    friend.email.as_deref(),
                    friend.phone.as_deref(),
                    friend.address.as_deref(),
                    friend.birthday.as_deref(),
                    friend.employer.as_deref(),
                    friend.occupation.as_deref(),
                    friend.photo_ref.as_deref(),
                    friend.photo_source_url.as_deref(),
                    friend.link.as_ref().map(|link| link.external_id.as_str()),
                    friend.link.as_ref().map(|link| link.etag.as_str()),
                    friend.last_synced_at,
                ],
            )
            .map_err(|err| link_conflict(err, friend.external_id()))?;

        if changed == 0 {
            return Err(RepoError::FriendNotFound(friend.id));
        }

        Ok(())
    }

    fn get_friend(&self, owner_id: &str, id: FriendId) -> RepoResult<Option<Friend>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FRIEND_SELECT_SQL} WHERE owner_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![owner_id, id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_friend_row(row)?));
        }
        Ok(None)
    }

    fn list_friends(&self, owner_id: &str, query: &FriendListQuery) -> RepoResult<Vec<Friend>> {
        let link_clause = match query.link {
            LinkFilter::Any => "",
            LinkFilter::Linked => " AND external_id IS NOT NULL",
            LinkFilter::Unlinked => " AND external_id IS NULL",
        };
        let mut stmt = self.conn.prepare(&format!(
            "{FRIEND_SELECT_SQL} WHERE owner_id = ?1{link_clause} ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([owner_id])?;
        let mut friends = Vec::new();
        while let Some(row) = rows.next()? {
            friends.push(parse_friend_row(row)?);
        }
        Ok(friends)
    }

    fn find_by_external_id(
        &self,
        owner_id: &str,
        external_id: &str,
    ) -> RepoResult<Option<Friend>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FRIEND_SELECT_SQL} WHERE owner_id = ?1 AND external_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![owner_id, external_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_friend_row(row)?));
        }
        Ok(None)
    }

    fn set_link(
        &self,
        owner_id: &str,
        id: FriendId,
        link: Option<&ContactLink>,
    ) -> RepoResult<()> {
        if let Some(link) = link {
            if link.external_id.trim().is_empty() {
                return Err(FriendValidationError::BlankExternalId.into());
            }
        }

        let changed = self
            .conn
            .execute(
                "UPDATE friends
                 SET
                    external_id = ?3,
                    external_etag = ?4,
                    last_synced_at = CASE WHEN ?3 IS NULL THEN NULL ELSE last_synced_at END,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE owner_id = ?1 AND id = ?2;",
                params![
                    owner_id,
                    id.to_string(),
                    link.map(|link| link.external_id.as_str()),
                    link.map(|link| link.etag.as_str()),
                ],
            )
            .map_err(|err| link_conflict(err, link.map(|link| link.external_id.as_str())))?;

        if changed == 0 {
            return Err(RepoError::FriendNotFound(id));
        }
        Ok(())
    }

    fn mark_synced(
        &self,
        owner_id: &str,
        id: FriendId,
        etag: &str,
        synced_at: i64,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE friends
             SET
                external_etag = ?3,
                last_synced_at = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE owner_id = ?1 AND id = ?2 AND external_id IS NOT NULL;",
            params![owner_id, id.to_string(), etag, synced_at],
        )?;

        if changed == 0 {
            return Err(RepoError::FriendNotFound(id));
        }
        Ok(())
    }

    fn clear_links(&self, owner_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE friends
             SET
                external_id = NULL,
                external_etag = NULL,
                last_synced_at = NULL,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE owner_id = ?1 AND external_id IS NOT NULL;",
            [owner_id],
        )?;
        Ok(changed)
    }
}

fn link_conflict(err: rusqlite::Error, external_id: Option<&str>) -> RepoError {
    match (&err, external_id) {
        (rusqlite::Error::SqliteFailure(failure, _), Some(external_id))
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::ExternalIdTaken(external_id.to_string())
        }
        _ => err.into(),
    }
}

fn parse_friend_row(row: &Row<'_>) -> RepoResult<Friend> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in friends.id"))
    })?;

    let external_id: Option<String> = row.get("external_id")?;
    let external_etag: Option<String> = row.get("external_etag")?;
    let link = external_id.map(|external_id| ContactLink {
        external_id,
        etag: external_etag.unwrap_or_default(),
    });

    let friend = Friend {
        id,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        birthday: row.get("birthday")?,
        employer: row.get("employer")?,
        occupation: row.get("occupation")?,
        photo_ref: row.get("photo_ref")?,
        photo_source_url: row.get("photo_source_url")?,
        link,
        last_synced_at: row.get("last_synced_at")?,
    };
    friend.validate()?;
    Ok(friend)
}
