//! Durable per-owner snapshot store of external contacts.
//!
//! # Responsibility
//! - Upsert directory snapshots keyed by `(owner_id, external_id)`.
//! - Serve structural reads for matching and the raw document for fidelity.
//!
//! # Invariants
//! - Upserting the same snapshot twice leaves the cache identical to one upsert.
//! - Rows are only deleted by `clear_owner` (full disconnect).

use crate::model::contact::{ContactPhoto, ExternalContact, Organization};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const CONTACT_SELECT_SQL: &str = "SELECT
    external_id,
    etag,
    display_name,
    emails,
    phones,
    addresses,
    birthdays,
    organizations,
    photos,
    raw_payload,
    fetched_at
FROM contact_cache";

/// Query options for listing cached contacts.
#[derive(Debug, Clone, Default)]
pub struct CachedContactQuery {
    /// Only contacts with at least one non-blank phone number.
    pub has_phone: bool,
}

/// Repository interface for the local contact cache.
pub trait ContactCacheRepository {
    fn upsert_contact(&self, owner_id: &str, contact: &ExternalContact) -> RepoResult<()>;
    /// Lists cached contacts sorted by display name, then external id.
    fn list_contacts(
        &self,
        owner_id: &str,
        query: &CachedContactQuery,
    ) -> RepoResult<Vec<ExternalContact>>;
    fn get_contact(&self, owner_id: &str, external_id: &str)
        -> RepoResult<Option<ExternalContact>>;
    /// Returns the full directory document stored with the snapshot.
    fn get_raw_payload(
        &self,
        owner_id: &str,
        external_id: &str,
    ) -> RepoResult<Option<serde_json::Value>>;
    /// Deletes every cached contact of the owner; returns the deleted count.
    fn clear_owner(&self, owner_id: &str) -> RepoResult<usize>;
}

/// SQLite-backed contact cache.
pub struct SqliteContactCacheRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactCacheRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ContactCacheRepository for SqliteContactCacheRepository<'_> {
    fn upsert_contact(&self, owner_id: &str, contact: &ExternalContact) -> RepoResult<()> {
        contact.validate()?;
        if owner_id.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "contact cache owner id cannot be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO contact_cache (
                owner_id,
                external_id,
                etag,
                display_name,
                emails,
                phones,
                addresses,
                birthdays,
                organizations,
                photos,
                has_phone,
                raw_payload,
                fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(owner_id, external_id) DO UPDATE SET
                etag = excluded.etag,
                display_name = excluded.display_name,
                emails = excluded.emails,
                phones = excluded.phones,
                addresses = excluded.addresses,
                birthdays = excluded.birthdays,
                organizations = excluded.organizations,
                photos = excluded.photos,
                has_phone = excluded.has_phone,
                raw_payload = excluded.raw_payload,
                fetched_at = excluded.fetched_at;",
            params![
                owner_id,
                contact.external_id.as_str(),
                contact.etag.as_str(),
                contact.display_name.as_deref(),
                serde_json::to_string(&contact.emails)?,
                serde_json::to_string(&contact.phones)?,
                serde_json::to_string(&contact.addresses)?,
                serde_json::to_string(&contact.birthdays)?,
                serde_json::to_string(&contact.organizations)?,
                serde_json::to_string(&contact.photos)?,
                i64::from(contact.has_phone()),
                serde_json::to_string(&contact.raw_payload)?,
                contact.fetched_at,
            ],
        )?;

        Ok(())
    }

    fn list_contacts(
        &self,
        owner_id: &str,
        query: &CachedContactQuery,
    ) -> RepoResult<Vec<ExternalContact>> {
        let phone_clause = if query.has_phone {
            " AND has_phone = 1"
        } else {
            ""
        };
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL}
             WHERE owner_id = ?1{phone_clause}
             ORDER BY display_name COLLATE NOCASE ASC, external_id ASC;"
        ))?;
        let mut rows = stmt.query([owner_id])?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row)?);
        }
        Ok(contacts)
    }

    fn get_contact(
        &self,
        owner_id: &str,
        external_id: &str,
    ) -> RepoResult<Option<ExternalContact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL} WHERE owner_id = ?1 AND external_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![owner_id, external_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_contact_row(row)?));
        }
        Ok(None)
    }

    fn get_raw_payload(
        &self,
        owner_id: &str,
        external_id: &str,
    ) -> RepoResult<Option<serde_json::Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT raw_payload FROM contact_cache WHERE owner_id = ?1 AND external_id = ?2;",
        )?;
        let mut rows = stmt.query(params![owner_id, external_id])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            return Ok(Some(parse_json_column(&raw, "raw_payload")?));
        }
        Ok(None)
    }

    fn clear_owner(&self, owner_id: &str) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM contact_cache WHERE owner_id = ?1;", [owner_id])?;
        Ok(deleted)
    }
}

fn parse_contact_row(row: &Row<'_>) -> RepoResult<ExternalContact> {
    let emails: String = row.get("emails")?;
    let phones: String = row.get("phones")?;
    let addresses: String = row.get("addresses")?;
    let birthdays: String = row.get("birthdays")?;
    let organizations: String = row.get("organizations")?;
    let photos: String = row.get("photos")?;
    let raw_payload: String = row.get("raw_payload")?;

    let contact = ExternalContact {
        external_id: row.get("external_id")?,
        etag: row.get("etag")?,
        display_name: row.get("display_name")?,
        emails: parse_json_column(&emails, "emails")?,
        phones: parse_json_column(&phones, "phones")?,
        addresses: parse_json_column(&addresses, "addresses")?,
        birthdays: parse_json_column(&birthdays, "birthdays")?,
        organizations: parse_json_column::<Vec<Organization>>(&organizations, "organizations")?,
        photos: parse_json_column::<Vec<ContactPhoto>>(&photos, "photos")?,
        raw_payload: parse_json_column(&raw_payload, "raw_payload")?,
        fetched_at: row.get("fetched_at")?,
    };
    contact.validate()?;
    Ok(contact)
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(raw).map_err(|err| {
        RepoError::InvalidData(format!("invalid json in contact_cache.{column}: {err}"))
    })
}
