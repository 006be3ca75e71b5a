//! Directory contract consumed by the sync services.

use crate::contacts::error::DirectoryResult;
use crate::model::contact::ExternalContact;
use crate::model::field::FieldKey;
use async_trait::async_trait;

/// One listing request. Either a continuation page or an incremental run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub page_token: Option<String>,
    /// When set, only contacts changed since the token are listed.
    pub sync_token: Option<String>,
}

impl ListRequest {
    pub fn is_incremental(&self) -> bool {
        self.sync_token.is_some()
    }
}

/// One page of listed contacts. Remote-deleted rows are already filtered out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactPage {
    pub contacts: Vec<ExternalContact>,
    pub next_page_token: Option<String>,
    /// Present on the last page of a run.
    pub next_sync_token: Option<String>,
    /// The directory explicitly rejected the supplied sync token.
    pub sync_token_expired: bool,
}

impl ContactPage {
    /// Whether an incremental page signals an unusable sync token: either the
    /// explicit rejection, or an empty page carrying no continuation at all.
    pub fn signals_invalid_sync_token(&self) -> bool {
        self.sync_token_expired
            || (self.contacts.is_empty()
                && self.next_page_token.is_none()
                && self.next_sync_token.is_none())
    }
}

/// Partial field update pushed to the directory.
///
/// An update carries the last known directory document as its base: only the
/// primary entry of each patched field is rewritten and every other entry of
/// that field is sent back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    values: Vec<(FieldKey, Option<String>)>,
    base: Option<serde_json::Value>,
}

impl ContactPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory document the patched entries are merged into.
    pub fn with_base(mut self, document: serde_json::Value) -> Self {
        self.base = Some(document).filter(|document| document.is_object());
        self
    }

    pub fn base(&self) -> Option<&serde_json::Value> {
        self.base.as_ref()
    }

    /// Sets one field; blank values clear it remotely. Later sets win.
    pub fn set(&mut self, key: FieldKey, value: Option<&str>) -> &mut Self {
        let value = value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        match self.values.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.values
            .iter()
            .find(|(existing, _)| *existing == key)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.values.iter().any(|(existing, _)| *existing == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.values.iter().map(|(key, _)| *key)
    }

    /// True when no field is patched. The base alone is not a change.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Remote contact directory operations.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Lists one page of contacts, full or incremental.
    async fn list_contacts(&self, request: &ListRequest) -> DirectoryResult<ContactPage>;

    /// Fetches one contact; `Ok(None)` when it no longer exists.
    async fn get_contact(&self, external_id: &str) -> DirectoryResult<Option<ExternalContact>>;

    /// Downloads photo bytes. Best-effort: any failure yields `None`.
    async fn download_photo(&self, url: &str) -> Option<Vec<u8>>;

    async fn create_contact(&self, patch: &ContactPatch) -> DirectoryResult<ExternalContact>;

    /// Updates only the patched fields, guarded by the last known `etag`.
    async fn update_contact(
        &self,
        external_id: &str,
        etag: &str,
        patch: &ContactPatch,
    ) -> DirectoryResult<ExternalContact>;

    async fn delete_contact(&self, external_id: &str) -> DirectoryResult<()>;
}
