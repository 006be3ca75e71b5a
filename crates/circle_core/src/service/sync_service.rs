//! Contact sync orchestration.
//!
//! # Responsibility
//! - Pull the directory into the local contact cache (bulk sync).
//! - Reconcile one linked friend against its live contact.
//! - Apply caller resolutions, optionally pushing local values back.
//! - Own the link lifecycle: link, unlink, export and disconnect.
//!
//! # Invariants
//! - A bulk run adopts a new sync token only when every page and every row
//!   succeeded.
//! - An invalid sync token triggers at most one full refetch per run.
//! - Remote push failures never roll back local writes.
//! - Photo failures never remove an existing photo.
//! - Callers serialize operations per owner; there is no internal locking.

use crate::contacts::{ContactDirectory, ContactPatch, DirectoryError, ListRequest};
use crate::model::contact::ExternalContact;
use crate::model::field::FieldKey;
use crate::model::friend::{ContactLink, Friend, FriendId};
use crate::model::now_epoch_ms;
use crate::photo::PhotoStore;
use crate::repo::contact_cache_repo::{ContactCacheRepository, SqliteContactCacheRepository};
use crate::repo::friend_repo::{FriendRepository, SqliteFriendRepository};
use crate::repo::sync_cursor_repo::{SqliteSyncCursorRepository, SyncCursorRepository};
use crate::repo::RepoError;
use crate::sync::field_diff::{
    compute_field_diffs_with, default_field_table, FieldDiff, SyncableField,
};
use crate::sync::resolution::{
    auto_resolutions, is_all_non_conflicting, FieldResolution, ResolutionAction,
};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

const MAX_SYNC_TOKEN_RETRIES: u8 = 1;

/// Errors of sync service operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("friend not found: {0}")]
    FriendNotFound(FriendId),

    #[error("contact is not in the local cache: {0}")]
    ContactNotCached(String),

    #[error("contact {external_id} is already linked to friend {friend_id}")]
    AlreadyLinked {
        external_id: String,
        friend_id: FriendId,
    },

    #[error("friend {0} is already linked to a contact")]
    FriendAlreadyLinked(FriendId),

    #[error("diffs contain conflicts that need review")]
    ConflictsNeedReview,

    #[error("directory rejected the sync token after a full refetch")]
    SyncTokenRejected,
}

impl SyncError {
    /// Stable machine-readable code used in logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Repo(_) => "storage_error",
            Self::Directory(err) => err.code(),
            Self::FriendNotFound(_) => "friend_not_found",
            Self::ContactNotCached(_) => "contact_not_cached",
            Self::AlreadyLinked { .. } => "already_linked",
            Self::FriendAlreadyLinked(_) => "friend_already_linked",
            Self::ConflictsNeedReview => "conflicts_need_review",
            Self::SyncTokenRejected => "sync_token_rejected",
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Directory(err) if err.is_auth_expired())
    }
}

/// One failure entry of a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncErrorEntry {
    /// Contact whose upsert failed; `None` for a run-level failure.
    pub external_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// Result of one bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkSyncReport {
    pub synced_count: usize,
    pub errors: Vec<SyncErrorEntry>,
    pub pages: usize,
    /// The stored sync token was rejected and a full refetch ran.
    pub token_reset: bool,
}

impl BulkSyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Options of a single-friend sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Diff fields even when the version tag is unchanged. Used right after
    /// linking, when the tag was captured but fields were never compared.
    pub force_compare: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    NotLinked,
    Unlinked,
    UpToDate,
    ChangesDetected,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotLinked => "not-linked",
            Self::Unlinked => "unlinked",
            Self::UpToDate => "up-to-date",
            Self::ChangesDetected => "changes-detected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncReason {
    RemoteContactDeleted,
}

/// Result of one single-friend sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub diffs: Vec<FieldDiff>,
    pub reason: Option<SyncReason>,
    pub message: Option<String>,
    pub photo_updated: bool,
}

impl SyncOutcome {
    fn with_status(status: SyncStatus) -> Self {
        Self {
            status,
            diffs: Vec::new(),
            reason: None,
            message: None,
            photo_updated: false,
        }
    }
}

/// Outcome of the optional push to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PushOutcome {
    NotRequested,
    Pushed { etag: String },
    Failed { code: String, message: String },
}

/// Result of applying resolutions to one friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Fields written into the friend from remote values.
    pub applied_fields: Vec<FieldKey>,
    pub push: PushOutcome,
}

/// Result of disconnecting an owner from the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisconnectReport {
    pub cleared_contacts: usize,
    pub unlinked_friends: usize,
}

enum PassOutcome {
    Completed { next_sync_token: Option<String> },
    TokenRejected,
}

/// Sync orchestrator for one owner's directory connection.
pub struct SyncService<'conn, D: ContactDirectory, P: PhotoStore> {
    friends: SqliteFriendRepository<'conn>,
    cache: SqliteContactCacheRepository<'conn>,
    cursors: SqliteSyncCursorRepository<'conn>,
    directory: D,
    photos: P,
    fields: &'conn [SyncableField],
}

impl<'conn, D: ContactDirectory, P: PhotoStore> SyncService<'conn, D, P> {
    pub fn new(conn: &'conn Connection, directory: D, photos: P) -> Self {
        Self {
            friends: SqliteFriendRepository::new(conn),
            cache: SqliteContactCacheRepository::new(conn),
            cursors: SqliteSyncCursorRepository::new(conn),
            directory,
            photos,
            fields: default_field_table(),
        }
    }

    /// Replaces the syncable field table used for diffs.
    pub fn with_field_table(mut self, fields: &'conn [SyncableField]) -> Self {
        self.fields = fields;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Pulls every contact (or every change since the stored token) into the
    /// cache.
    ///
    /// Row failures are collected and do not stop the run. A transport or
    /// auth failure ends the run and is reported as a single entry; rows
    /// cached before it stay cached.
    pub async fn bulk_sync(&self, owner_id: &str) -> BulkSyncReport {
        let started_at = Instant::now();
        info!("event=bulk_sync module=sync status=start");

        let mut report = BulkSyncReport::default();
        match self.run_bulk_sync(owner_id, &mut report).await {
            Ok(()) => info!(
                "event=bulk_sync module=sync status=ok duration_ms={} pages={} synced={} errors={} token_reset={}",
                started_at.elapsed().as_millis(),
                report.pages,
                report.synced_count,
                report.errors.len(),
                report.token_reset
            ),
            Err(err) => {
                error!(
                    "event=bulk_sync module=sync status=error duration_ms={} pages={} synced={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    report.pages,
                    report.synced_count,
                    err.code(),
                    err
                );
                report.errors.push(SyncErrorEntry {
                    external_id: None,
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
        }
        report
    }

    async fn run_bulk_sync(
        &self,
        owner_id: &str,
        report: &mut BulkSyncReport,
    ) -> Result<(), SyncError> {
        let mut sync_token = self
            .cursors
            .get_cursor(owner_id)?
            .and_then(|cursor| cursor.sync_token);
        let mut retries_left = MAX_SYNC_TOKEN_RETRIES;

        let next_sync_token = loop {
            match self
                .fetch_pages(owner_id, sync_token.as_deref(), report)
                .await?
            {
                PassOutcome::Completed { next_sync_token } => break next_sync_token,
                PassOutcome::TokenRejected if retries_left > 0 => {
                    retries_left -= 1;
                    warn!("event=bulk_sync module=sync status=retry retry=invalid_sync_token");
                    self.cursors.clear_token(owner_id)?;
                    sync_token = None;
                    report.token_reset = true;
                }
                PassOutcome::TokenRejected => return Err(SyncError::SyncTokenRejected),
            }
        };

        if !report.errors.is_empty() {
            // Rows were skipped: the stored cursor stays as it was, so the
            // next run refetches them.
            warn!(
                "event=bulk_sync module=sync status=partial cursor=kept errors={}",
                report.errors.len()
            );
            return Ok(());
        }
        self.cursors
            .save_cursor(owner_id, next_sync_token.as_deref(), now_epoch_ms())?;
        Ok(())
    }

    async fn fetch_pages(
        &self,
        owner_id: &str,
        sync_token: Option<&str>,
        report: &mut BulkSyncReport,
    ) -> Result<PassOutcome, SyncError> {
        let mut request = ListRequest {
            page_token: None,
            sync_token: sync_token.map(str::to_string),
        };
        let mut first_page = true;

        loop {
            let page = self.directory.list_contacts(&request).await?;
            if request.is_incremental()
                && (page.sync_token_expired || (first_page && page.signals_invalid_sync_token()))
            {
                return Ok(PassOutcome::TokenRejected);
            }
            first_page = false;
            report.pages += 1;

            for contact in &page.contacts {
                match self.cache.upsert_contact(owner_id, contact) {
                    Ok(()) => report.synced_count += 1,
                    Err(err) => {
                        warn!(
                            "event=sync_row module=sync status=error external_id={} error={}",
                            contact.external_id, err
                        );
                        report.errors.push(SyncErrorEntry {
                            external_id: Some(contact.external_id.clone()),
                            code: "per_row_sync_error".to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }

            match page.next_page_token {
                Some(page_token) => request.page_token = Some(page_token),
                None => {
                    return Ok(PassOutcome::Completed {
                        next_sync_token: page.next_sync_token,
                    })
                }
            }
        }
    }

    /// Reconciles one friend with its linked contact.
    ///
    /// # Contract
    /// - Unlinked friend: `NotLinked`, nothing fetched.
    /// - Remote contact gone: the link is cleared and `Unlinked` returned.
    /// - Unchanged version tag without `force_compare`: `UpToDate`, no diff.
    /// - Otherwise diffs are computed, the photo refreshed, and the new
    ///   version tag stored even when there are no diffs.
    pub async fn sync_linked_friend(
        &self,
        owner_id: &str,
        friend_id: FriendId,
        options: SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let friend = self.require_friend(owner_id, friend_id)?;
        let Some(link) = friend.link.clone() else {
            info!("event=sync_friend module=sync status=skip reason=not_linked");
            return Ok(SyncOutcome::with_status(SyncStatus::NotLinked));
        };

        let Some(contact) = self.directory.get_contact(&link.external_id).await? else {
            self.friends.set_link(owner_id, friend_id, None)?;
            info!(
                "event=sync_friend module=sync status=unlinked reason=remote_contact_deleted external_id={}",
                link.external_id
            );
            return Ok(SyncOutcome {
                reason: Some(SyncReason::RemoteContactDeleted),
                message: Some("linked contact no longer exists; link removed".to_string()),
                ..SyncOutcome::with_status(SyncStatus::Unlinked)
            });
        };

        self.cache.upsert_contact(owner_id, &contact)?;

        if !options.force_compare && contact.etag == link.etag {
            self.friends
                .mark_synced(owner_id, friend_id, &contact.etag, now_epoch_ms())?;
            info!("event=sync_friend module=sync status=ok result=up_to_date path=etag");
            return Ok(SyncOutcome::with_status(SyncStatus::UpToDate));
        }

        let diffs = compute_field_diffs_with(self.fields, &friend, &contact);
        let photo_updated = self.sync_photo(&friend, &contact).await;
        self.friends
            .mark_synced(owner_id, friend_id, &contact.etag, now_epoch_ms())?;

        let status = if diffs.is_empty() {
            SyncStatus::UpToDate
        } else {
            SyncStatus::ChangesDetected
        };
        info!(
            "event=sync_friend module=sync status=ok result={} diffs={} photo_updated={}",
            status.as_str(),
            diffs.len(),
            photo_updated
        );
        Ok(SyncOutcome {
            diffs,
            photo_updated,
            ..SyncOutcome::with_status(status)
        })
    }

    /// Downloads the remote custom photo when it differs from the stored one.
    ///
    /// Every failure is logged and reported as `false`; the existing photo
    /// stays in place.
    async fn sync_photo(&self, friend: &Friend, contact: &ExternalContact) -> bool {
        let Some(url) = contact.custom_photo_url() else {
            return false;
        };
        if friend.photo_source_url.as_deref() == Some(url) {
            return false;
        }

        let Some(bytes) = self.directory.download_photo(url).await else {
            warn!("event=photo_sync module=sync status=error error_code=download_failed");
            return false;
        };
        let filename = match self.photos.save(&bytes) {
            Ok(filename) => filename,
            Err(err) => {
                warn!(
                    "event=photo_sync module=sync status=error error_code=save_failed error={err}"
                );
                return false;
            }
        };

        let mut updated = friend.clone();
        let previous = updated.photo_ref.replace(filename.clone());
        updated.photo_source_url = Some(url.to_string());
        if let Err(err) = self.friends.update_friend(&updated) {
            warn!(
                "event=photo_sync module=sync status=error error_code=friend_update_failed error={err}"
            );
            self.delete_photo_quietly(&filename);
            return false;
        }
        if let Some(previous) = previous {
            self.delete_photo_quietly(&previous);
        }
        info!("event=photo_sync module=sync status=ok");
        true
    }

    fn delete_photo_quietly(&self, filename: &str) {
        if let Err(err) = self.photos.delete(filename) {
            warn!("event=photo_sync module=sync status=error error_code=delete_failed error={err}");
        }
    }

    /// Applies one resolution per diffed field.
    ///
    /// `UseRemote` writes into the friend, `PushLocalToRemote` sends the friend's value
    /// to the directory, `KeepLocal` and `Skip` do nothing. Local writes are
    /// persisted before the push; a failed push is reported, not raised.
    pub async fn apply_resolutions(
        &self,
        owner_id: &str,
        friend_id: FriendId,
        resolutions: &[FieldResolution],
    ) -> Result<ApplyReport, SyncError> {
        let mut friend = self.require_friend(owner_id, friend_id)?;
        let mut applied_fields = Vec::new();
        let mut push_fields = Vec::new();

        for resolution in resolutions {
            match resolution.action {
                ResolutionAction::UseRemote => {
                    friend.set_field_value(resolution.field, resolution.value.as_deref());
                    applied_fields.push(resolution.field);
                }
                ResolutionAction::PushLocalToRemote => push_fields.push(resolution.field),
                ResolutionAction::KeepLocal | ResolutionAction::Skip => {}
            }
        }

        if !applied_fields.is_empty() {
            self.friends.update_friend(&friend)?;
        }

        let push = if push_fields.is_empty() {
            PushOutcome::NotRequested
        } else {
            self.push_local(owner_id, &friend, &push_fields).await
        };
        info!(
            "event=apply_resolutions module=sync status=ok applied={} pushed={}",
            applied_fields.len(),
            push_fields.len()
        );
        Ok(ApplyReport {
            applied_fields,
            push,
        })
    }

    /// Applies the default resolution of every diff; refuses any conflict.
    pub async fn apply_auto_resolutions(
        &self,
        owner_id: &str,
        friend_id: FriendId,
        diffs: &[FieldDiff],
    ) -> Result<ApplyReport, SyncError> {
        if !is_all_non_conflicting(diffs) {
            return Err(SyncError::ConflictsNeedReview);
        }
        self.apply_resolutions(owner_id, friend_id, &auto_resolutions(diffs))
            .await
    }

    async fn push_local(
        &self,
        owner_id: &str,
        friend: &Friend,
        fields: &[FieldKey],
    ) -> PushOutcome {
        let Some(link) = &friend.link else {
            warn!("event=push_remote module=sync status=error error_code=not_linked");
            return PushOutcome::Failed {
                code: "not_linked".to_string(),
                message: "friend is not linked to a contact".to_string(),
            };
        };

        // Unpatched entries of a pushed field are rebuilt from the cached
        // document; without it the push would replace them with nothing.
        let document = match self.cache.get_raw_payload(owner_id, &link.external_id) {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!(
                    "event=push_remote module=sync status=error external_id={} error_code=contact_not_cached",
                    link.external_id
                );
                return PushOutcome::Failed {
                    code: "contact_not_cached".to_string(),
                    message: format!("contact is not in the local cache: {}", link.external_id),
                };
            }
            Err(err) => {
                warn!(
                    "event=push_remote module=sync status=error external_id={} error_code=storage_error error={}",
                    link.external_id, err
                );
                return PushOutcome::Failed {
                    code: "storage_error".to_string(),
                    message: err.to_string(),
                };
            }
        };

        let mut patch = ContactPatch::new().with_base(document);
        for field in fields {
            patch.set(*field, friend.field_value(*field));
        }

        match self
            .directory
            .update_contact(&link.external_id, &link.etag, &patch)
            .await
        {
            Ok(contact) => {
                if let Err(err) = self.record_push(owner_id, friend.id, &contact) {
                    warn!(
                        "event=push_remote module=sync status=error error_code=local_refresh_failed error={err}"
                    );
                }
                info!(
                    "event=push_remote module=sync status=ok external_id={} fields={}",
                    contact.external_id,
                    fields.len()
                );
                PushOutcome::Pushed { etag: contact.etag }
            }
            Err(err) => {
                warn!(
                    "event=push_remote module=sync status=error external_id={} error_code={} error={}",
                    link.external_id,
                    err.code(),
                    err
                );
                PushOutcome::Failed {
                    code: err.code().to_string(),
                    message: err.to_string(),
                }
            }
        }
    }

    fn record_push(
        &self,
        owner_id: &str,
        friend_id: FriendId,
        contact: &ExternalContact,
    ) -> Result<(), RepoError> {
        self.cache.upsert_contact(owner_id, contact)?;
        self.friends.set_link(
            owner_id,
            friend_id,
            Some(&ContactLink {
                external_id: contact.external_id.clone(),
                etag: contact.etag.clone(),
            }),
        )
    }

    /// Links a friend to a cached contact at version `etag`.
    ///
    /// Callers should follow up with `sync_linked_friend` using
    /// `force_compare` so the fields are diffed at least once.
    pub fn link(
        &self,
        owner_id: &str,
        friend_id: FriendId,
        external_id: &str,
        etag: &str,
    ) -> Result<Friend, SyncError> {
        self.require_friend(owner_id, friend_id)?;
        if self.cache.get_contact(owner_id, external_id)?.is_none() {
            return Err(SyncError::ContactNotCached(external_id.to_string()));
        }
        if let Some(other) = self.friends.find_by_external_id(owner_id, external_id)? {
            if other.id != friend_id {
                return Err(SyncError::AlreadyLinked {
                    external_id: external_id.to_string(),
                    friend_id: other.id,
                });
            }
        }

        let link = ContactLink {
            external_id: external_id.to_string(),
            etag: etag.to_string(),
        };
        self.friends
            .set_link(owner_id, friend_id, Some(&link))
            .map_err(|err| match err {
                RepoError::ExternalIdTaken(external_id) => SyncError::AlreadyLinked {
                    external_id,
                    friend_id,
                },
                other => other.into(),
            })?;
        info!("event=link module=sync status=ok external_id={external_id}");
        self.require_friend(owner_id, friend_id)
    }

    pub fn unlink(&self, owner_id: &str, friend_id: FriendId) -> Result<(), SyncError> {
        self.require_friend(owner_id, friend_id)?;
        self.friends.set_link(owner_id, friend_id, None)?;
        info!("event=unlink module=sync status=ok");
        Ok(())
    }

    /// Creates a remote contact from an unlinked friend and links the two.
    pub async fn export_friend(
        &self,
        owner_id: &str,
        friend_id: FriendId,
    ) -> Result<Friend, SyncError> {
        let friend = self.require_friend(owner_id, friend_id)?;
        if friend.is_linked() {
            return Err(SyncError::FriendAlreadyLinked(friend_id));
        }

        let mut patch = ContactPatch::new();
        for key in FieldKey::ALL {
            if let Some(value) = friend.field_value(key) {
                patch.set(key, Some(value));
            }
        }
        let contact = self.directory.create_contact(&patch).await?;
        self.cache.upsert_contact(owner_id, &contact)?;
        self.friends.set_link(
            owner_id,
            friend_id,
            Some(&ContactLink {
                external_id: contact.external_id.clone(),
                etag: contact.etag.clone(),
            }),
        )?;
        self.friends
            .mark_synced(owner_id, friend_id, &contact.etag, now_epoch_ms())?;
        info!(
            "event=export_friend module=sync status=ok external_id={}",
            contact.external_id
        );
        self.require_friend(owner_id, friend_id)
    }

    /// Forgets the owner's directory connection: cache, cursor and links.
    pub fn disconnect(&self, owner_id: &str) -> Result<DisconnectReport, SyncError> {
        let cleared_contacts = self.cache.clear_owner(owner_id)?;
        let unlinked_friends = self.friends.clear_links(owner_id)?;
        self.cursors.delete_cursor(owner_id)?;
        info!(
            "event=disconnect module=sync status=ok cleared_contacts={cleared_contacts} unlinked_friends={unlinked_friends}"
        );
        Ok(DisconnectReport {
            cleared_contacts,
            unlinked_friends,
        })
    }

    fn require_friend(&self, owner_id: &str, friend_id: FriendId) -> Result<Friend, SyncError> {
        self.friends
            .get_friend(owner_id, friend_id)?
            .ok_or(SyncError::FriendNotFound(friend_id))
    }
}
