//! Core contact sync and entity resolution for the Circle relationship manager.
//! This crate owns the friend store, the contact cache and every sync decision.

pub mod config;
pub mod contacts;
pub mod db;
pub mod logging;
pub mod matching;
pub mod model;
pub mod photo;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, CoreConfig, MatchConfig, PeopleApiConfig};
pub use contacts::{
    ContactDirectory, ContactPage, ContactPatch, DirectoryError, DirectoryResult, ListRequest,
    PeopleApiClient,
};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use matching::{FuzzyMatcher, MatchCandidate, MatchResult, NicknameTable};
pub use model::contact::ExternalContact;
pub use model::field::FieldKey;
pub use model::friend::{ContactLink, Friend, FriendId};
pub use photo::{FsPhotoStore, PhotoStore, PhotoStoreError};
pub use repo::contact_cache_repo::{
    CachedContactQuery, ContactCacheRepository, SqliteContactCacheRepository,
};
pub use repo::friend_repo::{
    FriendListQuery, FriendRepository, LinkFilter, SqliteFriendRepository,
};
pub use repo::sync_cursor_repo::{SqliteSyncCursorRepository, SyncCursor, SyncCursorRepository};
pub use repo::{RepoError, RepoResult};
pub use service::{
    ApplyReport, BulkSyncReport, MatchService, MatchSuggestion, PushOutcome, SyncError,
    SyncOptions, SyncOutcome, SyncService, SyncStatus,
};
pub use sync::{compute_field_diffs, FieldDiff, FieldResolution, ResolutionAction};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
