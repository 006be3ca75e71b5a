//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define owner-scoped data access contracts for friends, the contact
//!   cache and the sync cursor.
//! - Keep SQL details out of the sync and matching services.
//!
//! # Invariants
//! - Every query is scoped by `owner_id`.
//! - Write paths validate domain records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::contact::ContactValidationError;
use crate::model::friend::{FriendId, FriendValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod contact_cache_repo;
pub mod friend_repo;
pub mod sync_cursor_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all owner-scoped stores.
#[derive(Debug)]
pub enum RepoError {
    InvalidFriend(FriendValidationError),
    InvalidContact(ContactValidationError),
    Db(DbError),
    FriendNotFound(FriendId),
    /// Another friend of the same owner already links to this external id.
    ExternalIdTaken(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFriend(err) => write!(f, "{err}"),
            Self::InvalidContact(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::FriendNotFound(id) => write!(f, "friend not found: {id}"),
            Self::ExternalIdTaken(external_id) => {
                write!(f, "external contact already linked: {external_id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFriend(err) => Some(err),
            Self::InvalidContact(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::FriendNotFound(_) | Self::ExternalIdTaken(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<FriendValidationError> for RepoError {
    fn from(value: FriendValidationError) -> Self {
        Self::InvalidFriend(value)
    }
}

impl From<ContactValidationError> for RepoError {
    fn from(value: ContactValidationError) -> Self {
        Self::InvalidContact(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}
