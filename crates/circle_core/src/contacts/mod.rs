//! External contact directory adapter.
//!
//! # Responsibility
//! - Isolate every remote-API and auth concern behind [`ContactDirectory`].
//! - Map the directory's person JSON into [`ExternalContact`] snapshots.
//!
//! # Invariants
//! - Expired credentials surface as `DirectoryError::AuthExpired`, never retried.
//! - A vanished contact on single fetch is `Ok(None)`, not an error.
//!
//! [`ExternalContact`]: crate::model::contact::ExternalContact

pub mod directory;
pub mod error;
pub mod people_api;
pub mod person;

pub use directory::{ContactDirectory, ContactPage, ContactPatch, ListRequest};
pub use error::{DirectoryError, DirectoryResult};
pub use people_api::{PeopleApiClient, PERSON_FIELDS};
