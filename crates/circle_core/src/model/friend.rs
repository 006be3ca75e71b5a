//! Friend domain model.
//!
//! # Responsibility
//! - Define the local person record the user curates.
//! - Carry the optional link to one external directory contact.
//!
//! # Invariants
//! - `id` is stable and never reused for another friend.
//! - `name` and `owner_id` are never blank.
//! - At most one friend per owner links to a given external id (enforced by
//!   the storage unique index).

use crate::model::field::FieldKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a friend.
pub type FriendId = Uuid;

/// Link from a friend to the external contact it mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactLink {
    /// Directory resource id (e.g. `people/c123`).
    pub external_id: String,
    /// Last version tag this friend was reconciled against.
    pub etag: String,
}

/// Local relationship record ("friend").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: FriendId,
    pub owner_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// `YYYY-MM-DD`; an unknown year is stored as the sentinel year.
    pub birthday: Option<String>,
    pub employer: Option<String>,
    pub occupation: Option<String>,
    /// Filename of the stored photo blob.
    pub photo_ref: Option<String>,
    /// Remote URL the stored photo was downloaded from.
    pub photo_source_url: Option<String>,
    pub link: Option<ContactLink>,
    pub last_synced_at: Option<i64>,
}

/// Validation failures for friend writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendValidationError {
    BlankName,
    BlankOwner,
    BlankExternalId,
}

impl Display for FriendValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "friend name cannot be blank"),
            Self::BlankOwner => write!(f, "friend owner id cannot be blank"),
            Self::BlankExternalId => write!(f, "contact link external id cannot be blank"),
        }
    }
}

impl Error for FriendValidationError {}

impl Friend {
    /// Creates an unlinked friend with a generated id.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            birthday: None,
            employer: None,
            occupation: None,
            photo_ref: None,
            photo_source_url: None,
            link: None,
            last_synced_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), FriendValidationError> {
        if self.name.trim().is_empty() {
            return Err(FriendValidationError::BlankName);
        }
        if self.owner_id.trim().is_empty() {
            return Err(FriendValidationError::BlankOwner);
        }
        if let Some(link) = &self.link {
            if link.external_id.trim().is_empty() {
                return Err(FriendValidationError::BlankExternalId);
            }
        }
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.external_id.as_str())
    }

    /// Returns the stored value of one syncable field.
    pub fn field_value(&self, key: FieldKey) -> Option<&str> {
        match key {
            FieldKey::Name => Some(self.name.as_str()),
            FieldKey::Email => self.email.as_deref(),
            FieldKey::Phone => self.phone.as_deref(),
            FieldKey::Address => self.address.as_deref(),
            FieldKey::Birthday => self.birthday.as_deref(),
            FieldKey::Employer => self.employer.as_deref(),
            FieldKey::Occupation => self.occupation.as_deref(),
        }
    }

    /// Writes one syncable field. Blank values clear optional fields.
    ///
    /// The name is never cleared; a blank name write is ignored.
    pub fn set_field_value(&mut self, key: FieldKey, value: Option<&str>) {
        let value = value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        match key {
            FieldKey::Name => {
                if let Some(name) = value {
                    self.name = name;
                }
            }
            FieldKey::Email => self.email = value,
            FieldKey::Phone => self.phone = value,
            FieldKey::Address => self.address = value,
            FieldKey::Birthday => self.birthday = value,
            FieldKey::Employer => self.employer = value,
            FieldKey::Occupation => self.occupation = value,
        }
    }
}
