//! Cached snapshot of one external directory contact.
//!
//! The structural fields are a projection used for matching and diffing. The
//! `raw_payload` keeps the full directory document so labels, types and
//! metadata the projection drops can still be recovered.

use crate::model::field::FieldKey;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Organization entry of an external contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: Option<String>,
    pub title: Option<String>,
}

/// Photo entry of an external contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPhoto {
    pub url: String,
    /// Directory-generated placeholder (initials avatar).
    pub is_default: bool,
}

/// Structural projection of a remote contact plus its raw document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalContact {
    pub external_id: String,
    pub etag: String,
    pub display_name: Option<String>,
    /// Primary value first.
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
    /// `YYYY-MM-DD`, with [`UNKNOWN_BIRTH_YEAR`] when the year is missing.
    ///
    /// [`UNKNOWN_BIRTH_YEAR`]: crate::model::birthday::UNKNOWN_BIRTH_YEAR
    pub birthdays: Vec<String>,
    pub organizations: Vec<Organization>,
    pub photos: Vec<ContactPhoto>,
    pub raw_payload: serde_json::Value,
    pub fetched_at: i64,
}

/// Validation failures for cache writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    BlankExternalId,
    BlankEtag,
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankExternalId => write!(f, "contact external id cannot be blank"),
            Self::BlankEtag => write!(f, "contact etag cannot be blank"),
        }
    }
}

impl Error for ContactValidationError {}

impl ExternalContact {
    /// Creates an empty snapshot for `external_id` at version `etag`.
    pub fn new(external_id: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            etag: etag.into(),
            display_name: None,
            emails: Vec::new(),
            phones: Vec::new(),
            addresses: Vec::new(),
            birthdays: Vec::new(),
            organizations: Vec::new(),
            photos: Vec::new(),
            raw_payload: serde_json::Value::Null,
            fetched_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ContactValidationError> {
        if self.external_id.trim().is_empty() {
            return Err(ContactValidationError::BlankExternalId);
        }
        if self.etag.trim().is_empty() {
            return Err(ContactValidationError::BlankEtag);
        }
        Ok(())
    }

    pub fn has_phone(&self) -> bool {
        self.phones.iter().any(|phone| !phone.trim().is_empty())
    }

    /// Primary value of one syncable field.
    pub fn primary_value(&self, key: FieldKey) -> Option<&str> {
        match key {
            FieldKey::Name => self.display_name.as_deref(),
            FieldKey::Email => first_non_blank(&self.emails),
            FieldKey::Phone => first_non_blank(&self.phones),
            FieldKey::Address => first_non_blank(&self.addresses),
            FieldKey::Birthday => first_non_blank(&self.birthdays),
            FieldKey::Employer => self
                .organizations
                .iter()
                .find_map(|org| non_blank(org.name.as_deref())),
            FieldKey::Occupation => self
                .organizations
                .iter()
                .find_map(|org| non_blank(org.title.as_deref())),
        }
    }

    /// Every non-blank value of one field, primary first.
    pub fn all_values(&self, key: FieldKey) -> Vec<&str> {
        let values: Vec<Option<&str>> = match key {
            FieldKey::Name => vec![self.display_name.as_deref()],
            FieldKey::Email => self.emails.iter().map(|v| Some(v.as_str())).collect(),
            FieldKey::Phone => self.phones.iter().map(|v| Some(v.as_str())).collect(),
            FieldKey::Address => self.addresses.iter().map(|v| Some(v.as_str())).collect(),
            FieldKey::Birthday => self.birthdays.iter().map(|v| Some(v.as_str())).collect(),
            FieldKey::Employer => self
                .organizations
                .iter()
                .map(|org| org.name.as_deref())
                .collect(),
            FieldKey::Occupation => self
                .organizations
                .iter()
                .map(|org| org.title.as_deref())
                .collect(),
        };
        values.into_iter().filter_map(non_blank).collect()
    }

    /// First photo URL that is not a directory placeholder.
    pub fn custom_photo_url(&self) -> Option<&str> {
        self.photos
            .iter()
            .find(|photo| !photo.is_default && !photo.url.trim().is_empty())
            .map(|photo| photo.url.as_str())
    }
}

fn first_non_blank(values: &[String]) -> Option<&str> {
    values.iter().find_map(|value| non_blank(Some(value.as_str())))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
