//! Keys of the fields that can be diffed and synced between a friend and a contact.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One syncable friend/contact field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    Email,
    Phone,
    Address,
    Birthday,
    Employer,
    Occupation,
}

impl FieldKey {
    pub const ALL: [FieldKey; 7] = [
        FieldKey::Name,
        FieldKey::Email,
        FieldKey::Phone,
        FieldKey::Address,
        FieldKey::Birthday,
        FieldKey::Employer,
        FieldKey::Occupation,
    ];

    /// Stable wire/storage key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Birthday => "birthday",
            Self::Employer => "employer",
            Self::Occupation => "occupation",
        }
    }

    /// Human-readable label shown next to a diff.
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Address => "Address",
            Self::Birthday => "Birthday",
            Self::Employer => "Company",
            Self::Occupation => "Job title",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
