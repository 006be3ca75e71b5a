//! Field-level comparison between a friend and its linked contact.
//!
//! # Invariants
//! - Both sides are normalized before comparison; blank equals absent.
//! - A diff is emitted only when normalized values differ.
//! - Table order is the diff order.

use crate::matching::normalize_phone;
use crate::model::birthday::BirthDate;
use crate::model::contact::ExternalContact;
use crate::model::field::FieldKey;
use crate::model::friend::Friend;
use serde::Serialize;

/// How values of one field are normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whitespace-collapsed, case-insensitive.
    Text,
    /// Trimmed, case-insensitive.
    Email,
    /// Digits only, US country code dropped.
    Phone,
    /// Calendar date; an unknown year matches any year.
    Birthday,
}

/// One entry of the syncable field table.
#[derive(Clone, Copy)]
pub struct SyncableField {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
    pub local: fn(&Friend) -> Option<&str>,
    pub remote_primary: fn(&ExternalContact) -> Option<&str>,
    /// Every remote value, for multi-valued fields.
    pub remote_all: Option<fn(&ExternalContact) -> Vec<&str>>,
}

impl std::fmt::Debug for SyncableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncableField")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

static DEFAULT_FIELDS: [SyncableField; 7] = [
    SyncableField {
        key: FieldKey::Name,
        label: "Name",
        kind: FieldKind::Text,
        local: |friend| Some(friend.name.as_str()),
        remote_primary: |contact| contact.primary_value(FieldKey::Name),
        remote_all: None,
    },
    SyncableField {
        key: FieldKey::Email,
        label: "Email",
        kind: FieldKind::Email,
        local: |friend| friend.email.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Email),
        remote_all: Some(all_emails),
    },
    SyncableField {
        key: FieldKey::Phone,
        label: "Phone",
        kind: FieldKind::Phone,
        local: |friend| friend.phone.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Phone),
        remote_all: Some(all_phones),
    },
    SyncableField {
        key: FieldKey::Address,
        label: "Address",
        kind: FieldKind::Text,
        local: |friend| friend.address.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Address),
        remote_all: Some(all_addresses),
    },
    SyncableField {
        key: FieldKey::Birthday,
        label: "Birthday",
        kind: FieldKind::Birthday,
        local: |friend| friend.birthday.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Birthday),
        remote_all: None,
    },
    SyncableField {
        key: FieldKey::Employer,
        label: "Company",
        kind: FieldKind::Text,
        local: |friend| friend.employer.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Employer),
        remote_all: None,
    },
    SyncableField {
        key: FieldKey::Occupation,
        label: "Job title",
        kind: FieldKind::Text,
        local: |friend| friend.occupation.as_deref(),
        remote_primary: |contact| contact.primary_value(FieldKey::Occupation),
        remote_all: None,
    },
];

fn all_emails(contact: &ExternalContact) -> Vec<&str> {
    contact.all_values(FieldKey::Email)
}

fn all_phones(contact: &ExternalContact) -> Vec<&str> {
    contact.all_values(FieldKey::Phone)
}

fn all_addresses(contact: &ExternalContact) -> Vec<&str> {
    contact.all_values(FieldKey::Address)
}

/// The fixed ordered field table used by the sync service.
pub fn default_field_table() -> &'static [SyncableField] {
    &DEFAULT_FIELDS
}

/// One field whose normalized local and remote values disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: FieldKey,
    pub label: String,
    pub local_value: Option<String>,
    pub remote_value: Option<String>,
    /// Every remote value when the field has more than one.
    pub remote_alternatives: Vec<String>,
}

impl FieldDiff {
    /// Both sides hold differing values and a human has to pick one.
    pub fn is_conflict(&self) -> bool {
        self.local_value.is_some() && self.remote_value.is_some()
    }
}

/// Diffs `friend` against `contact` using the default field table.
pub fn compute_field_diffs(friend: &Friend, contact: &ExternalContact) -> Vec<FieldDiff> {
    compute_field_diffs_with(default_field_table(), friend, contact)
}

/// Diffs `friend` against `contact` using an injected field table.
pub fn compute_field_diffs_with(
    table: &[SyncableField],
    friend: &Friend,
    contact: &ExternalContact,
) -> Vec<FieldDiff> {
    table
        .iter()
        .filter_map(|field| {
            let local = present((field.local)(friend));
            let remote = present((field.remote_primary)(contact));
            if values_equal(field.kind, local, remote) {
                return None;
            }
            let remote_alternatives = field
                .remote_all
                .map(|all| all(contact))
                .filter(|values| values.len() > 1)
                .map(|values| values.into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            Some(FieldDiff {
                field: field.key,
                label: field.label.to_string(),
                local_value: local.map(str::to_string),
                remote_value: remote.map(str::to_string),
                remote_alternatives,
            })
        })
        .collect()
}

/// Whether two raw values are equal after `kind` normalization.
pub fn values_equal(kind: FieldKind, left: Option<&str>, right: Option<&str>) -> bool {
    match (present(left), present(right)) {
        (None, None) => true,
        (Some(left), Some(right)) => match kind {
            FieldKind::Birthday => match (BirthDate::parse(left), BirthDate::parse(right)) {
                (Some(left), Some(right)) => left.is_same_birthday(right),
                _ => normalize_text(left) == normalize_text(right),
            },
            _ => normalize(kind, left) == normalize(kind, right),
        },
        _ => false,
    }
}

fn normalize(kind: FieldKind, value: &str) -> String {
    match kind {
        FieldKind::Email => value.trim().to_lowercase(),
        FieldKind::Phone => {
            let digits = normalize_phone(value);
            if digits.is_empty() {
                normalize_text(value)
            } else {
                digits
            }
        }
        FieldKind::Text | FieldKind::Birthday => normalize_text(value),
    }
}

fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
