//! Mapping between the directory's person JSON and contact snapshots.
//!
//! Read mask: names, emailAddresses, phoneNumbers, addresses, photos,
//! birthdays, organizations, metadata. Multi-valued entries flagged
//! `metadata.primary` are ordered first; the rest keep directory order.

use crate::contacts::directory::ContactPatch;
use crate::model::birthday::BirthDate;
use crate::model::contact::{ContactPhoto, ExternalContact, Organization};
use crate::model::field::FieldKey;
use serde_json::{json, Map, Value};

/// Returns the first non-blank candidate, trimmed, in priority order.
pub fn first_present<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Whether the directory marks this person as deleted (incremental listings).
pub fn is_deleted(person: &Value) -> bool {
    person
        .pointer("/metadata/deleted")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Projects a person document into a snapshot, keeping the document as raw payload.
///
/// Missing identifiers map to empty strings; the cache rejects such rows on write.
pub fn contact_from_person(person: &Value, fetched_at: i64) -> ExternalContact {
    let mut contact = ExternalContact::new(
        str_at(person, "resourceName").unwrap_or_default(),
        str_at(person, "etag").unwrap_or_default(),
    );

    contact.display_name = primary_first(person, "names")
        .into_iter()
        .find_map(|name| {
            first_present([
                str_at(name, "displayName"),
                str_at(name, "unstructuredName"),
                joined(&[str_at(name, "givenName"), str_at(name, "familyName")]),
            ])
        });
    contact.emails = collect_values(person, "emailAddresses", |entry| str_at(entry, "value"));
    contact.phones = collect_values(person, "phoneNumbers", |entry| {
        first_present([str_at(entry, "value"), str_at(entry, "canonicalForm")])
    });
    contact.addresses = collect_values(person, "addresses", |entry| {
        first_present([
            str_at(entry, "formattedValue"),
            joined(&[
                str_at(entry, "streetAddress"),
                str_at(entry, "city"),
                str_at(entry, "region"),
                str_at(entry, "postalCode"),
                str_at(entry, "country"),
            ]),
        ])
    });
    contact.birthdays = collect_values(person, "birthdays", birthday_value);
    contact.organizations = primary_first(person, "organizations")
        .into_iter()
        .map(|entry| Organization {
            name: first_present([str_at(entry, "name")]),
            title: first_present([str_at(entry, "title")]),
        })
        .filter(|org| org.name.is_some() || org.title.is_some())
        .collect();
    contact.photos = primary_first(person, "photos")
        .into_iter()
        .filter_map(|entry| {
            let url = first_present([str_at(entry, "url")])?;
            Some(ContactPhoto {
                url,
                is_default: entry.get("default").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect();
    contact.raw_payload = person.clone();
    contact.fetched_at = fetched_at;
    contact
}

/// Builds the person body for create/update plus the `updatePersonFields` mask.
///
/// Each patched field starts from the entries of the patch base, if any. The
/// primary entry is rewritten in place, keeping its `type` and `metadata`,
/// and the other entries are sent back untouched. Clearing a field removes
/// only its primary entry.
pub fn person_body(patch: &ContactPatch, etag: Option<&str>) -> (Value, Vec<&'static str>) {
    let mut body = Map::new();
    let mut mask = Vec::new();

    for key in patch.keys() {
        let field = person_field(key);
        if mask.contains(&field) {
            continue;
        }
        let mut entries = base_entries(patch.base(), field);
        match key {
            FieldKey::Employer | FieldKey::Occupation => merge_organization(&mut entries, patch),
            _ => merge_primary(&mut entries, key, patch.get(key)),
        }
        mask.push(field);
        body.insert(field.to_string(), Value::Array(entries));
    }

    if let Some(etag) = etag {
        body.insert("etag".to_string(), Value::String(etag.to_string()));
    }
    (Value::Object(body), mask)
}

fn person_field(key: FieldKey) -> &'static str {
    match key {
        FieldKey::Name => "names",
        FieldKey::Email => "emailAddresses",
        FieldKey::Phone => "phoneNumbers",
        FieldKey::Address => "addresses",
        FieldKey::Birthday => "birthdays",
        FieldKey::Employer | FieldKey::Occupation => "organizations",
    }
}

/// Entry properties that carry the value of `key`; all are replaced together.
fn value_properties(key: FieldKey) -> &'static [&'static str] {
    match key {
        FieldKey::Name => &[
            "displayName",
            "displayNameLastFirst",
            "unstructuredName",
            "givenName",
            "middleName",
            "familyName",
            "honorificPrefix",
            "honorificSuffix",
        ],
        FieldKey::Email => &["value"],
        FieldKey::Phone => &["value", "canonicalForm"],
        FieldKey::Address => &[
            "formattedValue",
            "poBox",
            "streetAddress",
            "extendedAddress",
            "city",
            "region",
            "postalCode",
            "country",
            "countryCode",
        ],
        FieldKey::Birthday => &["date", "text"],
        FieldKey::Employer => &["name"],
        FieldKey::Occupation => &["title"],
    }
}

fn value_entry(key: FieldKey, value: &str) -> Value {
    match key {
        FieldKey::Name => json!({ "unstructuredName": value }),
        FieldKey::Email | FieldKey::Phone => json!({ "value": value }),
        FieldKey::Address => json!({ "formattedValue": value }),
        FieldKey::Birthday => birthday_entry(value),
        FieldKey::Employer => json!({ "name": value }),
        FieldKey::Occupation => json!({ "title": value }),
    }
}

fn base_entries(base: Option<&Value>, field: &str) -> Vec<Value> {
    base.and_then(|document| document.get(field))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Index of the entry flagged primary, else the first entry.
fn primary_index(entries: &[Value]) -> Option<usize> {
    entries
        .iter()
        .position(is_primary)
        .or_else(|| (!entries.is_empty()).then_some(0))
}

fn merge_primary(entries: &mut Vec<Value>, key: FieldKey, value: Option<&str>) {
    match (value, primary_index(entries)) {
        (Some(value), Some(index)) => match (&mut entries[index], value_entry(key, value)) {
            (Value::Object(entry), Value::Object(fresh)) => {
                for property in value_properties(key) {
                    entry.remove(*property);
                }
                entry.extend(fresh);
            }
            (slot, fresh) => *slot = fresh,
        },
        (Some(value), None) => entries.push(value_entry(key, value)),
        (None, Some(index)) => {
            entries.remove(index);
        }
        (None, None) => {}
    }
}

/// Employer and occupation share the primary organization entry.
fn merge_organization(entries: &mut Vec<Value>, patch: &ContactPatch) {
    let index = match primary_index(entries) {
        Some(index) => index,
        None => {
            entries.push(Value::Object(Map::new()));
            entries.len() - 1
        }
    };
    if let Value::Object(entry) = &mut entries[index] {
        for key in [FieldKey::Employer, FieldKey::Occupation] {
            if !patch.contains(key) {
                continue;
            }
            for property in value_properties(key) {
                entry.remove(*property);
            }
            if let Some(Value::Object(fresh)) = patch.get(key).map(|value| value_entry(key, value))
            {
                entry.extend(fresh);
            }
        }
    }
    let organization = &entries[index];
    if organization.get("name").is_none() && organization.get("title").is_none() {
        entries.remove(index);
    }
}

fn birthday_entry(value: &str) -> Value {
    match BirthDate::parse(value) {
        Some(date) => {
            let mut parts = Map::new();
            if let Some(year) = date.year {
                parts.insert("year".to_string(), json!(year));
            }
            parts.insert("month".to_string(), json!(date.month));
            parts.insert("day".to_string(), json!(date.day));
            json!({ "date": Value::Object(parts) })
        }
        None => json!({ "text": value }),
    }
}

fn birthday_value(entry: &Value) -> Option<String> {
    if let Some(date) = entry.get("date") {
        let year = date
            .get("year")
            .and_then(Value::as_u64)
            .and_then(|year| u16::try_from(year).ok());
        let month = date
            .get("month")
            .and_then(Value::as_u64)
            .and_then(|month| u8::try_from(month).ok());
        let day = date
            .get("day")
            .and_then(Value::as_u64)
            .and_then(|day| u8::try_from(day).ok());
        if let (Some(month), Some(day)) = (month, day) {
            if let Some(parsed) = BirthDate::new(year, month, day) {
                return Some(parsed.to_storage_string());
            }
        }
    }
    let text = first_present([str_at(entry, "text")])?;
    Some(
        BirthDate::parse(&text)
            .map(BirthDate::to_storage_string)
            .unwrap_or(text),
    )
}

fn collect_values(
    person: &Value,
    field: &str,
    extract: impl Fn(&Value) -> Option<String>,
) -> Vec<String> {
    primary_first(person, field)
        .into_iter()
        .filter_map(extract)
        .collect()
}

fn primary_first<'a>(person: &'a Value, field: &str) -> Vec<&'a Value> {
    let mut entries: Vec<&Value> = person
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default();
    entries.sort_by_key(|entry| !is_primary(entry));
    entries
}

fn is_primary(entry: &Value) -> bool {
    entry
        .pointer("/metadata/primary")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn str_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn joined(parts: &[Option<String>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(joined)
}
