//! Shared fixtures for circle_core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use circle_core::contacts::{
    ContactDirectory, ContactPage, ContactPatch, DirectoryError, DirectoryResult, ListRequest,
};
use circle_core::model::contact::{ContactPhoto, ExternalContact};
use circle_core::model::field::FieldKey;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const OWNER: &str = "owner-1";

/// Builds a contact snapshot with a display name and a raw payload.
pub fn contact(external_id: &str, etag: &str, name: &str) -> ExternalContact {
    let mut contact = ExternalContact::new(external_id, etag);
    contact.display_name = Some(name.to_string());
    contact.raw_payload = json!({
        "resourceName": external_id,
        "etag": etag,
        "names": [{ "displayName": name }]
    });
    contact.fetched_at = 1_700_000_000_000;
    contact
}

pub fn with_photo(mut contact: ExternalContact, url: &str) -> ExternalContact {
    contact.photos.push(ContactPhoto {
        url: url.to_string(),
        is_default: false,
    });
    contact
}

pub fn page(
    contacts: Vec<ExternalContact>,
    next_page_token: Option<&str>,
    next_sync_token: Option<&str>,
) -> ContactPage {
    ContactPage {
        contacts,
        next_page_token: next_page_token.map(str::to_string),
        next_sync_token: next_sync_token.map(str::to_string),
        sync_token_expired: false,
    }
}

/// Scripted failure returned by the fake directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    AuthExpired,
    Transport,
}

impl FakeFailure {
    fn to_error(self) -> DirectoryError {
        match self {
            Self::AuthExpired => DirectoryError::AuthExpired,
            Self::Transport => DirectoryError::Transport {
                status: 503,
                message: "backend unavailable".to_string(),
            },
        }
    }
}

#[derive(Default)]
pub struct FakeState {
    pub list_script: VecDeque<Result<ContactPage, FakeFailure>>,
    pub list_requests: Vec<ListRequest>,
    pub contacts: HashMap<String, ExternalContact>,
    pub get_failure: Option<FakeFailure>,
    pub photos: HashMap<String, Vec<u8>>,
    pub photo_requests: Vec<String>,
    pub update_failure: Option<FakeFailure>,
    pub updates: Vec<(String, String, ContactPatch)>,
    pub created: Vec<ContactPatch>,
    pub deleted: Vec<String>,
}

/// In-memory directory. Clones share state so tests can inspect calls.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn push_page(&self, page: ContactPage) {
        self.state().list_script.push_back(Ok(page));
    }

    pub fn push_list_failure(&self, failure: FakeFailure) {
        self.state().list_script.push_back(Err(failure));
    }

    pub fn put_contact(&self, contact: ExternalContact) {
        self.state()
            .contacts
            .insert(contact.external_id.clone(), contact);
    }

    pub fn remove_contact(&self, external_id: &str) {
        self.state().contacts.remove(external_id);
    }

    pub fn put_photo(&self, url: &str, bytes: &[u8]) {
        self.state().photos.insert(url.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ContactDirectory for FakeDirectory {
    async fn list_contacts(&self, request: &ListRequest) -> DirectoryResult<ContactPage> {
        let mut state = self.state();
        state.list_requests.push(request.clone());
        match state.list_script.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(ContactPage::default()),
        }
    }

    async fn get_contact(&self, external_id: &str) -> DirectoryResult<Option<ExternalContact>> {
        let state = self.state();
        if let Some(failure) = state.get_failure {
            return Err(failure.to_error());
        }
        Ok(state.contacts.get(external_id).cloned())
    }

    async fn download_photo(&self, url: &str) -> Option<Vec<u8>> {
        let mut state = self.state();
        state.photo_requests.push(url.to_string());
        state.photos.get(url).cloned()
    }

    async fn create_contact(&self, patch: &ContactPatch) -> DirectoryResult<ExternalContact> {
        let mut state = self.state();
        state.created.push(patch.clone());
        let external_id = format!("people/new{}", state.created.len());
        let mut created = ExternalContact::new(external_id.clone(), "etag-created");
        created.display_name = patch.get(FieldKey::Name).map(str::to_string);
        created.emails = patch.get(FieldKey::Email).map(str::to_string).into_iter().collect();
        created.raw_payload = json!({ "resourceName": external_id });
        state.contacts.insert(external_id, created.clone());
        Ok(created)
    }

    async fn update_contact(
        &self,
        external_id: &str,
        etag: &str,
        patch: &ContactPatch,
    ) -> DirectoryResult<ExternalContact> {
        let mut state = self.state();
        state
            .updates
            .push((external_id.to_string(), etag.to_string(), patch.clone()));
        if let Some(failure) = state.update_failure {
            return Err(failure.to_error());
        }
        let Some(existing) = state.contacts.get(external_id).cloned() else {
            return Err(DirectoryError::NotFound(external_id.to_string()));
        };
        let mut updated = existing;
        updated.etag = format!("{etag}-pushed");
        if let Some(phone) = patch.get(FieldKey::Phone) {
            updated.phones = vec![phone.to_string()];
        }
        if let Some(email) = patch.get(FieldKey::Email) {
            updated.emails = vec![email.to_string()];
        }
        state.contacts.insert(external_id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete_contact(&self, external_id: &str) -> DirectoryResult<()> {
        let mut state = self.state();
        state.deleted.push(external_id.to_string());
        match state.contacts.remove(external_id) {
            Some(_) => Ok(()),
            None => Err(DirectoryError::NotFound(external_id.to_string())),
        }
    }
}
