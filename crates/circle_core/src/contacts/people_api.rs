//! People API HTTP client.
//!
//! # Responsibility
//! - Translate directory operations into People API REST calls.
//! - Map HTTP status codes into the `DirectoryError` taxonomy.
//!
//! # Invariants
//! - 401 always maps to `AuthExpired` and is never retried here.
//! - The bearer token is only sent to the configured API base URL, never to
//!   photo hosts.

use crate::config::PeopleApiConfig;
use crate::contacts::directory::{ContactDirectory, ContactPage, ContactPatch, ListRequest};
use crate::contacts::error::{DirectoryError, DirectoryResult};
use crate::contacts::person::{contact_from_person, is_deleted, person_body};
use crate::logging::sanitize_message;
use crate::model::contact::ExternalContact;
use crate::model::now_epoch_ms;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Fixed read mask for every person fetched by this client.
pub const PERSON_FIELDS: &str =
    "names,emailAddresses,phoneNumbers,addresses,photos,birthdays,organizations,metadata";

const EXPIRED_SYNC_TOKEN_MARKER: &str = "EXPIRED_SYNC_TOKEN";
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

/// Authenticated People API client for one owner.
#[derive(Debug, Clone)]
pub struct PeopleApiClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
    page_size: u32,
}

impl PeopleApiClient {
    /// Creates a client bound to one OAuth access token.
    ///
    /// # Errors
    /// Returns `DirectoryError::Config` when the token is blank or the HTTP
    /// client cannot be built.
    pub fn new(config: &PeopleApiConfig, access_token: impl Into<String>) -> DirectoryResult<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(DirectoryError::Config(
                "access token cannot be blank".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                DirectoryError::Config(format!("failed to create HTTP client: {err}"))
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            page_size: config.effective_page_size(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> DirectoryResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(
            "event=people_api_request module=contacts operation={} status={}",
            operation,
            status.as_u16()
        );
        if status == StatusCode::UNAUTHORIZED {
            return Err(DirectoryError::AuthExpired);
        }
        Ok(response)
    }

    async fn read_json(response: Response) -> DirectoryResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn snapshot(person: &Value) -> DirectoryResult<ExternalContact> {
        let contact = contact_from_person(person, now_epoch_ms());
        if contact.external_id.is_empty() {
            return Err(DirectoryError::InvalidPayload(
                "person is missing resourceName".to_string(),
            ));
        }
        Ok(contact)
    }
}

#[async_trait]
impl ContactDirectory for PeopleApiClient {
    async fn list_contacts(&self, request: &ListRequest) -> DirectoryResult<ContactPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("personFields", PERSON_FIELDS.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("requestSyncToken", "true".to_string()),
        ];
        if let Some(page_token) = &request.page_token {
            query.push(("pageToken", page_token.clone()));
        }
        if let Some(sync_token) = &request.sync_token {
            query.push(("syncToken", sync_token.clone()));
        }

        let builder = self
            .request(Method::GET, "people/me/connections")
            .query(&query);
        let response = self.send(builder, "list").await?;
        let status = response.status();

        if request.is_incremental() && !status.is_success() {
            let error = transport_error(response).await;
            let expired = status == StatusCode::GONE
                || matches!(
                    &error,
                    DirectoryError::Transport { message, .. }
                        if message.contains(EXPIRED_SYNC_TOKEN_MARKER)
                );
            if expired {
                warn!(
                    "event=people_api_request module=contacts operation=list status=error error_code=sync_token_expired"
                );
                return Ok(ContactPage {
                    sync_token_expired: true,
                    ..ContactPage::default()
                });
            }
            return Err(error);
        }

        let body = Self::read_json(response).await?;
        let contacts = body
            .get("connections")
            .and_then(Value::as_array)
            .map(|people| {
                people
                    .iter()
                    .filter(|person| !is_deleted(person))
                    .map(|person| contact_from_person(person, now_epoch_ms()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ContactPage {
            contacts,
            next_page_token: non_empty_str(&body, "nextPageToken"),
            next_sync_token: non_empty_str(&body, "nextSyncToken"),
            sync_token_expired: false,
        })
    }

    async fn get_contact(&self, external_id: &str) -> DirectoryResult<Option<ExternalContact>> {
        let builder = self
            .request(Method::GET, external_id)
            .query(&[("personFields", PERSON_FIELDS)]);
        let response = self.send(builder, "get").await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Ok(None);
        }
        let person = Self::read_json(response).await?;
        if is_deleted(&person) {
            return Ok(None);
        }
        Self::snapshot(&person).map(Some)
    }

    async fn download_photo(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("event=photo_download module=contacts status=error error={err}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "event=photo_download module=contacts status=error http_status={}",
                response.status().as_u16()
            );
            return None;
        }
        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
            Ok(_) => None,
            Err(err) => {
                warn!("event=photo_download module=contacts status=error error={err}");
                None
            }
        }
    }

    async fn create_contact(&self, patch: &ContactPatch) -> DirectoryResult<ExternalContact> {
        let (body, _) = person_body(patch, None);
        let builder = self
            .request(Method::POST, "people:createContact")
            .query(&[("personFields", PERSON_FIELDS)])
            .json(&body);
        let response = self.send(builder, "create").await?;
        let person = Self::read_json(response).await?;
        Self::snapshot(&person)
    }

    async fn update_contact(
        &self,
        external_id: &str,
        etag: &str,
        patch: &ContactPatch,
    ) -> DirectoryResult<ExternalContact> {
        let (body, mask) = person_body(patch, Some(etag));
        if mask.is_empty() {
            return Err(DirectoryError::InvalidPayload(
                "update requires at least one field".to_string(),
            ));
        }
        let builder = self
            .request(Method::PATCH, &format!("{external_id}:updateContact"))
            .query(&[
                ("updatePersonFields", mask.join(",")),
                ("personFields", PERSON_FIELDS.to_string()),
            ])
            .json(&body);
        let response = self.send(builder, "update").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(external_id.to_string()));
        }
        let person = Self::read_json(response).await?;
        Self::snapshot(&person)
    }

    async fn delete_contact(&self, external_id: &str) -> DirectoryResult<()> {
        let builder = self.request(Method::DELETE, &format!("{external_id}:deleteContact"));
        let response = self.send(builder, "delete").await?;
        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(DirectoryError::NotFound(external_id.to_string()));
        }
        if !status.is_success() {
            return Err(transport_error(response).await);
        }
        Ok(())
    }
}

async fn transport_error(response: Response) -> DirectoryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            let message = error.get("message").and_then(Value::as_str).unwrap_or_default();
            let reason = error
                .pointer("/details/0/reason")
                .or_else(|| error.get("status"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(format!("{reason} {message}").trim().to_string())
        })
        .unwrap_or(body);
    DirectoryError::Transport {
        status,
        message: sanitize_message(&message, MAX_ERROR_MESSAGE_CHARS),
    }
}

fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
