mod common;

use circle_core::contacts::person::person_body;
use circle_core::db::open_db_in_memory;
use circle_core::model::contact::Organization;
use circle_core::{
    CachedContactQuery, ContactCacheRepository, ContactLink, FieldKey, FieldResolution, Friend,
    FriendRepository, FsPhotoStore, PushOutcome, ResolutionAction, SqliteContactCacheRepository,
    SqliteFriendRepository, SqliteSyncCursorRepository, SyncCursorRepository, SyncError,
    SyncOptions, SyncService, SyncStatus,
};
use circle_core::service::SyncReason;
use common::{contact, with_photo, FakeDirectory, FakeFailure, OWNER};
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    conn: Connection,
    directory: FakeDirectory,
    photos_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conn: open_db_in_memory().unwrap(),
            directory: FakeDirectory::new(),
            photos_dir: TempDir::new().unwrap(),
        }
    }

    fn service(&self) -> SyncService<'_, FakeDirectory, FsPhotoStore> {
        let photos = FsPhotoStore::new(self.photos_dir.path()).unwrap();
        SyncService::new(&self.conn, self.directory.clone(), photos)
    }

    fn friends(&self) -> SqliteFriendRepository<'_> {
        SqliteFriendRepository::new(&self.conn)
    }

    fn cache(&self) -> SqliteContactCacheRepository<'_> {
        SqliteContactCacheRepository::new(&self.conn)
    }

    /// Ada, linked to `people/c1` at `e1`, with a matching remote contact.
    fn linked_ada(&self) -> Friend {
        let mut ada = Friend::new(OWNER, "Ada Lovelace");
        ada.email = Some("ada@example.com".to_string());
        ada.phone = Some("(555) 123-4567".to_string());
        ada.link = Some(ContactLink {
            external_id: "people/c1".to_string(),
            etag: "e1".to_string(),
        });
        self.friends().create_friend(&ada).unwrap();

        let mut remote = contact("people/c1", "e1", "Ada Lovelace");
        remote.emails = vec!["ada@example.com".to_string()];
        remote.phones = vec!["555.123.4567".to_string()];
        self.directory.put_contact(remote.clone());
        self.cache().upsert_contact(OWNER, &remote).unwrap();
        ada
    }

    fn reload(&self, friend: &Friend) -> Friend {
        self.friends().get_friend(OWNER, friend.id).unwrap().unwrap()
    }

    fn update_remote(&self, external_id: &str, edit: impl FnOnce(&mut circle_core::ExternalContact)) {
        let mut state = self.directory.state();
        let remote = state.contacts.get_mut(external_id).unwrap();
        edit(remote);
    }
}

const FORCE: SyncOptions = SyncOptions {
    force_compare: true,
};

#[tokio::test]
async fn unlinked_friend_reports_not_linked_without_fetching() {
    let fx = Fixture::new();
    let bob = Friend::new(OWNER, "Bob");
    fx.friends().create_friend(&bob).unwrap();
    fx.directory.state().get_failure = Some(FakeFailure::Transport);

    let outcome = fx
        .service()
        .sync_linked_friend(OWNER, bob.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::NotLinked);
    assert!(outcome.diffs.is_empty());
}

#[tokio::test]
async fn unknown_friend_is_an_error() {
    let fx = Fixture::new();
    let ghost = Friend::new(OWNER, "Ghost");

    let err = fx
        .service()
        .sync_linked_friend(OWNER, ghost.id, SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::FriendNotFound(id) if id == ghost.id));
}

#[tokio::test]
async fn remote_deletion_clears_the_link() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.directory.remove_contact("people/c1");

    let outcome = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::Unlinked);
    assert_eq!(outcome.reason, Some(SyncReason::RemoteContactDeleted));
    assert!(outcome.message.is_some());
    assert_eq!(fx.reload(&ada).link, None);
}

#[tokio::test]
async fn matching_etag_takes_the_cheap_path_unless_forced() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    // Same etag, different field: only a forced compare sees it.
    fx.update_remote("people/c1", |remote| {
        remote.addresses = vec!["12 St James's Sq".to_string()];
    });

    let cheap = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(cheap.status, SyncStatus::UpToDate);
    assert!(cheap.diffs.is_empty());
    assert!(fx.reload(&ada).last_synced_at.is_some());

    let forced = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, FORCE)
        .await
        .unwrap();
    assert_eq!(forced.status, SyncStatus::ChangesDetected);
    assert_eq!(forced.diffs.len(), 1);
    assert_eq!(forced.diffs[0].field, FieldKey::Address);
    assert_eq!(forced.diffs[0].local_value, None);
}

#[tokio::test]
async fn new_etag_with_cosmetic_changes_is_up_to_date_and_adopts_the_tag() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.update_remote("people/c1", |remote| {
        remote.etag = "e2".to_string();
        remote.phones = vec!["+1 555 123 4567".to_string()];
        remote.emails = vec![" ADA@example.com".to_string()];
    });

    let outcome = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::UpToDate);
    assert!(outcome.diffs.is_empty());
    assert_eq!(fx.reload(&ada).link.unwrap().etag, "e2");
    let cached = fx.cache().get_contact(OWNER, "people/c1").unwrap().unwrap();
    assert_eq!(cached.etag, "e2");
}

#[tokio::test]
async fn remote_changes_are_reported_as_diffs() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.update_remote("people/c1", |remote| {
        remote.etag = "e2".to_string();
        remote.phones = vec!["555-2222".to_string(), "555-3333".to_string()];
        remote.organizations = vec![Organization {
            name: Some("Analytical Engines".to_string()),
            title: None,
        }];
    });

    let outcome = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.status, SyncStatus::ChangesDetected);
    let fields: Vec<FieldKey> = outcome.diffs.iter().map(|diff| diff.field).collect();
    assert_eq!(fields, vec![FieldKey::Phone, FieldKey::Employer]);
    assert_eq!(outcome.diffs[0].remote_alternatives, vec!["555-2222", "555-3333"]);
    assert_eq!(fx.reload(&ada).link.unwrap().etag, "e2");
}

#[tokio::test]
async fn expired_credentials_surface_as_auth_error() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.directory.state().get_failure = Some(FakeFailure::AuthExpired);

    let err = fx
        .service()
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_auth_expired());
    assert!(fx.reload(&ada).link.is_some());
}

#[tokio::test]
async fn new_remote_photo_replaces_the_old_one() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.update_remote("people/c1", |remote| {
        *remote = with_photo(remote.clone(), "https://photos.example/ada-1.jpg");
    });
    fx.directory.put_photo("https://photos.example/ada-1.jpg", b"first");

    let outcome = fx.service().sync_linked_friend(OWNER, ada.id, FORCE).await.unwrap();
    assert!(outcome.photo_updated);
    let first = fx.reload(&ada);
    let first_ref = first.photo_ref.clone().unwrap();
    assert_eq!(
        first.photo_source_url.as_deref(),
        Some("https://photos.example/ada-1.jpg")
    );
    assert_eq!(std::fs::read(fx.photos_dir.path().join(&first_ref)).unwrap(), b"first");

    fx.update_remote("people/c1", |remote| {
        remote.photos.clear();
        *remote = with_photo(remote.clone(), "https://photos.example/ada-2.jpg");
    });
    fx.directory.put_photo("https://photos.example/ada-2.jpg", b"second");

    let outcome = fx.service().sync_linked_friend(OWNER, ada.id, FORCE).await.unwrap();
    assert!(outcome.photo_updated);
    let second = fx.reload(&ada);
    let second_ref = second.photo_ref.unwrap();
    assert_ne!(second_ref, first_ref);
    assert!(!fx.photos_dir.path().join(&first_ref).exists());
    assert_eq!(std::fs::read(fx.photos_dir.path().join(&second_ref)).unwrap(), b"second");
}

#[tokio::test]
async fn failed_photo_download_keeps_the_existing_photo() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    let mut with_existing = fx.reload(&ada);
    with_existing.photo_ref = Some("existing.jpg".to_string());
    with_existing.photo_source_url = Some("https://photos.example/old.jpg".to_string());
    fx.friends().update_friend(&with_existing).unwrap();
    fx.update_remote("people/c1", |remote| {
        *remote = with_photo(remote.clone(), "https://photos.example/unreachable.jpg");
    });

    let outcome = fx.service().sync_linked_friend(OWNER, ada.id, FORCE).await.unwrap();

    assert!(!outcome.photo_updated);
    assert_eq!(
        fx.directory.state().photo_requests,
        vec!["https://photos.example/unreachable.jpg"]
    );
    let reloaded = fx.reload(&ada);
    assert_eq!(reloaded.photo_ref.as_deref(), Some("existing.jpg"));
    assert_eq!(
        reloaded.photo_source_url.as_deref(),
        Some("https://photos.example/old.jpg")
    );
}

#[tokio::test]
async fn failed_photo_write_still_records_the_sync() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.conn
        .execute_batch(
            "CREATE TRIGGER reject_photo_writes BEFORE UPDATE OF photo_ref ON friends
             BEGIN SELECT RAISE(ABORT, 'photo writes disabled'); END;",
        )
        .unwrap();
    fx.update_remote("people/c1", |remote| {
        remote.etag = "e2".to_string();
        *remote = with_photo(remote.clone(), "https://photos.example/ada-1.jpg");
    });
    fx.directory.put_photo("https://photos.example/ada-1.jpg", b"first");

    let outcome = fx.service().sync_linked_friend(OWNER, ada.id, FORCE).await.unwrap();

    assert!(!outcome.photo_updated);
    let reloaded = fx.reload(&ada);
    assert_eq!(reloaded.link.unwrap().etag, "e2");
    assert!(reloaded.last_synced_at.is_some());
    assert_eq!(reloaded.photo_ref, None);
    assert_eq!(std::fs::read_dir(fx.photos_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn push_failure_is_swallowed_and_local_writes_stay() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.directory.state().update_failure = Some(FakeFailure::Transport);

    let report = fx
        .service()
        .apply_resolutions(
            OWNER,
            ada.id,
            &[
                FieldResolution::new(
                    FieldKey::Address,
                    ResolutionAction::UseRemote,
                    Some("12 St James's Sq"),
                ),
                FieldResolution::new(FieldKey::Phone, ResolutionAction::PushLocalToRemote, None),
                FieldResolution::new(FieldKey::Email, ResolutionAction::Skip, None),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.applied_fields, vec![FieldKey::Address]);
    assert!(matches!(report.push, PushOutcome::Failed { ref code, .. } if code == "remote_transport_error"));
    let reloaded = fx.reload(&ada);
    assert_eq!(reloaded.address.as_deref(), Some("12 St James's Sq"));
    assert_eq!(reloaded.link.unwrap().etag, "e1");

    let updates = fx.directory.state().updates.clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "people/c1");
    assert_eq!(updates[0].1, "e1");
    assert_eq!(updates[0].2.keys().collect::<Vec<_>>(), vec![FieldKey::Phone]);
}

#[tokio::test]
async fn successful_push_refreshes_link_and_cache() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.update_remote("people/c1", |remote| {
        remote.organizations = vec![Organization {
            name: None,
            title: Some("Analyst".to_string()),
        }];
        remote.raw_payload["organizations"] = json!([{ "title": "Analyst", "type": "work" }]);
    });
    fx.cache()
        .upsert_contact(OWNER, &fx.directory.state().contacts["people/c1"].clone())
        .unwrap();
    let mut edited = fx.reload(&ada);
    edited.employer = Some("Analytical Engines".to_string());
    fx.friends().update_friend(&edited).unwrap();

    let report = fx
        .service()
        .apply_resolutions(
            OWNER,
            ada.id,
            &[FieldResolution::new(FieldKey::Employer, ResolutionAction::PushLocalToRemote, None)],
        )
        .await
        .unwrap();

    assert_eq!(
        report.push,
        PushOutcome::Pushed {
            etag: "e1-pushed".to_string()
        }
    );
    let patch = fx.directory.state().updates[0].2.clone();
    assert_eq!(patch.get(FieldKey::Employer), Some("Analytical Engines"));
    assert_eq!(patch.get(FieldKey::Occupation), None);
    let (body, mask) = person_body(&patch, Some("e1"));
    assert_eq!(mask, vec!["organizations"]);
    assert_eq!(
        body["organizations"],
        json!([{ "name": "Analytical Engines", "title": "Analyst", "type": "work" }])
    );
    assert_eq!(fx.reload(&ada).link.unwrap().etag, "e1-pushed");
    let cached = fx.cache().get_contact(OWNER, "people/c1").unwrap().unwrap();
    assert_eq!(cached.etag, "e1-pushed");
}

#[tokio::test]
async fn auto_resolution_applies_only_conflict_free_batches() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    fx.update_remote("people/c1", |remote| {
        remote.etag = "e2".to_string();
        remote.addresses = vec!["12 St James's Sq".to_string()];
    });
    let service = fx.service();

    let outcome = service
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();
    let report = service
        .apply_auto_resolutions(OWNER, ada.id, &outcome.diffs)
        .await
        .unwrap();
    assert_eq!(report.applied_fields, vec![FieldKey::Address]);
    assert_eq!(report.push, PushOutcome::NotRequested);
    assert_eq!(fx.reload(&ada).address.as_deref(), Some("12 St James's Sq"));

    fx.update_remote("people/c1", |remote| {
        remote.etag = "e3".to_string();
        remote.phones = vec!["555-2222".to_string()];
    });
    let outcome = service
        .sync_linked_friend(OWNER, ada.id, SyncOptions::default())
        .await
        .unwrap();
    let err = service
        .apply_auto_resolutions(OWNER, ada.id, &outcome.diffs)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ConflictsNeedReview));
    assert_eq!(fx.reload(&ada).phone.as_deref(), Some("(555) 123-4567"));
}

#[tokio::test]
async fn link_requires_cached_contact_and_a_free_external_id() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    let grace = Friend::new(OWNER, "Grace Hopper");
    fx.friends().create_friend(&grace).unwrap();
    let service = fx.service();

    assert!(matches!(
        service.link(OWNER, grace.id, "people/unknown", "e1"),
        Err(SyncError::ContactNotCached(_))
    ));
    match service.link(OWNER, grace.id, "people/c1", "e1") {
        Err(SyncError::AlreadyLinked { friend_id, .. }) => assert_eq!(friend_id, ada.id),
        other => panic!("unexpected result: {other:?}"),
    }

    fx.cache()
        .upsert_contact(OWNER, &contact("people/c2", "g1", "Grace Hopper"))
        .unwrap();
    let linked = service.link(OWNER, grace.id, "people/c2", "g1").unwrap();
    assert_eq!(linked.external_id(), Some("people/c2"));

    service.unlink(OWNER, grace.id).unwrap();
    assert_eq!(fx.reload(&grace).link, None);
}

#[tokio::test]
async fn export_creates_and_links_a_remote_contact() {
    let fx = Fixture::new();
    let mut grace = Friend::new(OWNER, "Grace Hopper");
    grace.email = Some("grace@example.com".to_string());
    fx.friends().create_friend(&grace).unwrap();
    let service = fx.service();

    let exported = service.export_friend(OWNER, grace.id).await.unwrap();

    let link = exported.link.clone().unwrap();
    assert_eq!(link.external_id, "people/new1");
    assert_eq!(link.etag, "etag-created");
    assert!(exported.last_synced_at.is_some());
    let created = fx.directory.state().created[0].clone();
    assert_eq!(created.get(FieldKey::Name), Some("Grace Hopper"));
    assert_eq!(created.get(FieldKey::Email), Some("grace@example.com"));
    assert!(!created.contains(FieldKey::Phone));
    assert!(fx.cache().get_contact(OWNER, "people/new1").unwrap().is_some());

    assert!(matches!(
        service.export_friend(OWNER, grace.id).await,
        Err(SyncError::FriendAlreadyLinked(_))
    ));
}

#[tokio::test]
async fn disconnect_clears_cache_cursor_and_links() {
    let fx = Fixture::new();
    let ada = fx.linked_ada();
    SqliteSyncCursorRepository::new(&fx.conn)
        .save_cursor(OWNER, Some("sync-1"), 1)
        .unwrap();

    let report = fx.service().disconnect(OWNER).unwrap();

    assert_eq!(report.cleared_contacts, 1);
    assert_eq!(report.unlinked_friends, 1);
    assert_eq!(fx.reload(&ada).link, None);
    assert!(fx
        .cache()
        .list_contacts(OWNER, &CachedContactQuery::default())
        .unwrap()
        .is_empty());
    assert!(SqliteSyncCursorRepository::new(&fx.conn)
        .get_cursor(OWNER)
        .unwrap()
        .is_none());
}
