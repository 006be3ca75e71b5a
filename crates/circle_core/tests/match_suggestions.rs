mod common;

use circle_core::db::open_db_in_memory;
use circle_core::{
    ContactCacheRepository, ContactLink, Friend, FriendRepository, MatchConfig, MatchService,
    SqliteContactCacheRepository, SqliteFriendRepository,
};
use common::{contact, OWNER};
use rusqlite::Connection;

fn service(
    conn: &Connection,
) -> MatchService<SqliteFriendRepository<'_>, SqliteContactCacheRepository<'_>> {
    MatchService::new(
        SqliteFriendRepository::new(conn),
        SqliteContactCacheRepository::new(conn),
    )
}

fn seed(conn: &Connection) -> (Friend, Friend, Friend) {
    let friends = SqliteFriendRepository::new(conn);
    let cache = SqliteContactCacheRepository::new(conn);

    let mut ada = Friend::new(OWNER, "Ada Lovelace");
    ada.email = Some("ada@example.com".to_string());
    let grace = Friend::new(OWNER, "Grace Hopper");
    let mut linus = Friend::new(OWNER, "Linus Torvalds");
    linus.link = Some(ContactLink {
        external_id: "people/c3".to_string(),
        etag: "l1".to_string(),
    });
    for friend in [&ada, &grace, &linus] {
        friends.create_friend(friend).unwrap();
    }

    let mut ada_contact = contact("people/c1", "a1", "Ada King");
    ada_contact.emails = vec!["Ada@Example.com".to_string()];
    cache.upsert_contact(OWNER, &ada_contact).unwrap();
    cache
        .upsert_contact(OWNER, &contact("people/c2", "g1", "Grace Hopper"))
        .unwrap();
    cache
        .upsert_contact(OWNER, &contact("people/c3", "l1", "Linus Torvalds"))
        .unwrap();
    cache
        .upsert_contact(OWNER, &contact("people/c4", "x1", "Margaret Hamilton"))
        .unwrap();

    (ada, grace, linus)
}

#[test]
fn suggests_unlinked_pairs_best_first() {
    let conn = open_db_in_memory().unwrap();
    let (ada, grace, _) = seed(&conn);

    let suggestions = service(&conn).find_suggested_matches(OWNER).unwrap();

    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].external_id, "people/c1");
    assert_eq!(suggestions[0].friend_id, ada.id);
    assert_eq!(suggestions[0].confidence, 0.75);
    assert!(!suggestions[0].reasons.is_empty());
    assert_eq!(suggestions[1].external_id, "people/c2");
    assert_eq!(suggestions[1].friend_id, grace.id);
    assert_eq!(suggestions[1].etag, "g1");
}

#[test]
fn linked_contacts_and_friends_are_excluded() {
    let conn = open_db_in_memory().unwrap();
    let (_, _, linus) = seed(&conn);

    let suggestions = service(&conn).find_suggested_matches(OWNER).unwrap();

    assert!(suggestions
        .iter()
        .all(|suggestion| suggestion.external_id != "people/c3"
            && suggestion.friend_id != linus.id));
    let unlinked = service(&conn).unlinked_friends(OWNER).unwrap();
    assert_eq!(unlinked.len(), 2);
    assert!(unlinked.iter().all(|friend| !friend.is_linked()));
}

#[test]
fn configured_threshold_filters_weaker_matches() {
    let conn = open_db_in_memory().unwrap();
    let (ada, _, _) = seed(&conn);

    let strict = service(&conn).with_config(&MatchConfig {
        suggestion_threshold: 0.7,
    });
    let suggestions = strict.find_suggested_matches(OWNER).unwrap();

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].friend_id, ada.id);
}

#[test]
fn other_owners_contacts_are_never_suggested() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    assert!(service(&conn)
        .find_suggested_matches("owner-2")
        .unwrap()
        .is_empty());
}
