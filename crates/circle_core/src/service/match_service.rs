//! Entity resolution between cached contacts and local friends.
//!
//! # Responsibility
//! - Propose which unlinked cached contact is which unlinked friend.
//!
//! # Invariants
//! - Contacts already linked to a friend and linked friends are never proposed.
//! - Each contact yields at most one suggestion: its best-scoring friend.
//! - Suggestions are at or above the threshold and sorted by descending
//!   confidence.

use crate::config::MatchConfig;
use crate::matching::{FuzzyMatcher, MatchCandidate, DEFAULT_MATCH_THRESHOLD};
use crate::model::contact::ExternalContact;
use crate::model::field::FieldKey;
use crate::model::friend::{Friend, FriendId};
use crate::repo::contact_cache_repo::{CachedContactQuery, ContactCacheRepository};
use crate::repo::friend_repo::{FriendListQuery, FriendRepository, LinkFilter};
use crate::repo::RepoResult;
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

/// Proposed link between one cached contact and one friend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSuggestion {
    pub external_id: String,
    pub display_name: Option<String>,
    pub etag: String,
    pub friend_id: FriendId,
    pub friend_name: String,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Read-only suggestion service over the friend store and contact cache.
pub struct MatchService<F: FriendRepository, C: ContactCacheRepository> {
    friends: F,
    cache: C,
    matcher: FuzzyMatcher,
    threshold: f64,
}

impl<F: FriendRepository, C: ContactCacheRepository> MatchService<F, C> {
    pub fn new(friends: F, cache: C) -> Self {
        Self {
            friends,
            cache,
            matcher: FuzzyMatcher::default(),
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_config(mut self, config: &MatchConfig) -> Self {
        self.threshold = config.suggestion_threshold;
        self
    }

    pub fn matcher(&self) -> &FuzzyMatcher {
        &self.matcher
    }

    /// Ranks every unlinked cached contact against every unlinked friend.
    pub fn find_suggested_matches(&self, owner_id: &str) -> RepoResult<Vec<MatchSuggestion>> {
        let started_at = Instant::now();
        let all_friends = self.friends.list_friends(owner_id, &FriendListQuery::default())?;
        let linked_ids: HashSet<&str> = all_friends
            .iter()
            .filter_map(Friend::external_id)
            .collect();
        let unlinked_friends: Vec<&Friend> = all_friends
            .iter()
            .filter(|friend| !friend.is_linked())
            .collect();

        let contacts = self
            .cache
            .list_contacts(owner_id, &CachedContactQuery::default())?;
        let unlinked_contacts: Vec<&ExternalContact> = contacts
            .iter()
            .filter(|contact| !linked_ids.contains(contact.external_id.as_str()))
            .collect();

        let suggestions = rank_suggestions(
            &self.matcher,
            &unlinked_contacts,
            &unlinked_friends,
            self.threshold,
        );
        info!(
            "event=suggest_matches module=match status=ok duration_ms={} contacts={} friends={} suggestions={}",
            started_at.elapsed().as_millis(),
            unlinked_contacts.len(),
            unlinked_friends.len(),
            suggestions.len()
        );
        Ok(suggestions)
    }

    /// Friends of `owner_id` that are not yet linked, matching the filter
    /// used for suggestions.
    pub fn unlinked_friends(&self, owner_id: &str) -> RepoResult<Vec<Friend>> {
        self.friends.list_friends(
            owner_id,
            &FriendListQuery {
                link: LinkFilter::Unlinked,
            },
        )
    }
}

/// Scores every contact against every friend and keeps each contact's best
/// match when it reaches `threshold`.
///
/// Cost is `contacts x friends` scorings.
pub fn rank_suggestions(
    matcher: &FuzzyMatcher,
    contacts: &[&ExternalContact],
    friends: &[&Friend],
    threshold: f64,
) -> Vec<MatchSuggestion> {
    if friends.is_empty() {
        return Vec::new();
    }
    let friend_candidates: Vec<(usize, MatchCandidate)> = friends
        .iter()
        .enumerate()
        .map(|(index, friend)| (index, friend_candidate(friend)))
        .collect();

    let mut suggestions: Vec<MatchSuggestion> = contacts
        .iter()
        .filter_map(|contact| {
            let target = contact_candidate(contact);
            let best = matcher
                .find_matches_for_friend(&target, &friend_candidates, threshold)
                .into_iter()
                .next()?;
            let friend = friends[best.key];
            Some(MatchSuggestion {
                external_id: contact.external_id.clone(),
                display_name: contact.display_name.clone(),
                etag: contact.etag.clone(),
                friend_id: friend.id,
                friend_name: friend.name.clone(),
                confidence: best.result.confidence,
                reasons: best.result.reasons,
            })
        })
        .collect();
    suggestions.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));
    suggestions
}

fn friend_candidate(friend: &Friend) -> MatchCandidate {
    MatchCandidate {
        name: friend.name.clone(),
        email: friend.email.clone(),
        phone: friend.phone.clone(),
    }
}

fn contact_candidate(contact: &ExternalContact) -> MatchCandidate {
    MatchCandidate {
        name: contact.display_name.clone().unwrap_or_default(),
        email: contact.primary_value(FieldKey::Email).map(str::to_string),
        phone: contact.primary_value(FieldKey::Phone).map(str::to_string),
    }
}
