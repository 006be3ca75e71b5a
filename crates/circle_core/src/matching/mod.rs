//! Identity matching between local friends and external contacts.
//!
//! # Responsibility
//! - Normalize names and phone numbers for comparison.
//! - Score how likely two identities describe the same person.
//!
//! # Invariants
//! - Scores are bounded to `[0, 1]`; the name component to `[0, 0.5]`.
//! - Ranking is stable: equal scores keep candidate order.

pub mod fuzzy;
pub mod nicknames;

pub use fuzzy::{
    normalize_phone, phones_match, FuzzyMatcher, MatchCandidate, MatchResult, RankedMatch,
    DEFAULT_MATCH_THRESHOLD,
};
pub use nicknames::NicknameTable;
