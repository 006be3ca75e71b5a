//! Domain model for friends, cached external contacts and syncable fields.
//!
//! # Invariants
//! - Every friend is identified by a stable `FriendId` scoped to one owner.
//! - External contacts are identified by the directory's opaque resource id.
//! - Timestamps are unix epoch milliseconds.

pub mod birthday;
pub mod contact;
pub mod field;
pub mod friend;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
