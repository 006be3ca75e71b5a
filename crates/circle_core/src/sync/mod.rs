//! Field diffing and conflict policy between friends and their linked contacts.
//!
//! # Responsibility
//! - Compare a friend with its contact snapshot field by field.
//! - Classify each difference as auto-resolvable or conflicting.
//!
//! Both halves are pure; persistence and remote pushes live in
//! `service::sync_service`.

pub mod field_diff;
pub mod resolution;

pub use field_diff::{
    compute_field_diffs, compute_field_diffs_with, default_field_table, FieldDiff, FieldKind,
    SyncableField,
};
pub use resolution::{
    auto_resolutions, default_action, is_all_non_conflicting, FieldResolution, ResolutionAction,
};
