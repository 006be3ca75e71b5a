//! Conflict policy for field diffs.
//!
//! # Invariants
//! - Exactly one empty side resolves automatically toward the filled side.
//! - Two non-empty differing values are a conflict and never auto-resolve.

use crate::model::field::FieldKey;
use crate::sync::field_diff::FieldDiff;
use serde::{Deserialize, Serialize};

/// What to do with one diffed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    /// Write the remote value into the friend.
    UseRemote,
    KeepLocal,
    /// Keep the local value and push it to the directory.
    PushLocalToRemote,
    Skip,
}

impl ResolutionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UseRemote => "use-remote",
            Self::KeepLocal => "keep-local",
            Self::PushLocalToRemote => "push-local-to-remote",
            Self::Skip => "skip",
        }
    }
}

/// Caller decision for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResolution {
    pub field: FieldKey,
    pub action: ResolutionAction,
    /// Value to write for `UseRemote` (usually the diff's remote value or
    /// one of its alternatives). Ignored by the other actions.
    pub value: Option<String>,
}

impl FieldResolution {
    pub fn new(field: FieldKey, action: ResolutionAction, value: Option<&str>) -> Self {
        Self {
            field,
            action,
            value: value.map(str::to_string),
        }
    }
}

/// Default action for one diff, or `None` for a genuine conflict.
pub fn default_action(diff: &FieldDiff) -> Option<ResolutionAction> {
    match (&diff.local_value, &diff.remote_value) {
        (None, Some(_)) => Some(ResolutionAction::UseRemote),
        (Some(_), None) => Some(ResolutionAction::KeepLocal),
        _ => None,
    }
}

/// True when every diff has exactly one empty side.
pub fn is_all_non_conflicting(diffs: &[FieldDiff]) -> bool {
    diffs.iter().all(|diff| default_action(diff).is_some())
}

/// Default resolutions for every non-conflicting diff. Conflicts are omitted.
pub fn auto_resolutions(diffs: &[FieldDiff]) -> Vec<FieldResolution> {
    diffs
        .iter()
        .filter_map(|diff| {
            let action = default_action(diff)?;
            let value = match action {
                ResolutionAction::UseRemote => diff.remote_value.as_deref(),
                _ => diff.local_value.as_deref(),
            };
            Some(FieldResolution::new(diff.field, action, value))
        })
        .collect()
}
