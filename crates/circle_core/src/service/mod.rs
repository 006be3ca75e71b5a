//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate directory, cache and friend-store calls into use-case APIs.
//! - Keep CLI and embedding layers decoupled from storage details.

pub mod match_service;
pub mod sync_service;

pub use match_service::{rank_suggestions, MatchService, MatchSuggestion};
pub use sync_service::{
    ApplyReport, BulkSyncReport, DisconnectReport, PushOutcome, SyncError, SyncErrorEntry,
    SyncOptions, SyncOutcome, SyncReason, SyncService, SyncStatus,
};
