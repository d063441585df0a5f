//! Notification dispatch, duplicate suppression and retries.
//!
//! `NotificationDispatcher::dispatch` is the single entry point for sending.
//! It normalizes the phone, checks for recent duplicates, composes the text,
//! calls the gateway and writes exactly one audit record, whatever happens.
//! `RetryCoordinator` re-issues failed attempts through the same path.

mod dedup;
mod dispatcher;
mod retry;
mod types;

pub use dedup::{DedupDecision, DedupGuard};
pub use dispatcher::{
    DispatchError, DispatcherConfig, DispatcherStats, DispatcherStatsSnapshot,
    NotificationDispatcher,
};
pub use retry::{BatchRetryReport, RetryCoordinator, RetryError};
pub use types::{
    DispatchRequest, MessageBody, MessageType, Recipient, TestScore, UnknownMessageType,
};
