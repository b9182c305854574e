use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::persist::PersistError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials for account {account}")]
    InvalidCredentials { account: String },
    #[error("login timed out")]
    Timeout,
    #[error("unexpected login response: {0}")]
    UnexpectedResponse(String),
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("page request timed out")]
    Timeout,
    #[error("session is no longer valid")]
    SessionInvalidated,
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed store row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Messenger failures, classified by what the dispatcher should do next.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("rate limited by the platform")]
    RateLimited,
    #[error("transient send failure: {0}")]
    Transient(String),
    #[error("permanent send failure: {0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("bad share configuration: {0}")]
    Shares(#[from] outreach_core::DistributeError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Why a dispatch run stopped before exhausting its contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every assigned contact was handled.
    AudienceExhausted,
    /// The identity's daily quota ran out.
    DailyLimitReached,
    /// The configured working window has no open day.
    WorkingWindowClosed,
    /// Repeated rate limiting; the identity is likely flagged.
    IdentityBlocked,
    /// Cooperative cancellation (ctrl-c).
    Cancelled,
}

/// Shared cancellation flag, set by the signal handler and polled at
/// loop boundaries. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
