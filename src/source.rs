//! Narrow interfaces to the booking service.
//!
//! The slot engine never talks to these; callers fetch through them and hand
//! the engine plain slices.

use async_trait::async_trait;

use crate::engine::EngineError;
use crate::model::*;
use crate::requests::{CourtDraft, Decision, NewBlock, NewBooking};

#[derive(Debug)]
pub enum SourceError {
    NotFound { kind: &'static str, id: u64 },
    Conflict(String),
    InvalidTransition { id: BookingId, from: BookingStatus },
    Invalid(EngineError),
    Rejected { status: u16, message: String },
    SessionExpired,
    Network(String),
    Decode(String),
}

impl SourceError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SourceError::NotFound { .. } => "not_found",
            SourceError::Conflict(_) => "conflict",
            SourceError::InvalidTransition { .. } => "invalid_transition",
            SourceError::Invalid(_) => "invalid",
            SourceError::Rejected { .. } => "rejected",
            SourceError::SessionExpired => "session_expired",
            SourceError::Network(_) => "network",
            SourceError::Decode(_) => "decode",
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            SourceError::Conflict(msg) => write!(f, "conflict: {msg}"),
            SourceError::InvalidTransition { id, from } => {
                write!(f, "booking {id} is {from} and can no longer change")
            }
            SourceError::Invalid(e) => write!(f, "invalid request: {e}"),
            SourceError::Rejected { status, message } => {
                write!(f, "server rejected request ({status}): {message}")
            }
            SourceError::SessionExpired => write!(f, "session expired, log in again"),
            SourceError::Network(e) => write!(f, "network error: {e}"),
            SourceError::Decode(e) => write!(f, "unexpected response: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<EngineError> for SourceError {
    fn from(e: EngineError) -> Self {
        SourceError::Invalid(e)
    }
}

#[async_trait]
pub trait CourtSource: Send + Sync {
    async fn courts(&self) -> Result<Vec<Court>, SourceError>;

    async fn court(&self, id: CourtId) -> Result<Option<Court>, SourceError>;
}

#[async_trait]
pub trait BookingSource: Send + Sync {
    /// Every booking of a court, any status.
    async fn court_bookings(&self, court_id: CourtId) -> Result<Vec<Booking>, SourceError>;

    /// Bookings made by the session's user.
    async fn my_bookings(&self) -> Result<Vec<Booking>, SourceError>;

    /// Bookings awaiting an administrator's decision.
    async fn pending_bookings(&self, court_id: CourtId) -> Result<Vec<Booking>, SourceError> {
        let mut bookings = self.court_bookings(court_id).await?;
        bookings.retain(|b| b.status == BookingStatus::Pending);
        Ok(bookings)
    }
}

#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn court_blocks(&self, court_id: CourtId) -> Result<Vec<BlockedTime>, SourceError>;
}

/// State-changing operations.
#[async_trait]
pub trait BookingDesk: Send + Sync {
    async fn create_booking(&self, req: NewBooking) -> Result<Booking, SourceError>;

    async fn cancel_booking(&self, id: BookingId) -> Result<Booking, SourceError>;

    async fn decide_booking(&self, id: BookingId, decision: Decision) -> Result<Booking, SourceError>;

    async fn create_court(&self, draft: CourtDraft) -> Result<Court, SourceError>;

    async fn update_court(&self, id: CourtId, draft: CourtDraft) -> Result<Court, SourceError>;

    async fn delete_court(&self, id: CourtId) -> Result<(), SourceError>;

    async fn create_block(&self, req: NewBlock) -> Result<BlockedTime, SourceError>;

    async fn delete_block(&self, id: BlockId) -> Result<(), SourceError>;
}
