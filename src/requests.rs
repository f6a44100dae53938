//! Validated inputs for the booking desk operations.

use chrono::{NaiveDate, NaiveTime};

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::*;

pub const DEFAULT_REJECTION_REASON: &str = "Booking rejected.";

fn check_range(start: NaiveTime, end: NaiveTime) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidRange { start, end });
    }
    Ok(())
}

fn check_text(value: &str, field: &'static str, max: usize, limit_msg: &'static str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::MissingField(field));
    }
    if value.len() > max {
        return Err(EngineError::LimitExceeded(limit_msg));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl NewBooking {
    pub fn new(
        court_id: CourtId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self, EngineError> {
        let req = Self { court_id, date, start_time, end_time };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        check_range(self.start_time, self.end_time)
    }

    pub fn span(&self) -> Option<Span> {
        Span::between(self.start_time, self.end_time)
    }
}

/// An administrator's verdict on a pending booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

impl Decision {
    /// A blank reason falls back to [`DEFAULT_REJECTION_REASON`].
    pub fn reject(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            DEFAULT_REJECTION_REASON.to_string()
        } else {
            reason
        };
        Decision::Reject { reason }
    }

    pub fn status(&self) -> BookingStatus {
        match self {
            Decision::Approve => BookingStatus::Approved,
            Decision::Reject { .. } => BookingStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Approve => None,
            Decision::Reject { reason } => Some(reason),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(reason) = self.reason() {
            if reason.len() > MAX_REASON_LEN {
                return Err(EngineError::LimitExceeded("rejection reason too long"));
            }
        }
        Ok(())
    }
}

/// Court fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourtDraft {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl CourtDraft {
    pub fn validate(&self) -> Result<(), EngineError> {
        check_text(&self.name, "name", MAX_NAME_LEN, "court name too long")?;
        check_text(&self.location, "location", MAX_LOCATION_LEN, "court location too long")?;
        if let Some(ref desc) = self.description {
            if desc.len() > MAX_DESCRIPTION_LEN {
                return Err(EngineError::LimitExceeded("court description too long"));
            }
        }
        if self.open_time >= self.close_time {
            return Err(EngineError::InvalidHours {
                open: self.open_time,
                close: self.close_time,
            });
        }
        Ok(())
    }

    pub fn into_court(self, id: CourtId) -> Court {
        Court {
            id,
            name: self.name,
            location: self.location,
            description: self.description.filter(|d| !d.trim().is_empty()),
            open_time: self.open_time,
            close_time: self.close_time,
        }
    }
}

/// When a new block applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockWhen {
    OnDate(NaiveDate),
    /// Monday = 0 .. Sunday = 6.
    Weekly(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub court_id: CourtId,
    pub when: BlockWhen,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: String,
}

impl NewBlock {
    pub fn validate(&self) -> Result<(), EngineError> {
        if let BlockWhen::Weekly(day) = self.when
            && day > MAX_WEEKDAY
        {
            return Err(EngineError::InvalidWeekday(day));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            check_range(start, end)?;
        }
        check_text(&self.reason, "reason", MAX_REASON_LEN, "block reason too long")
    }

    pub fn into_blocked_time(self, id: BlockId) -> BlockedTime {
        let (date, recurring_day) = match self.when {
            BlockWhen::OnDate(date) => (Some(date), None),
            BlockWhen::Weekly(day) => (None, Some(day)),
        };
        BlockedTime {
            id,
            court_id: self.court_id,
            date,
            recurring_day,
            start_time: self.start_time,
            end_time: self.end_time,
            reason: self.reason,
        }
    }
}
