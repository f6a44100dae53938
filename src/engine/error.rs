use chrono::NaiveTime;

use crate::clock::format_hhmm;
use crate::model::SlotStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidRange {
        start: NaiveTime,
        end: NaiveTime,
    },
    InvalidHours {
        open: NaiveTime,
        close: NaiveTime,
    },
    OutsideOperatingHours {
        start: NaiveTime,
        end: NaiveTime,
    },
    Unavailable {
        start: NaiveTime,
        end: NaiveTime,
        status: SlotStatus,
    },
    InvalidWeekday(u8),
    MissingField(&'static str),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { start, end } => write!(
                f,
                "end time {} must be after start time {}",
                format_hhmm(*end),
                format_hhmm(*start)
            ),
            EngineError::InvalidHours { open, close } => write!(
                f,
                "closing time {} must be after opening time {}",
                format_hhmm(*close),
                format_hhmm(*open)
            ),
            EngineError::OutsideOperatingHours { start, end } => write!(
                f,
                "{}-{} is outside the court's operating hours",
                format_hhmm(*start),
                format_hhmm(*end)
            ),
            EngineError::Unavailable { start, end, status } => write!(
                f,
                "slot {}-{} is {status}",
                format_hhmm(*start),
                format_hhmm(*end)
            ),
            EngineError::InvalidWeekday(day) => {
                write!(f, "weekday {day} out of range (0 = Monday .. 6 = Sunday)")
            }
            EngineError::MissingField(field) => write!(f, "missing required field: {field}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
