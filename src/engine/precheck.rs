use chrono::NaiveTime;

use crate::model::*;

use super::EngineError;

/// Check a requested booking range against a computed slot grid.
///
/// The server stays authoritative; this only catches requests the grid
/// already shows as impossible.
pub fn precheck(slots: &[TimeSlot], start: NaiveTime, end: NaiveTime) -> Result<(), EngineError> {
    let Some(requested) = Span::between(start, end) else {
        return Err(EngineError::InvalidRange { start, end });
    };
    let (Some(first), Some(last)) = (slots.first(), slots.last()) else {
        return Err(EngineError::OutsideOperatingHours { start, end });
    };
    let open = Span::new(first.span().start, last.span().end);
    if !open.contains_span(&requested) {
        return Err(EngineError::OutsideOperatingHours { start, end });
    }
    if let Some(taken) = slots
        .iter()
        .find(|s| !s.is_available() && s.span().overlaps(&requested))
    {
        return Err(EngineError::Unavailable {
            start: taken.start,
            end: taken.end,
            status: taken.status,
        });
    }
    Ok(())
}
