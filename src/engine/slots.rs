use chrono::NaiveDate;
use tracing::warn;

use crate::clock::time_from_minutes;
use crate::model::*;

use super::applicability::{blocks_on, reserved_on};

/// Width of one slot.
pub const SLOT_MINUTES: Minutes = 60;

// ── Slot Algorithm ────────────────────────────────────────────────

/// Partition a court's operating hours on `date` into hourly slots.
///
/// The last slot is clipped to closing time. Classification precedence:
/// blocked, then reserved, then available. Both tests use half-open
/// interval overlap, so a block covering only part of a slot still blocks it.
///
/// `bookings` and `blocks` are the court's full lists; entries for other days,
/// inert bookings and malformed blocks are skipped. Missing court or date
/// yields an empty grid.
pub fn compute_slots(
    court: Option<&Court>,
    date: Option<NaiveDate>,
    bookings: &[Booking],
    blocks: &[BlockedTime],
) -> Vec<TimeSlot> {
    let (Some(court), Some(date)) = (court, date) else {
        return Vec::new();
    };
    let Some(day) = court.operating_span() else {
        warn!(
            court_id = court.id,
            "court closes before it opens ({} - {}), no slots",
            court.open_time, court.close_time
        );
        return Vec::new();
    };

    let blocked = blocks_on(blocks, date);
    let reserved = reserved_on(bookings, date);

    let mut slots = Vec::with_capacity((day.duration() as usize).div_ceil(SLOT_MINUTES as usize));
    let mut cursor = day.start;
    while cursor < day.end {
        let span = Span::new(cursor, (cursor + SLOT_MINUTES).min(day.end));
        let status = if blocked.blocks(&span) {
            SlotStatus::Blocked
        } else if reserved.iter().any(|r| r.overlaps(&span)) {
            SlotStatus::Reserved
        } else {
            SlotStatus::Available
        };
        // Both bounds lie inside the operating window, which is inside one day.
        let (Some(start), Some(end)) = (time_from_minutes(span.start), time_from_minutes(span.end))
        else {
            break;
        };
        slots.push(TimeSlot { start, end, status });
        cursor = span.end;
    }
    slots
}
