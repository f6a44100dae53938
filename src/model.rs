use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::clock;

/// Minutes since local midnight. The engine works only in this unit.
pub type Minutes = i64;

pub type CourtId = u64;
pub type BookingId = u64;
pub type BlockId = u64;

/// Half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Build a span from two times of day. `None` when the range is empty or inverted.
    pub fn between(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        let (start, end) = (clock::minutes_of(start), clock::minutes_of(end));
        (start < end).then(|| Self::new(start, end))
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl Court {
    /// Operating window of a day, or `None` when the hours are inverted.
    pub fn operating_span(&self) -> Option<Span> {
        Span::between(self.open_time, self.close_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    /// Whether a booking in this status holds its time range.
    pub fn occupies(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub rejection_reason: Option<String>,
}

impl Booking {
    /// `None` for bookings that do not hold their range (inert status or empty range).
    pub fn occupied_span(&self) -> Option<Span> {
        if !self.status.occupies() {
            return None;
        }
        Span::between(self.start_time, self.end_time)
    }
}

/// An administrative exclusion window.
///
/// Exactly one of `date` / `recurring_day` is expected; records carrying
/// neither never apply. `recurring_day` counts Monday as 0 through Sunday as 6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTime {
    pub id: BlockId,
    pub court_id: CourtId,
    pub date: Option<NaiveDate>,
    pub recurring_day: Option<u8>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: String,
}

/// What part of the day a block removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCover {
    WholeDay,
    Window(Span),
    Nothing,
}

impl BlockedTime {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        let same_day = self.date == Some(date);
        let same_weekday = self.recurring_day == Some(clock::monday_index(date));
        same_day || same_weekday
    }

    /// A block missing either bound covers the whole operating day.
    pub fn cover(&self) -> BlockCover {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => match Span::between(start, end) {
                Some(span) => BlockCover::Window(span),
                None => BlockCover::Nothing,
            },
            _ => BlockCover::WholeDay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Blocked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subdivision of a court's day. Serialized with `HH:MM` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    #[serde(with = "clock::hhmm")]
    pub start: NaiveTime,
    #[serde(with = "clock::hhmm")]
    pub end: NaiveTime,
    pub status: SlotStatus,
}

impl TimeSlot {
    pub fn span(&self) -> Span {
        Span::new(clock::minutes_of(self.start), clock::minutes_of(self.end))
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{} {}",
            clock::format_hhmm(self.start),
            clock::format_hhmm(self.end),
            self.status
        )
    }
}

/// Change notifications, broadcast per court.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CourtSaved { id: CourtId },
    CourtDeleted { id: CourtId },
    BookingCreated { id: BookingId, court_id: CourtId },
    BookingCancelled { id: BookingId, court_id: CourtId },
    BookingDecided { id: BookingId, court_id: CourtId, status: BookingStatus },
    BlockAdded { id: BlockId, court_id: CourtId },
    BlockRemoved { id: BlockId, court_id: CourtId },
}

impl Event {
    pub fn court_id(&self) -> CourtId {
        match self {
            Event::CourtSaved { id } | Event::CourtDeleted { id } => *id,
            Event::BookingCreated { court_id, .. }
            | Event::BookingCancelled { court_id, .. }
            | Event::BookingDecided { court_id, .. }
            | Event::BlockAdded { court_id, .. }
            | Event::BlockRemoved { court_id, .. } => *court_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn block(date: Option<NaiveDate>, recurring_day: Option<u8>) -> BlockedTime {
        BlockedTime {
            id: 1,
            court_id: 1,
            date,
            recurring_day,
            start_time: None,
            end_time: None,
            reason: "maintenance".into(),
        }
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert_eq!(a.duration(), 100);
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(100, 400);
        assert!(outer.contains_span(&Span::new(150, 300)));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&Span::new(50, 200)));
    }

    #[test]
    fn span_between_rejects_inverted() {
        assert_eq!(Span::between(t(9, 0), t(10, 30)), Some(Span::new(540, 630)));
        assert_eq!(Span::between(t(10, 0), t(10, 0)), None);
        assert_eq!(Span::between(t(11, 0), t(10, 0)), None);
    }

    #[test]
    fn only_pending_and_approved_occupy() {
        assert!(BookingStatus::Pending.occupies());
        assert!(BookingStatus::Approved.occupies());
        assert!(!BookingStatus::Rejected.occupies());
        assert!(!BookingStatus::Cancelled.occupies());
    }

    #[test]
    fn cancelled_booking_has_no_span() {
        let mut b = Booking {
            id: 1,
            court_id: 1,
            date: d(2025, 4, 2),
            start_time: t(9, 0),
            end_time: t(10, 0),
            status: BookingStatus::Approved,
            rejection_reason: None,
        };
        assert_eq!(b.occupied_span(), Some(Span::new(540, 600)));
        b.status = BookingStatus::Cancelled;
        assert_eq!(b.occupied_span(), None);
    }

    #[test]
    fn block_applicability() {
        // 2025-04-02 is a Wednesday
        let wed = d(2025, 4, 2);
        assert!(block(Some(wed), None).applies_on(wed));
        assert!(!block(Some(d(2025, 4, 3)), None).applies_on(wed));
        assert!(block(None, Some(2)).applies_on(wed));
        assert!(!block(None, Some(3)).applies_on(wed));
        assert!(!block(None, None).applies_on(wed));
        assert!(!block(None, Some(9)).applies_on(wed));
    }

    #[test]
    fn block_with_date_and_weekday_matches_either() {
        let wed = d(2025, 4, 2);
        // date matches, weekday (Thursday) does not
        assert!(block(Some(wed), Some(3)).applies_on(wed));
        // weekday matches, date (a week later) does not
        assert!(block(Some(d(2025, 4, 9)), Some(2)).applies_on(wed));
        assert!(!block(Some(d(2025, 4, 9)), Some(3)).applies_on(wed));
    }

    #[test]
    fn block_cover() {
        let mut b = block(None, Some(0));
        assert_eq!(b.cover(), BlockCover::WholeDay);
        b.start_time = Some(t(8, 0));
        assert_eq!(b.cover(), BlockCover::WholeDay); // missing end
        b.end_time = Some(t(8, 30));
        assert_eq!(b.cover(), BlockCover::Window(Span::new(480, 510)));
        b.end_time = Some(t(7, 0));
        assert_eq!(b.cover(), BlockCover::Nothing);
    }

    #[test]
    fn slot_serializes_as_hhmm() {
        let slot = TimeSlot {
            start: t(8, 0),
            end: t(9, 0),
            status: SlotStatus::Blocked,
        };
        let json = serde_json::to_value(slot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": "08:00", "end": "09:00", "status": "blocked"})
        );
        assert_eq!(slot.to_string(), "08:00-09:00 blocked");
    }

    #[test]
    fn status_wire_names() {
        let s: BookingStatus = serde_json::from_str("\"APPROVED\"").unwrap();
        assert_eq!(s, BookingStatus::Approved);
        assert_eq!(serde_json::to_string(&BookingStatus::Cancelled).unwrap(), "\"CANCELLED\"");
    }
}
