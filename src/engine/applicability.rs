use chrono::NaiveDate;
use tracing::debug;

use crate::model::*;

use super::summary::merge_overlapping;

/// Blocked time that applies to one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayBlocks {
    pub whole_day: bool,
    /// Disjoint, sorted by start.
    pub windows: Vec<Span>,
}

impl DayBlocks {
    pub fn blocks(&self, slot: &Span) -> bool {
        self.whole_day || self.windows.iter().any(|w| w.overlaps(slot))
    }
}

/// Collect the blocks applicable on `date`: one-off blocks for that day plus
/// weekly blocks for its weekday.
pub fn blocks_on(blocks: &[BlockedTime], date: NaiveDate) -> DayBlocks {
    let mut day = DayBlocks::default();
    for block in blocks.iter().filter(|b| b.applies_on(date)) {
        match block.cover() {
            BlockCover::WholeDay => day.whole_day = true,
            BlockCover::Window(span) => day.windows.push(span),
            BlockCover::Nothing => {
                debug!(block_id = block.id, "ignoring block with empty time range");
            }
        }
    }
    day.windows.sort_by_key(|s| s.start);
    day.windows = merge_overlapping(&day.windows);
    day
}

/// Occupied ranges of the day's PENDING/APPROVED bookings, merged and sorted.
pub fn reserved_on(bookings: &[Booking], date: NaiveDate) -> Vec<Span> {
    let mut spans: Vec<Span> = bookings
        .iter()
        .filter(|b| b.date == date)
        .filter_map(Booking::occupied_span)
        .collect();
    spans.sort_by_key(|s| s.start);
    merge_overlapping(&spans)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-04-02 is a Wednesday
    fn wed() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
    }

    fn windowed(recurring_day: Option<u8>, date: Option<NaiveDate>, start: NaiveTime, end: NaiveTime) -> BlockedTime {
        BlockedTime {
            id: 1,
            court_id: 1,
            date,
            recurring_day,
            start_time: Some(start),
            end_time: Some(end),
            reason: "league".into(),
        }
    }

    fn booking(date: NaiveDate, start: NaiveTime, end: NaiveTime, status: BookingStatus) -> Booking {
        Booking {
            id: 1,
            court_id: 1,
            date,
            start_time: start,
            end_time: end,
            status,
            rejection_reason: None,
        }
    }

    #[test]
    fn blocks_merge_and_sort() {
        let blocks = vec![
            windowed(Some(2), None, t(14, 0), t(15, 0)),
            windowed(None, Some(wed()), t(8, 0), t(9, 30)),
            windowed(Some(2), None, t(9, 0), t(10, 0)),
            windowed(Some(4), None, t(18, 0), t(19, 0)), // Friday
        ];
        let day = blocks_on(&blocks, wed());
        assert!(!day.whole_day);
        assert_eq!(day.windows, vec![Span::new(480, 600), Span::new(840, 900)]);
    }

    #[test]
    fn empty_window_is_ignored() {
        let blocks = vec![windowed(Some(2), None, t(10, 0), t(9, 0))];
        assert_eq!(blocks_on(&blocks, wed()), DayBlocks::default());
    }

    #[test]
    fn reserved_filters_date_and_status() {
        let other_day = NaiveDate::from_ymd_opt(2025, 4, 3).unwrap();
        let bookings = vec![
            booking(wed(), t(9, 0), t(10, 0), BookingStatus::Approved),
            booking(wed(), t(10, 0), t(11, 0), BookingStatus::Pending),
            booking(wed(), t(12, 0), t(13, 0), BookingStatus::Cancelled),
            booking(wed(), t(13, 0), t(14, 0), BookingStatus::Rejected),
            booking(other_day, t(15, 0), t(16, 0), BookingStatus::Approved),
        ];
        // adjacent 9-10 and 10-11 merge into one span
        assert_eq!(reserved_on(&bookings, wed()), vec![Span::new(540, 660)]);
    }
}
