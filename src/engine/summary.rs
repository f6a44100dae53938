use chrono::NaiveDate;

use crate::model::*;

/// Non-available slots in grid order.
pub fn unavailable(slots: &[TimeSlot]) -> Vec<TimeSlot> {
    slots.iter().filter(|s| !s.is_available()).copied().collect()
}

/// Maximal runs of available time, as spans.
pub fn free_windows(slots: &[TimeSlot]) -> Vec<Span> {
    let (Some(first), Some(last)) = (slots.first(), slots.last()) else {
        return Vec::new();
    };
    let day = [Span::new(first.span().start, last.span().end)];
    let taken: Vec<Span> = slots
        .iter()
        .filter(|s| !s.is_available())
        .map(TimeSlot::span)
        .collect();
    subtract_intervals(&day, &merge_overlapping(&taken))
}

/// The day's occupying bookings, earliest first.
pub fn bookings_on(bookings: &[Booking], date: NaiveDate) -> Vec<Booking> {
    let mut day: Vec<Booking> = bookings
        .iter()
        .filter(|b| b.date == date && b.status.occupies())
        .cloned()
        .collect();
    day.sort_by_key(|b| (b.start_time, b.id));
    day
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Remove sorted, disjoint `to_remove` spans from sorted `base` spans.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
