//! In-process booking service: every source trait over shared memory.
//!
//! Mirrors what the REST backend enforces (booking conflicts, status
//! transitions, cascading court deletion) so planners and tests can run
//! without a server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::RwLock;
use tracing::info;

use crate::clock::format_hhmm;
use crate::engine::{self, EngineError};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::requests::{CourtDraft, Decision, NewBlock, NewBooking};
use crate::source::*;

/// One court with everything booked or blocked on it.
#[derive(Debug, Clone)]
pub struct CourtState {
    pub court: Court,
    pub bookings: Vec<Booking>,
    pub blocks: Vec<BlockedTime>,
}

pub type SharedCourtState = Arc<RwLock<CourtState>>;

pub struct InMemoryBackend {
    courts: DashMap<CourtId, SharedCourtState>,
    /// Reverse lookup: booking/block id → court id
    entity_to_court: DashMap<u64, CourtId>,
    /// Bookings created through this backend, i.e. by the session user.
    mine: DashSet<BookingId>,
    next_id: AtomicU64,
    pub notify: Arc<NotifyHub>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Arc::new(NotifyHub::new()))
    }
}

impl InMemoryBackend {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            courts: DashMap::new(),
            entity_to_court: DashMap::new(),
            mine: DashSet::new(),
            next_id: AtomicU64::new(1),
            notify,
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn get_court(&self, id: &CourtId) -> Option<SharedCourtState> {
        self.courts.get(id).map(|e| e.value().clone())
    }

    fn court_or_missing(&self, id: CourtId) -> Result<SharedCourtState, SourceError> {
        self.get_court(&id)
            .ok_or(SourceError::NotFound { kind: "court", id })
    }

    /// A court removed while we waited for its lock must not take new entries.
    fn ensure_live(&self, id: CourtId) -> Result<(), SourceError> {
        if self.courts.contains_key(&id) {
            Ok(())
        } else {
            Err(SourceError::NotFound { kind: "court", id })
        }
    }

    /// Lookup entity → court, acquire the court's write lock.
    async fn resolve_entity_write(
        &self,
        kind: &'static str,
        id: u64,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<CourtState>, SourceError> {
        let court_id = self
            .entity_to_court
            .get(&id)
            .map(|e| *e.value())
            .ok_or(SourceError::NotFound { kind, id })?;
        let state = self.court_or_missing(court_id)?;
        Ok(state.write_owned().await)
    }

    pub fn court_count(&self) -> usize {
        self.courts.len()
    }
}

#[async_trait]
impl CourtSource for InMemoryBackend {
    async fn courts(&self) -> Result<Vec<Court>, SourceError> {
        let states: Vec<SharedCourtState> = self.courts.iter().map(|e| e.value().clone()).collect();
        let mut courts = Vec::with_capacity(states.len());
        for state in states {
            courts.push(state.read().await.court.clone());
        }
        courts.sort_by_key(|c| c.id);
        Ok(courts)
    }

    async fn court(&self, id: CourtId) -> Result<Option<Court>, SourceError> {
        match self.get_court(&id) {
            Some(state) => Ok(Some(state.read().await.court.clone())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingSource for InMemoryBackend {
    async fn court_bookings(&self, court_id: CourtId) -> Result<Vec<Booking>, SourceError> {
        let state = self.court_or_missing(court_id)?;
        let guard = state.read().await;
        Ok(guard.bookings.clone())
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, SourceError> {
        let states: Vec<SharedCourtState> = self.courts.iter().map(|e| e.value().clone()).collect();
        let mut mine = Vec::new();
        for state in states {
            let guard = state.read().await;
            mine.extend(guard.bookings.iter().filter(|b| self.mine.contains(&b.id)).cloned());
        }
        mine.sort_by_key(|b| (b.date, b.start_time, b.id));
        Ok(mine)
    }
}

#[async_trait]
impl BlockSource for InMemoryBackend {
    async fn court_blocks(&self, court_id: CourtId) -> Result<Vec<BlockedTime>, SourceError> {
        let state = self.court_or_missing(court_id)?;
        let guard = state.read().await;
        Ok(guard.blocks.clone())
    }
}

#[async_trait]
impl BookingDesk for InMemoryBackend {
    async fn create_booking(&self, req: NewBooking) -> Result<Booking, SourceError> {
        req.validate()?;
        let state = self.court_or_missing(req.court_id)?;
        let mut guard = state.write().await;
        self.ensure_live(req.court_id)?;

        // Bare grid of the operating hours: only range and hours are checked here.
        let grid = engine::compute_slots(Some(&guard.court), Some(req.date), &[], &[]);
        engine::precheck(&grid, req.start_time, req.end_time)?;
        let Some(requested) = req.span() else {
            return Err(EngineError::InvalidRange { start: req.start_time, end: req.end_time }.into());
        };
        let range = format!("{}-{}", format_hhmm(req.start_time), format_hhmm(req.end_time));
        if engine::blocks_on(&guard.blocks, req.date).blocks(&requested) {
            return Err(SourceError::Conflict(format!("{range} is blocked")));
        }
        if engine::reserved_on(&guard.bookings, req.date)
            .iter()
            .any(|span| span.overlaps(&requested))
        {
            return Err(SourceError::Conflict(format!("{range} is already reserved")));
        }
        let booking = Booking {
            id: self.allocate_id(),
            court_id: req.court_id,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            status: BookingStatus::Pending,
            rejection_reason: None,
        };
        guard.bookings.push(booking.clone());
        self.entity_to_court.insert(booking.id, booking.court_id);
        self.mine.insert(booking.id);
        drop(guard);

        info!(booking_id = booking.id, court_id = booking.court_id, "booking created");
        self.notify.send(&Event::BookingCreated { id: booking.id, court_id: booking.court_id });
        Ok(booking)
    }

    async fn cancel_booking(&self, id: BookingId) -> Result<Booking, SourceError> {
        let mut guard = self.resolve_entity_write("booking", id).await?;
        let booking = guard
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(SourceError::NotFound { kind: "booking", id })?;
        if !booking.status.occupies() {
            return Err(SourceError::InvalidTransition { id, from: booking.status });
        }
        booking.status = BookingStatus::Cancelled;
        let booking = booking.clone();
        drop(guard);

        info!(booking_id = id, "booking cancelled");
        self.notify.send(&Event::BookingCancelled { id, court_id: booking.court_id });
        Ok(booking)
    }

    async fn decide_booking(&self, id: BookingId, decision: Decision) -> Result<Booking, SourceError> {
        decision.validate()?;
        let mut guard = self.resolve_entity_write("booking", id).await?;
        let booking = guard
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(SourceError::NotFound { kind: "booking", id })?;
        if booking.status != BookingStatus::Pending {
            return Err(SourceError::InvalidTransition { id, from: booking.status });
        }
        booking.status = decision.status();
        booking.rejection_reason = decision.reason().map(str::to_string);
        let booking = booking.clone();
        drop(guard);

        info!(booking_id = id, status = %booking.status, "booking decided");
        self.notify.send(&Event::BookingDecided {
            id,
            court_id: booking.court_id,
            status: booking.status,
        });
        Ok(booking)
    }

    async fn create_court(&self, draft: CourtDraft) -> Result<Court, SourceError> {
        draft.validate()?;
        let court = draft.into_court(self.allocate_id());
        let state = CourtState {
            court: court.clone(),
            bookings: Vec::new(),
            blocks: Vec::new(),
        };
        self.courts.insert(court.id, Arc::new(RwLock::new(state)));

        info!(court_id = court.id, name = %court.name, "court created");
        self.notify.send(&Event::CourtSaved { id: court.id });
        Ok(court)
    }

    async fn update_court(&self, id: CourtId, draft: CourtDraft) -> Result<Court, SourceError> {
        draft.validate()?;
        let state = self.court_or_missing(id)?;
        let mut guard = state.write().await;
        guard.court = draft.into_court(id);
        let court = guard.court.clone();
        drop(guard);

        self.notify.send(&Event::CourtSaved { id });
        Ok(court)
    }

    async fn delete_court(&self, id: CourtId) -> Result<(), SourceError> {
        let (_, state) = self
            .courts
            .remove(&id)
            .ok_or(SourceError::NotFound { kind: "court", id })?;
        let guard = state.read().await;
        for booking in &guard.bookings {
            self.entity_to_court.remove(&booking.id);
            self.mine.remove(&booking.id);
        }
        for block in &guard.blocks {
            self.entity_to_court.remove(&block.id);
        }
        drop(guard);

        info!(court_id = id, "court deleted");
        self.notify.send(&Event::CourtDeleted { id });
        self.notify.remove(&id);
        Ok(())
    }

    async fn create_block(&self, req: NewBlock) -> Result<BlockedTime, SourceError> {
        req.validate()?;
        let state = self.court_or_missing(req.court_id)?;
        let mut guard = state.write().await;
        self.ensure_live(req.court_id)?;
        let block = req.into_blocked_time(self.allocate_id());
        guard.blocks.push(block.clone());
        self.entity_to_court.insert(block.id, block.court_id);
        drop(guard);

        info!(block_id = block.id, court_id = block.court_id, "block added");
        self.notify.send(&Event::BlockAdded { id: block.id, court_id: block.court_id });
        Ok(block)
    }

    async fn delete_block(&self, id: BlockId) -> Result<(), SourceError> {
        let mut guard = self.resolve_entity_write("block", id).await?;
        let pos = guard
            .blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or(SourceError::NotFound { kind: "block", id })?;
        let block = guard.blocks.remove(pos);
        drop(guard);
        self.entity_to_court.remove(&id);

        self.notify.send(&Event::BlockRemoved { id, court_id: block.court_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::requests::BlockWhen;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-04-02 is a Wednesday
    fn wed() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 2).unwrap()
    }

    fn draft(open: NaiveTime, close: NaiveTime) -> CourtDraft {
        CourtDraft {
            name: "Quadra 1".into(),
            location: "Bloco A".into(),
            description: None,
            open_time: open,
            close_time: close,
        }
    }

    async fn backend_with_court() -> (InMemoryBackend, Court) {
        let backend = InMemoryBackend::default();
        let court = backend.create_court(draft(t(8, 0), t(12, 0))).await.unwrap();
        (backend, court)
    }

    fn book(court: &Court, start: NaiveTime, end: NaiveTime) -> NewBooking {
        NewBooking::new(court.id, wed(), start, end).unwrap()
    }

    #[tokio::test]
    async fn create_and_list_court() {
        let (backend, court) = backend_with_court().await;
        assert_eq!(backend.court_count(), 1);
        assert_eq!(backend.courts().await.unwrap(), vec![court.clone()]);
        assert_eq!(backend.court(court.id).await.unwrap(), Some(court));
        assert_eq!(backend.court(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_court_rejected() {
        let backend = InMemoryBackend::default();
        let err = backend.create_court(draft(t(12, 0), t(8, 0))).await.unwrap_err();
        assert!(matches!(err, SourceError::Invalid(EngineError::InvalidHours { .. })));
    }

    #[tokio::test]
    async fn booking_starts_pending_and_is_mine() {
        let (backend, court) = backend_with_court().await;
        let booking = backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(backend.my_bookings().await.unwrap(), vec![booking.clone()]);
        assert_eq!(backend.pending_bookings(court.id).await.unwrap(), vec![booking]);
    }

    #[tokio::test]
    async fn overlapping_booking_conflicts() {
        let (backend, court) = backend_with_court().await;
        backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        let err = backend.create_booking(book(&court, t(9, 30), t(10, 30))).await.unwrap_err();
        assert!(matches!(err, SourceError::Conflict(_)), "{err}");
    }

    #[tokio::test]
    async fn sub_hour_overlap_conflicts() {
        let (backend, court) = backend_with_court().await;
        backend.create_booking(book(&court, t(10, 0), t(10, 30))).await.unwrap();
        let err = backend.create_booking(book(&court, t(10, 15), t(10, 45))).await.unwrap_err();
        assert!(matches!(err, SourceError::Conflict(_)));
    }

    #[tokio::test]
    async fn adjacent_half_hours_both_fit() {
        let (backend, court) = backend_with_court().await;
        backend.create_booking(book(&court, t(10, 0), t(10, 30))).await.unwrap();
        let second = backend.create_booking(book(&court, t(10, 30), t(11, 0))).await.unwrap();
        assert_eq!(second.status, BookingStatus::Pending);
        assert_eq!(backend.court_bookings(court.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_booking_frees_range() {
        let (backend, court) = backend_with_court().await;
        let first = backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        let cancelled = backend.cancel_booking(first.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();

        let err = backend.cancel_booking(first.id).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn booking_outside_hours_invalid() {
        let (backend, court) = backend_with_court().await;
        let err = backend.create_booking(book(&court, t(11, 0), t(13, 0))).await.unwrap_err();
        assert!(matches!(err, SourceError::Invalid(EngineError::OutsideOperatingHours { .. })));
    }

    #[tokio::test]
    async fn booking_into_block_conflicts() {
        let (backend, court) = backend_with_court().await;
        backend
            .create_block(NewBlock {
                court_id: court.id,
                when: BlockWhen::Weekly(2),
                start_time: Some(t(8, 0)),
                end_time: Some(t(8, 30)),
                reason: "Aula".into(),
            })
            .await
            .unwrap();
        let err = backend.create_booking(book(&court, t(8, 0), t(9, 0))).await.unwrap_err();
        assert!(matches!(err, SourceError::Conflict(_)));

        // The rest of the blocked hour stays bookable.
        backend.create_booking(book(&court, t(8, 30), t(9, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn whole_day_block_conflicts() {
        let (backend, court) = backend_with_court().await;
        backend
            .create_block(NewBlock {
                court_id: court.id,
                when: BlockWhen::OnDate(wed()),
                start_time: None,
                end_time: None,
                reason: "Manutenção".into(),
            })
            .await
            .unwrap();
        let err = backend.create_booking(book(&court, t(11, 0), t(12, 0))).await.unwrap_err();
        assert!(matches!(err, SourceError::Conflict(_)));
    }

    #[tokio::test]
    async fn booking_for_court_deleted_while_waiting() {
        let (backend, court) = backend_with_court().await;
        let backend = Arc::new(backend);
        let state = backend.get_court(&court.id).unwrap();
        let guard = state.write().await;

        let pending = {
            let backend = backend.clone();
            let req = book(&court, t(9, 0), t(10, 0));
            tokio::spawn(async move { backend.create_booking(req).await })
        };
        // Let the booking queue up on the court lock.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        backend.courts.remove(&court.id);
        drop(guard);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, SourceError::NotFound { kind: "court", .. }));
        assert!(backend.entity_to_court.is_empty());
        assert!(backend.mine.is_empty());
    }

    #[tokio::test]
    async fn decide_only_pending() {
        let (backend, court) = backend_with_court().await;
        let booking = backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        let rejected = backend.decide_booking(booking.id, Decision::reject("")).await.unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Booking rejected."));

        let err = backend.decide_booking(booking.id, Decision::Approve).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::InvalidTransition { from: BookingStatus::Rejected, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_ids_not_found() {
        let backend = InMemoryBackend::default();
        assert!(matches!(
            backend.cancel_booking(42).await.unwrap_err(),
            SourceError::NotFound { kind: "booking", id: 42 }
        ));
        assert!(matches!(
            backend.delete_block(42).await.unwrap_err(),
            SourceError::NotFound { kind: "block", .. }
        ));
        assert!(matches!(
            backend.court_bookings(42).await.unwrap_err(),
            SourceError::NotFound { kind: "court", .. }
        ));
    }

    #[tokio::test]
    async fn delete_court_cascades() {
        let (backend, court) = backend_with_court().await;
        let booking = backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        backend.delete_court(court.id).await.unwrap();
        assert!(backend.my_bookings().await.unwrap().is_empty());
        assert!(matches!(
            backend.cancel_booking(booking.id).await.unwrap_err(),
            SourceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn mutations_notify_subscribers() {
        let (backend, court) = backend_with_court().await;
        let mut rx = backend.notify.subscribe(court.id);
        let booking = backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.unwrap();
        backend.decide_booking(booking.id, Decision::Approve).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::BookingCreated { id: booking.id, court_id: court.id }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::BookingDecided {
                id: booking.id,
                court_id: court.id,
                status: BookingStatus::Approved,
            }
        );
    }

    #[tokio::test]
    async fn delete_block_restores_slot() {
        let (backend, court) = backend_with_court().await;
        let block = backend
            .create_block(NewBlock {
                court_id: court.id,
                when: BlockWhen::OnDate(wed()),
                start_time: None,
                end_time: None,
                reason: "Reforma".into(),
            })
            .await
            .unwrap();
        assert!(backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.is_err());
        backend.delete_block(block.id).await.unwrap();
        assert!(backend.court_blocks(court.id).await.unwrap().is_empty());
        assert!(backend.create_booking(book(&court, t(9, 0), t(10, 0))).await.is_ok());
    }
}
