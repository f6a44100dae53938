//! Booking-form adapter: fetch a court's day, run the slot engine, keep the
//! latest result.
//!
//! Fetches for an older selection can finish after a newer one; those results
//! are dropped (last selection wins).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{self, EngineError};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::source::{BlockSource, BookingSource, CourtSource, SourceError};

#[derive(Debug)]
pub enum PlannerError {
    Source(SourceError),
    CourtNotFound(CourtId),
    Superseded,
    NothingSelected,
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerError::Source(e) => write!(f, "{e}"),
            PlannerError::CourtNotFound(id) => write!(f, "court not found: {id}"),
            PlannerError::Superseded => write!(f, "selection superseded by a newer one"),
            PlannerError::NothingSelected => write!(f, "no court and date selected"),
        }
    }
}

impl std::error::Error for PlannerError {}

impl From<SourceError> for PlannerError {
    fn from(e: SourceError) -> Self {
        PlannerError::Source(e)
    }
}

/// Everything the booking form shows for one court and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub court: Court,
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    /// Occupying bookings of the day, earliest first.
    pub bookings: Vec<Booking>,
}

impl DayView {
    pub fn unavailable(&self) -> Vec<TimeSlot> {
        engine::unavailable(&self.slots)
    }

    pub fn free_windows(&self) -> Vec<Span> {
        engine::free_windows(&self.slots)
    }

    pub fn precheck(&self, start: NaiveTime, end: NaiveTime) -> Result<(), EngineError> {
        engine::precheck(&self.slots, start, end)
    }
}

pub struct DayPlanner {
    courts: Arc<dyn CourtSource>,
    bookings: Arc<dyn BookingSource>,
    blocks: Arc<dyn BlockSource>,
    generation: AtomicU64,
    selection: RwLock<Option<(CourtId, NaiveDate)>>,
    current: RwLock<Option<Arc<DayView>>>,
}

impl DayPlanner {
    pub fn new(
        courts: Arc<dyn CourtSource>,
        bookings: Arc<dyn BookingSource>,
        blocks: Arc<dyn BlockSource>,
    ) -> Self {
        Self {
            courts,
            bookings,
            blocks,
            generation: AtomicU64::new(0),
            selection: RwLock::new(None),
            current: RwLock::new(None),
        }
    }

    /// Build a planner over one backend that implements every source.
    pub fn over<B>(backend: Arc<B>) -> Self
    where
        B: CourtSource + BookingSource + BlockSource + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend)
    }

    /// Select a court and day, and load it.
    pub async fn select(&self, court_id: CourtId, date: NaiveDate) -> Result<Arc<DayView>, PlannerError> {
        let generation = {
            let mut selection = self.selection.write().await;
            *selection = Some((court_id, date));
            self.next_generation()
        };
        self.load(generation, court_id, date).await
    }

    /// Reload the current selection.
    pub async fn refresh(&self) -> Result<Arc<DayView>, PlannerError> {
        let (generation, court_id, date) = {
            let selection = self.selection.write().await;
            let Some((court_id, date)) = *selection else {
                return Err(PlannerError::NothingSelected);
            };
            (self.next_generation(), court_id, date)
        };
        self.load(generation, court_id, date).await
    }

    /// Drop the selection; in-flight loads will be discarded.
    pub async fn clear(&self) {
        {
            let mut selection = self.selection.write().await;
            *selection = None;
            self.next_generation();
        }
        *self.current.write().await = None;
    }

    /// Only called with the selection write lock held, so a generation always
    /// belongs to the selection written alongside it.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn selection(&self) -> Option<(CourtId, NaiveDate)> {
        *self.selection.read().await
    }

    pub async fn current(&self) -> Option<Arc<DayView>> {
        self.current.read().await.clone()
    }

    async fn load(&self, generation: u64, court_id: CourtId, date: NaiveDate) -> Result<Arc<DayView>, PlannerError> {
        let started = Instant::now();
        let fetched = futures::future::try_join3(
            self.courts.court(court_id),
            self.bookings.court_bookings(court_id),
            self.blocks.court_blocks(court_id),
        )
        .await;
        let (court, bookings, blocks) = match fetched {
            Ok(parts) => parts,
            Err(SourceError::NotFound { kind: "court", .. }) => {
                return Err(PlannerError::CourtNotFound(court_id));
            }
            Err(e) => return Err(e.into()),
        };
        let court = court.ok_or(PlannerError::CourtNotFound(court_id))?;

        let slots = engine::compute_slots(Some(&court), Some(date), &bookings, &blocks);
        for slot in &slots {
            metrics::counter!(observability::SLOTS_TOTAL, "status" => slot.status.as_str()).increment(1);
        }
        let view = Arc::new(DayView {
            bookings: engine::bookings_on(&bookings, date),
            court,
            date,
            slots,
        });

        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(court_id, %date, "discarding superseded day view");
            metrics::counter!(observability::SUPERSEDED_TOTAL).increment(1);
            return Err(PlannerError::Superseded);
        }
        *current = Some(view.clone());
        drop(current);

        metrics::counter!(observability::DAY_VIEWS_TOTAL).increment(1);
        metrics::histogram!(observability::DAY_VIEW_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(view)
    }
}

/// Background task that reloads the planner whenever the court changes.
pub fn spawn_follower(planner: Arc<DayPlanner>, hub: &NotifyHub, court_id: CourtId) -> JoinHandle<()> {
    let mut rx = hub.subscribe(court_id);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(?event, "court changed"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "follower lagged"),
                Err(RecvError::Closed) => break,
            }
            let selected = planner.selection().await.map(|(id, _)| id);
            if selected != Some(court_id) {
                continue;
            }
            match planner.refresh().await {
                Ok(view) => info!(court_id, date = %view.date, "day view refreshed"),
                Err(e) => debug!("follower refresh skipped: {e}"),
            }
        }
    })
}
