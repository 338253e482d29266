use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::domain::{
    AgentId, BookingId, BookingSnapshot, CalendarConflict, ConflictId, ConflictKind, PropertyId,
    PropertySnapshot, ScheduleId, ScheduleMetrics, SchedulingPreference, SlotId, SlotStatus,
    TimeSlot, VisitSchedule,
};

/// Error enumeration for scheduling-store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("time slot is no longer available")]
    SlotTaken,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over the scheduling calendar.
///
/// Working hours are read-only here: the engine consumes them but never
/// creates them. `commit_visit` carries the booking path's atomic contract:
/// the implementation must re-check that the slot interval is still free and
/// persist the booked slot together with the schedule, or fail the whole
/// operation with `StoreError::SlotTaken` (retryable by the caller).
pub trait SchedulingStore: Send + Sync {
    fn working_hours(
        &self,
        agent: &AgentId,
        weekday: Weekday,
    ) -> Result<Option<WorkingHoursRecord>, StoreError>;

    fn slots_for_day(&self, agent: &AgentId, date: NaiveDate) -> Result<Vec<TimeSlot>, StoreError>;
    fn insert_slots(&self, slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>, StoreError>;
    fn set_slot_status(
        &self,
        slot: &SlotId,
        status: SlotStatus,
        booking: Option<BookingId>,
    ) -> Result<(), StoreError>;

    fn commit_visit(
        &self,
        slot: TimeSlot,
        schedule: VisitSchedule,
    ) -> Result<VisitSchedule, StoreError>;

    fn schedule(&self, id: &ScheduleId) -> Result<Option<VisitSchedule>, StoreError>;
    fn update_schedule(&self, schedule: VisitSchedule) -> Result<(), StoreError>;
    fn agent_schedules_on(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<Vec<VisitSchedule>, StoreError>;
    fn property_schedules_on(
        &self,
        property: &PropertyId,
        date: NaiveDate,
    ) -> Result<Vec<VisitSchedule>, StoreError>;

    fn insert_conflict(&self, conflict: CalendarConflict) -> Result<CalendarConflict, StoreError>;
    fn conflict(&self, id: &ConflictId) -> Result<Option<CalendarConflict>, StoreError>;
    fn update_conflict(&self, conflict: CalendarConflict) -> Result<(), StoreError>;
    /// Lookup by unordered pair + kind, backing idempotent re-detection.
    fn find_conflict(
        &self,
        first: &ScheduleId,
        second: &ScheduleId,
        kind: ConflictKind,
    ) -> Result<Option<CalendarConflict>, StoreError>;

    fn upsert_metrics(&self, metrics: ScheduleMetrics) -> Result<(), StoreError>;
}

/// Working-hours row as stored. Alias kept separate from the domain type so a
/// persistence adapter can widen it without touching the engine.
pub type WorkingHoursRecord = super::domain::WorkingHours;

/// Error enumeration for external directory lookups. Missing records are
/// `Ok(None)`; transport failures propagate without local retry, since retry
/// policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Materialized lookups into the out-of-scope subsystems (bookings, listings,
/// agent roster). No lazy association probing: every result is a snapshot.
pub trait Directory: Send + Sync {
    fn booking(&self, id: &BookingId) -> Result<Option<BookingSnapshot>, DirectoryError>;
    fn property(&self, id: &PropertyId) -> Result<Option<PropertySnapshot>, DirectoryError>;
    fn active_agents(&self) -> Result<Vec<AgentId>, DirectoryError>;
    fn agent_preferences(
        &self,
        agent: &AgentId,
    ) -> Result<Option<SchedulingPreference>, DirectoryError>;
}

/// Notification payload handed to the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitNotice {
    pub template: String,
    pub recipient: Recipient,
    pub schedule: ScheduleId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Client(String),
    Agent(String),
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget outbound notifications. A failed notification must never
/// roll back a schedule change; the orchestrator logs and moves on.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: VisitNotice) -> Result<(), NotifyError>;
}

/// Sanitized representation of a schedule for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub schedule_id: ScheduleId,
    pub status: &'static str,
    pub agent: AgentId,
    pub property: PropertyId,
    pub date: NaiveDate,
    pub window: super::domain::TimeRange,
    pub algorithm: &'static str,
    pub match_score: u8,
}

impl ScheduleView {
    pub fn from_schedule(schedule: &VisitSchedule) -> Self {
        Self {
            schedule_id: schedule.id.clone(),
            status: schedule.status.label(),
            agent: schedule.agent.clone(),
            property: schedule.property.clone(),
            date: schedule.date,
            window: schedule.window,
            algorithm: schedule.algorithm.label(),
            match_score: schedule.score.total,
        }
    }
}
