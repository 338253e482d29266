use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde_json::Value;

use crate::config::SchedulerConfig;
use crate::scheduling::domain::{
    AgentId, BookingId, BookingSnapshot, CalendarConflict, ClientAvailability, ClientId,
    ConflictId, ConflictKind, GeoPoint, PropertyCategory, PropertyId, PropertySnapshot,
    RouteOptimizationMode, ScheduleId, ScheduleMetrics, SchedulingPreference, SlotId, SlotStatus,
    TimeOfDay, TimeRange, TimeSlot, VisitPriority, VisitSchedule, WorkingHours,
};
use crate::scheduling::repository::{
    Directory, DirectoryError, Notifier, NotifyError, SchedulingStore, StoreError, VisitNotice,
    WorkingHoursRecord,
};
use crate::scheduling::service::SchedulingOrchestrator;

pub(super) fn range(start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> TimeRange {
    TimeRange {
        start: NaiveTime::from_hms_opt(start_hour, start_min, 0).expect("valid time"),
        end: NaiveTime::from_hms_opt(end_hour, end_min, 0).expect("valid time"),
    }
}

/// A Monday, so the default working-hours fixture covers it.
pub(super) fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 7).expect("valid date")
}

pub(super) fn agent_a() -> AgentId {
    AgentId("agent-a".to_string())
}

pub(super) fn agent_b() -> AgentId {
    AgentId("agent-b".to_string())
}

pub(super) fn workday(agent: &AgentId, weekday: Weekday) -> WorkingHours {
    WorkingHours {
        agent: agent.clone(),
        weekday,
        hours: range(9, 0, 17, 0),
        break_time: None,
        is_working: true,
    }
}

pub(super) fn availability() -> ClientAvailability {
    ClientAvailability {
        preferred_date: monday(),
        preferred_time: TimeOfDay::Morning,
        preferred_duration_minutes: 60,
        urgency: VisitPriority::Normal,
        budget_max: Some(1500),
    }
}

pub(super) fn property() -> PropertySnapshot {
    PropertySnapshot {
        id: PropertyId("prop-1".to_string()),
        title: "Two-room apartment, Rue des Martyrs".to_string(),
        category: PropertyCategory::Apartment,
        price: Some(1200),
        area: Some("Paris 9e".to_string()),
        location: Some(GeoPoint {
            latitude: 48.8790,
            longitude: 2.3400,
        }),
    }
}

pub(super) fn booking() -> BookingSnapshot {
    BookingSnapshot {
        id: BookingId("booking-1".to_string()),
        client: ClientId("client-1".to_string()),
        property: PropertyId("prop-1".to_string()),
    }
}

pub(super) fn preferences(agent: &AgentId) -> SchedulingPreference {
    SchedulingPreference {
        agent: agent.clone(),
        route_optimization: RouteOptimizationMode::Distance,
        max_daily_visits: 8,
        min_break_minutes: 15,
        travel_buffer_minutes: 10,
        working_radius_km: Some(20.0),
        preferred_areas: vec!["Paris 9e".to_string()],
        preferred_categories: vec![PropertyCategory::Apartment],
        base_location: Some(GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        }),
    }
}

pub(super) fn schedule_fixture(
    id: &str,
    agent: &AgentId,
    property: &str,
    window: TimeRange,
    status: crate::scheduling::domain::VisitStatus,
) -> VisitSchedule {
    VisitSchedule {
        id: ScheduleId(id.to_string()),
        client: ClientId("client-1".to_string()),
        agent: agent.clone(),
        property: PropertyId(property.to_string()),
        booking: BookingId(format!("booking-{id}")),
        slot: SlotId(format!("slot-{id}")),
        date: monday(),
        window,
        algorithm: crate::scheduling::domain::MatchAlgorithm::FirstAvailable,
        score: crate::scheduling::domain::MatchScore::first_available(),
        priority: VisitPriority::Normal,
        status,
        travel_minutes: None,
        distance_km: None,
        confirmation: None,
        notes: Vec::new(),
    }
}

#[derive(Default)]
struct StoreInner {
    working_hours: HashMap<(AgentId, Weekday), WorkingHoursRecord>,
    slots: Vec<TimeSlot>,
    schedules: HashMap<ScheduleId, VisitSchedule>,
    conflicts: HashMap<ConflictId, CalendarConflict>,
    metrics: Vec<ScheduleMetrics>,
}

/// In-memory store mirroring the persistence contract, single mutex so
/// `commit_visit` re-checks and writes under one lock.
#[derive(Default)]
pub(super) struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub(super) fn add_working_hours(&self, hours: WorkingHours) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .working_hours
            .insert((hours.agent.clone(), hours.weekday), hours);
    }

    pub(super) fn add_workweek(&self, agent: &AgentId) {
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            self.add_working_hours(workday(agent, weekday));
        }
    }

    pub(super) fn all_slots(&self) -> Vec<TimeSlot> {
        self.inner.lock().expect("store mutex poisoned").slots.clone()
    }

    pub(super) fn slot(&self, id: &SlotId) -> Option<TimeSlot> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .slots
            .iter()
            .find(|slot| &slot.id == id)
            .cloned()
    }

    pub(super) fn all_conflicts(&self) -> Vec<CalendarConflict> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .conflicts
            .values()
            .cloned()
            .collect()
    }

    /// Inserts a schedule without going through `commit_visit`, for staging
    /// states the booking path would refuse to create.
    pub(super) fn seed_schedule(&self, schedule: VisitSchedule) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.schedules.insert(schedule.id.clone(), schedule);
    }

    pub(super) fn metrics_rows(&self) -> Vec<ScheduleMetrics> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .metrics
            .clone()
    }
}

impl SchedulingStore for MemoryStore {
    fn working_hours(
        &self,
        agent: &AgentId,
        weekday: Weekday,
    ) -> Result<Option<WorkingHoursRecord>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.working_hours.get(&(agent.clone(), weekday)).cloned())
    }

    fn slots_for_day(&self, agent: &AgentId, date: NaiveDate) -> Result<Vec<TimeSlot>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .slots
            .iter()
            .filter(|slot| &slot.agent == agent && slot.date == date)
            .cloned()
            .collect())
    }

    fn insert_slots(&self, slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.slots.extend(slots.iter().cloned());
        Ok(slots)
    }

    fn set_slot_status(
        &self,
        slot: &SlotId,
        status: SlotStatus,
        booking: Option<BookingId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let found = inner
            .slots
            .iter_mut()
            .find(|candidate| &candidate.id == slot)
            .ok_or(StoreError::NotFound)?;
        found.status = status;
        found.booking = booking;
        Ok(())
    }

    fn commit_visit(
        &self,
        slot: TimeSlot,
        schedule: VisitSchedule,
    ) -> Result<VisitSchedule, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let taken = inner.slots.iter().any(|existing| {
            existing.agent == slot.agent
                && existing.date == slot.date
                && existing.status.occupies_calendar()
                && existing.window.overlaps(&slot.window)
        });
        if taken {
            return Err(StoreError::SlotTaken);
        }
        inner.slots.push(slot);
        inner.schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(schedule)
    }

    fn schedule(&self, id: &ScheduleId) -> Result<Option<VisitSchedule>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.schedules.get(id).cloned())
    }

    fn update_schedule(&self, schedule: VisitSchedule) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if !inner.schedules.contains_key(&schedule.id) {
            return Err(StoreError::NotFound);
        }
        inner.schedules.insert(schedule.id.clone(), schedule);
        Ok(())
    }

    fn agent_schedules_on(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<Vec<VisitSchedule>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .schedules
            .values()
            .filter(|schedule| &schedule.agent == agent && schedule.date == date)
            .cloned()
            .collect())
    }

    fn property_schedules_on(
        &self,
        property: &PropertyId,
        date: NaiveDate,
    ) -> Result<Vec<VisitSchedule>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .schedules
            .values()
            .filter(|schedule| &schedule.property == property && schedule.date == date)
            .cloned()
            .collect())
    }

    fn insert_conflict(&self, conflict: CalendarConflict) -> Result<CalendarConflict, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.conflicts.contains_key(&conflict.id) {
            return Err(StoreError::Conflict);
        }
        inner.conflicts.insert(conflict.id.clone(), conflict.clone());
        Ok(conflict)
    }

    fn conflict(&self, id: &ConflictId) -> Result<Option<CalendarConflict>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.conflicts.get(id).cloned())
    }

    fn update_conflict(&self, conflict: CalendarConflict) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if !inner.conflicts.contains_key(&conflict.id) {
            return Err(StoreError::NotFound);
        }
        inner.conflicts.insert(conflict.id.clone(), conflict);
        Ok(())
    }

    fn find_conflict(
        &self,
        first: &ScheduleId,
        second: &ScheduleId,
        kind: ConflictKind,
    ) -> Result<Option<CalendarConflict>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .conflicts
            .values()
            .find(|conflict| {
                conflict.kind == kind
                    && ((&conflict.first == first && &conflict.second == second)
                        || (&conflict.first == second && &conflict.second == first))
            })
            .cloned())
    }

    fn upsert_metrics(&self, metrics: ScheduleMetrics) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .metrics
            .retain(|row| !(row.agent == metrics.agent && row.date == metrics.date));
        inner.metrics.push(metrics);
        Ok(())
    }
}

/// In-memory directory over the out-of-scope subsystems.
#[derive(Default, Clone)]
pub(super) struct MemoryDirectory {
    pub(super) bookings: HashMap<BookingId, BookingSnapshot>,
    pub(super) properties: HashMap<PropertyId, PropertySnapshot>,
    pub(super) agents: Vec<AgentId>,
    pub(super) preferences: HashMap<AgentId, SchedulingPreference>,
}

impl MemoryDirectory {
    pub(super) fn with_booking(mut self, booking: BookingSnapshot) -> Self {
        self.bookings.insert(booking.id.clone(), booking);
        self
    }

    pub(super) fn with_property(mut self, property: PropertySnapshot) -> Self {
        self.properties.insert(property.id.clone(), property);
        self
    }

    pub(super) fn with_agent(mut self, agent: AgentId) -> Self {
        self.agents.push(agent);
        self
    }

    pub(super) fn with_preferences(mut self, preferences: SchedulingPreference) -> Self {
        self.preferences
            .insert(preferences.agent.clone(), preferences);
        self
    }
}

impl Directory for MemoryDirectory {
    fn booking(&self, id: &BookingId) -> Result<Option<BookingSnapshot>, DirectoryError> {
        Ok(self.bookings.get(id).cloned())
    }

    fn property(&self, id: &PropertyId) -> Result<Option<PropertySnapshot>, DirectoryError> {
        Ok(self.properties.get(id).cloned())
    }

    fn active_agents(&self) -> Result<Vec<AgentId>, DirectoryError> {
        Ok(self.agents.clone())
    }

    fn agent_preferences(
        &self,
        agent: &AgentId,
    ) -> Result<Option<SchedulingPreference>, DirectoryError> {
        Ok(self.preferences.get(agent).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<VisitNotice>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<VisitNotice> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: VisitNotice) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notice: VisitNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) type TestOrchestrator = SchedulingOrchestrator<MemoryStore, MemoryDirectory, MemoryNotifier>;

/// Single-agent scenario: `agent-a` works Mon-Fri 09:00-17:00, `booking-1`
/// references `prop-1`.
pub(super) fn build_orchestrator() -> (
    TestOrchestrator,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::default());
    store.add_workweek(&agent_a());

    let directory = Arc::new(
        MemoryDirectory::default()
            .with_booking(booking())
            .with_property(property())
            .with_agent(agent_a())
            .with_preferences(preferences(&agent_a())),
    );
    let notifier = Arc::new(MemoryNotifier::default());
    let orchestrator = SchedulingOrchestrator::new(
        store.clone(),
        directory,
        notifier.clone(),
        SchedulerConfig::default(),
    );
    (orchestrator, store, notifier)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
