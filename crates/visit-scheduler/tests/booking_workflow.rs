//! End-to-end booking scenarios driven through the public orchestrator facade
//! and the HTTP router, using in-memory adapters for the store, directory, and
//! notifier.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveTime, Weekday};

    use visit_scheduler::config::SchedulerConfig;
    use visit_scheduler::scheduling::{
        AgentId, BookingId, BookingSnapshot, CalendarConflict, ClientAvailability, ClientId,
        ConflictId, ConflictKind, Directory, DirectoryError, GeoPoint, Notifier, NotifyError,
        PropertyCategory, PropertyId, PropertySnapshot, ScheduleId, ScheduleMetrics,
        SchedulingOrchestrator, SchedulingPreference, SchedulingStore, SlotId, SlotStatus,
        StoreError, TimeOfDay, TimeRange, TimeSlot, VisitNotice, VisitPriority, VisitSchedule,
        WorkingHours, WorkingHoursRecord,
    };

    pub(super) fn range(start: (u32, u32), end: (u32, u32)) -> TimeRange {
        TimeRange {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).expect("valid time"),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).expect("valid time"),
        }
    }

    pub(super) fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 7).expect("valid date")
    }

    pub(super) fn agent() -> AgentId {
        AgentId("agent-dupont".to_string())
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

    pub(super) fn booking(id: &str, property: &str) -> BookingSnapshot {
        BookingSnapshot {
            id: BookingId(id.to_string()),
            client: ClientId("client-martin".to_string()),
            property: PropertyId(property.to_string()),
        }
    }

    pub(super) fn property(id: &str) -> PropertySnapshot {
        PropertySnapshot {
            id: PropertyId(id.to_string()),
            title: format!("Listing {id}"),
            category: PropertyCategory::Apartment,
            price: Some(1200),
            area: Some("Paris 9e".to_string()),
            location: Some(GeoPoint {
                latitude: 48.8790,
                longitude: 2.3400,
            }),
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

    #[derive(Default)]
    pub(super) struct MemoryStore {
        inner: Mutex<StoreInner>,
    }

    impl MemoryStore {
        pub(super) fn with_workweek(agent: &AgentId) -> Self {
            let store = Self::default();
            let mut inner = store.inner.lock().expect("store mutex poisoned");
            for weekday in [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ] {
                inner.working_hours.insert(
                    (agent.clone(), weekday),
                    WorkingHours {
                        agent: agent.clone(),
                        weekday,
                        hours: range((9, 0), (17, 0)),
                        break_time: Some(range((12, 0), (13, 0))),
                        is_working: true,
                    },
                );
            }
            drop(inner);
            store
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

        pub(super) fn conflict_count(&self) -> usize {
            self.inner
                .lock()
                .expect("store mutex poisoned")
                .conflicts
                .len()
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

        fn slots_for_day(
            &self,
            agent: &AgentId,
            date: NaiveDate,
        ) -> Result<Vec<TimeSlot>, StoreError> {
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
            inner
                .schedules
                .insert(schedule.id.clone(), schedule.clone());
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

        fn insert_conflict(
            &self,
            conflict: CalendarConflict,
        ) -> Result<CalendarConflict, StoreError> {
            let mut inner = self.inner.lock().expect("store mutex poisoned");
            inner
                .conflicts
                .insert(conflict.id.clone(), conflict.clone());
            Ok(conflict)
        }

        fn conflict(&self, id: &ConflictId) -> Result<Option<CalendarConflict>, StoreError> {
            let inner = self.inner.lock().expect("store mutex poisoned");
            Ok(inner.conflicts.get(id).cloned())
        }

        fn update_conflict(&self, conflict: CalendarConflict) -> Result<(), StoreError> {
            let mut inner = self.inner.lock().expect("store mutex poisoned");
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

    #[derive(Default, Clone)]
    pub(super) struct MemoryDirectory {
        pub(super) bookings: HashMap<BookingId, BookingSnapshot>,
        pub(super) properties: HashMap<PropertyId, PropertySnapshot>,
        pub(super) agents: Vec<AgentId>,
        pub(super) preferences: HashMap<AgentId, SchedulingPreference>,
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

    pub(super) type Orchestrator =
        SchedulingOrchestrator<MemoryStore, MemoryDirectory, MemoryNotifier>;

    pub(super) fn build() -> (Arc<Orchestrator>, Arc<MemoryStore>, Arc<MemoryNotifier>) {
        let store = Arc::new(MemoryStore::with_workweek(&agent()));
        let mut directory = MemoryDirectory::default();
        for index in 1..=3 {
            let booking = booking(&format!("booking-{index}"), &format!("prop-{index}"));
            directory
                .properties
                .insert(booking.property.clone(), property(&booking.property.0));
            directory.bookings.insert(booking.id.clone(), booking);
        }
        directory.agents.push(agent());
        let notifier = Arc::new(MemoryNotifier::default());
        let orchestrator = Arc::new(SchedulingOrchestrator::new(
            store.clone(),
            Arc::new(directory),
            notifier.clone(),
            SchedulerConfig::default(),
        ));
        (orchestrator, store, notifier)
    }
}

use common::*;
use visit_scheduler::scheduling::{
    BookingId, MatchAlgorithm, ScheduleRequest, SlotStatus, VisitStatus,
};

fn request(booking: &str, algorithm: MatchAlgorithm) -> ScheduleRequest {
    ScheduleRequest {
        booking: BookingId(booking.to_string()),
        client: Some(availability()),
        agent: Some(agent()),
        algorithm,
    }
}

#[test]
fn a_visit_travels_the_full_lifecycle() {
    let (orchestrator, store, _) = build();

    let schedule = orchestrator
        .create_schedule(request("booking-1", MatchAlgorithm::BestMatch), monday())
        .expect("booking succeeds");
    assert_eq!(schedule.status, VisitStatus::Pending);
    assert_eq!(schedule.date, monday());

    orchestrator
        .mark_scheduled(&schedule.id)
        .expect("scheduled");
    let confirmed = orchestrator
        .confirm(
            &schedule.id,
            "client-martin".to_string(),
            monday().and_hms_opt(8, 0, 0).expect("valid timestamp"),
        )
        .expect("confirmed");
    assert!(confirmed.confirmation.is_some());

    orchestrator.start_visit(&schedule.id).expect("in progress");
    let completed = orchestrator
        .complete(&schedule.id, Some("keys handed over".to_string()))
        .expect("completed");
    assert_eq!(completed.status, VisitStatus::Completed);
    assert_eq!(completed.notes, vec!["keys handed over".to_string()]);

    let metrics = orchestrator
        .recompute_metrics(&agent(), monday())
        .expect("metrics recompute");
    assert_eq!(metrics.completed_visits, 1);
    assert_eq!(metrics.efficiency_score, Some(100.0));

    // The slot stays booked after completion.
    let slot = store.slot(&schedule.slot).expect("slot exists");
    assert_eq!(slot.status, SlotStatus::Booked);
}

#[test]
fn sequential_bookings_never_collide() {
    let (orchestrator, store, _) = build();

    let first = orchestrator
        .create_schedule(request("booking-1", MatchAlgorithm::FirstAvailable), monday())
        .expect("first booking");
    let second = orchestrator
        .create_schedule(request("booking-2", MatchAlgorithm::FirstAvailable), monday())
        .expect("second booking");

    assert_eq!(first.window, range((9, 0), (10, 0)));
    assert_eq!(second.window, range((10, 0), (11, 0)));
    assert_eq!(store.conflict_count(), 0);
}

#[test]
fn cancellation_frees_the_window_for_the_next_client() {
    let (orchestrator, _, notifier) = build();

    let first = orchestrator
        .create_schedule(request("booking-1", MatchAlgorithm::FirstAvailable), monday())
        .expect("first booking");
    orchestrator
        .cancel(&first.id, Some("changed plans".to_string()))
        .expect("cancel");

    let replacement = orchestrator
        .create_schedule(request("booking-2", MatchAlgorithm::FirstAvailable), monday())
        .expect("rebooking");
    assert_eq!(replacement.window, first.window);

    let cancelled_notices = notifier
        .events()
        .iter()
        .filter(|event| event.template == "visit_cancelled")
        .count();
    assert_eq!(cancelled_notices, 2);
}

#[test]
fn every_booking_notifies_both_parties() {
    let (orchestrator, _, notifier) = build();
    orchestrator
        .create_schedule(request("booking-1", MatchAlgorithm::BestMatch), monday())
        .expect("booking succeeds");

    let events = notifier.events();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| event.template == "visit_scheduled"));
}
