use chrono::{NaiveDate, NaiveTime, Weekday};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use visit_scheduler::scheduling::{
    AgentId, BookingId, BookingSnapshot, CalendarConflict, ClientId, ConflictId, ConflictKind,
    Directory, DirectoryError, GeoPoint, Notifier, NotifyError, PropertyCategory, PropertyId,
    PropertySnapshot, RouteOptimizationMode, ScheduleId, ScheduleMetrics, SchedulingPreference,
    SchedulingStore, SlotId, SlotStatus, StoreError, TimeRange, TimeSlot, VisitNotice,
    VisitSchedule, WorkingHours, WorkingHoursRecord,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreInner {
    working_hours: HashMap<(AgentId, Weekday), WorkingHoursRecord>,
    slots: Vec<TimeSlot>,
    schedules: HashMap<ScheduleId, VisitSchedule>,
    conflicts: HashMap<ConflictId, CalendarConflict>,
    metrics: Vec<ScheduleMetrics>,
}

/// In-memory scheduling store. One mutex guards all tables so the booking
/// commit can re-check the slot and write both records without a gap.
#[derive(Default)]
pub(crate) struct InMemorySchedulingStore {
    inner: Mutex<StoreInner>,
}

impl InMemorySchedulingStore {
    pub(crate) fn add_working_hours(&self, hours: WorkingHours) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .working_hours
            .insert((hours.agent.clone(), hours.weekday), hours);
    }

    pub(crate) fn schedules_for(&self, agent: &AgentId, date: NaiveDate) -> Vec<VisitSchedule> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .schedules
            .values()
            .filter(|schedule| &schedule.agent == agent && schedule.date == date)
            .cloned()
            .collect()
    }
}

impl SchedulingStore for InMemorySchedulingStore {
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
        Ok(self.schedules_for(agent, date))
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

#[derive(Default)]
struct DirectoryInner {
    bookings: HashMap<BookingId, BookingSnapshot>,
    properties: HashMap<PropertyId, PropertySnapshot>,
    agents: Vec<AgentId>,
    preferences: HashMap<AgentId, SchedulingPreference>,
}

/// In-memory stand-in for the booking, listing, and roster subsystems.
#[derive(Default)]
pub(crate) struct InMemoryDirectory {
    inner: Mutex<DirectoryInner>,
}

impl InMemoryDirectory {
    pub(crate) fn add_booking(&self, booking: BookingSnapshot) {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.bookings.insert(booking.id.clone(), booking);
    }

    pub(crate) fn add_property(&self, property: PropertySnapshot) {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.properties.insert(property.id.clone(), property);
    }

    pub(crate) fn add_agent(&self, agent: AgentId) {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.agents.push(agent);
    }

    pub(crate) fn add_preferences(&self, preferences: SchedulingPreference) {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner
            .preferences
            .insert(preferences.agent.clone(), preferences);
    }
}

impl Directory for InMemoryDirectory {
    fn booking(&self, id: &BookingId) -> Result<Option<BookingSnapshot>, DirectoryError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.bookings.get(id).cloned())
    }

    fn property(&self, id: &PropertyId) -> Result<Option<PropertySnapshot>, DirectoryError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.properties.get(id).cloned())
    }

    fn active_agents(&self) -> Result<Vec<AgentId>, DirectoryError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.agents.clone())
    }

    fn agent_preferences(
        &self,
        agent: &AgentId,
    ) -> Result<Option<SchedulingPreference>, DirectoryError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.preferences.get(agent).cloned())
    }
}

/// Notifier that logs deliveries instead of sending them.
#[derive(Default)]
pub(crate) struct LoggingNotifier {
    deliveries: Mutex<Vec<VisitNotice>>,
}

impl LoggingNotifier {
    pub(crate) fn deliveries(&self) -> Vec<VisitNotice> {
        self.deliveries
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl Notifier for LoggingNotifier {
    fn notify(&self, notice: VisitNotice) -> Result<(), NotifyError> {
        tracing::info!(
            template = %notice.template,
            schedule = %notice.schedule,
            "notification queued"
        );
        self.deliveries
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

fn hhmm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Seeds a small working calendar and a handful of bookings so the service is
/// exercisable straight after startup.
pub(crate) fn seed_sandbox(store: &InMemorySchedulingStore, directory: &InMemoryDirectory) {
    let weekdays = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    let roster = [
        (
            "agent-moreau",
            GeoPoint {
                latitude: 48.8566,
                longitude: 2.3522,
            },
        ),
        (
            "agent-lefevre",
            GeoPoint {
                latitude: 48.8738,
                longitude: 2.2950,
            },
        ),
    ];
    for (agent_id, base) in roster {
        let agent = AgentId(agent_id.to_string());
        for weekday in weekdays {
            store.add_working_hours(WorkingHours {
                agent: agent.clone(),
                weekday,
                hours: TimeRange {
                    start: hhmm(9, 0),
                    end: hhmm(18, 0),
                },
                break_time: Some(TimeRange {
                    start: hhmm(12, 30),
                    end: hhmm(13, 30),
                }),
                is_working: true,
            });
        }
        directory.add_agent(agent.clone());
        directory.add_preferences(SchedulingPreference {
            agent,
            route_optimization: RouteOptimizationMode::Distance,
            max_daily_visits: 8,
            min_break_minutes: 15,
            travel_buffer_minutes: 10,
            working_radius_km: Some(25.0),
            preferred_areas: vec!["Paris".to_string()],
            preferred_categories: vec![PropertyCategory::Apartment, PropertyCategory::Studio],
            base_location: Some(base),
        });
    }

    let listings = [
        (
            "prop-montmartre",
            "Bright two-room, Montmartre",
            PropertyCategory::Apartment,
            1350,
            48.8867,
            2.3431,
        ),
        (
            "prop-marais",
            "Studio in the Marais",
            PropertyCategory::Studio,
            1100,
            48.8590,
            2.3620,
        ),
        (
            "prop-boulogne",
            "Family house, Boulogne",
            PropertyCategory::House,
            2450,
            48.8352,
            2.2410,
        ),
    ];
    for (id, title, category, price, latitude, longitude) in listings {
        directory.add_property(PropertySnapshot {
            id: PropertyId(id.to_string()),
            title: title.to_string(),
            category,
            price: Some(price),
            area: Some("Paris".to_string()),
            location: Some(GeoPoint {
                latitude,
                longitude,
            }),
        });
    }

    let bookings = [
        ("booking-1001", "client-garcia", "prop-montmartre"),
        ("booking-1002", "client-nguyen", "prop-marais"),
        ("booking-1003", "client-dubois", "prop-boulogne"),
    ];
    for (booking_id, client_id, property_id) in bookings {
        directory.add_booking(BookingSnapshot {
            id: BookingId(booking_id.to_string()),
            client: ClientId(client_id.to_string()),
            property: PropertyId(property_id.to_string()),
        });
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
