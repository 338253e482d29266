use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SchedulerConfig;

use super::balancer::LoadBalancer;
use super::conflicts::{self, ResolutionSuggestion};
use super::domain::{
    AgentId, BookingId, CalendarConflict, ClientAvailability, Confirmation, ConflictId,
    ConflictResolution, DomainError, MatchAlgorithm, MatchScore, PropertySnapshot, ScheduleId,
    ScheduleMetrics, SchedulingPreference, SlotId, SlotStatus, TimeRange, TimeSlot,
    TransitionOutcome, VisitPriority, VisitSchedule, VisitStatus,
};
use super::metrics;
use super::repository::{
    Directory, DirectoryError, Notifier, Recipient, SchedulingStore, StoreError, VisitNotice,
};
use super::routing::{RouteOptimizer, RouteVisit};
use super::scoring::score_candidate;
use super::slots::day_candidates;

/// Error raised by the scheduling orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("no eligible agent available for assignment")]
    NoAgentAvailable,
    #[error("no slot available within {horizon_days} days")]
    NoSlotAvailable { horizon_days: u32 },
    #[error("unknown booking {0}")]
    UnknownBooking(String),
    #[error("unknown property {0}")]
    UnknownProperty(String),
    #[error("unknown schedule {0}")]
    UnknownSchedule(String),
    #[error("unknown conflict {0}")]
    UnknownConflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl SchedulingError {
    /// The optimistic-commit conflict is the one failure a caller may retry
    /// verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulingError::Store(StoreError::SlotTaken))
    }
}

/// Booking request handed to `create_schedule`. Preferences arrive explicitly
/// with the request; the orchestrator never fetches them ambiently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub booking: BookingId,
    #[serde(default)]
    pub client: Option<ClientAvailability>,
    #[serde(default)]
    pub agent: Option<AgentId>,
    pub algorithm: MatchAlgorithm,
}

/// A candidate slot surfaced by the search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotProposal {
    pub date: NaiveDate,
    pub window: TimeRange,
    pub score: MatchScore,
}

/// Result of a day-level re-optimization. A day with fewer than two visits is
/// reported as a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub optimized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub visits_rescheduled: u32,
    pub skipped: Vec<ScheduleId>,
    pub total_travel_minutes: u32,
    pub total_distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_end: Option<NaiveTime>,
}

impl OptimizationOutcome {
    fn skipped_with_reason(reason: &str) -> Self {
        Self {
            optimized: false,
            reason: Some(reason.to_string()),
            visits_rescheduled: 0,
            skipped: Vec::new(),
            total_travel_minutes: 0,
            total_distance_km: 0.0,
            estimated_end: None,
        }
    }
}

/// Manual conflict-resolution verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    Resolve,
    Ignore,
}

static SCHEDULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SLOT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static CONFLICT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_schedule_id() -> ScheduleId {
    let id = SCHEDULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ScheduleId(format!("visit-{id:06}"))
}

fn next_slot_id() -> SlotId {
    let id = SLOT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SlotId(format!("slot-{id:06}"))
}

fn next_conflict_id() -> ConflictId {
    let id = CONFLICT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ConflictId(format!("conflict-{id:06}"))
}

/// Orchestrator composing slot generation, scoring, routing, conflict
/// detection, and load balancing into the public booking operations. Owns the
/// visit state machine.
pub struct SchedulingOrchestrator<S, D, N> {
    store: Arc<S>,
    directory: Arc<D>,
    notifier: Arc<N>,
    config: SchedulerConfig,
}

impl<S, D, N> SchedulingOrchestrator<S, D, N>
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, notifier: Arc<N>, config: SchedulerConfig) -> Self {
        Self {
            store,
            directory,
            notifier,
            config,
        }
    }

    /// Books a visit for a reservation: resolves the agent, finds a slot with
    /// the requested strategy, and commits slot + schedule as one atomic store
    /// operation, then records any conflicts and notifies both parties.
    pub fn create_schedule(
        &self,
        request: ScheduleRequest,
        today: NaiveDate,
    ) -> Result<VisitSchedule, SchedulingError> {
        let booking = self
            .directory
            .booking(&request.booking)?
            .ok_or_else(|| SchedulingError::UnknownBooking(request.booking.0.clone()))?;
        let property = self
            .directory
            .property(&booking.property)?
            .ok_or_else(|| SchedulingError::UnknownProperty(booking.property.0.clone()))?;

        let duration = request
            .client
            .as_ref()
            .map(|client| client.preferred_duration_minutes)
            .unwrap_or(self.config.default_visit_minutes);
        if duration == 0 {
            return Err(DomainError::InvalidDuration { minutes: 0 }.into());
        }

        let agent = self.select_agent(request.agent.as_ref(), &property, today)?;
        let preferences = self.directory.agent_preferences(&agent)?;

        let (proposal, algorithm) = self.resolve_slot(
            &agent,
            &property,
            preferences.as_ref(),
            request.client.as_ref(),
            request.algorithm,
            duration,
            today,
        )?;

        let slot = TimeSlot {
            id: next_slot_id(),
            agent: agent.clone(),
            date: proposal.date,
            window: proposal.window,
            status: SlotStatus::Booked,
            booking: Some(booking.id.clone()),
        };
        let schedule = VisitSchedule {
            id: next_schedule_id(),
            client: booking.client.clone(),
            agent: agent.clone(),
            property: booking.property.clone(),
            booking: booking.id.clone(),
            slot: slot.id.clone(),
            date: proposal.date,
            window: proposal.window,
            algorithm,
            score: proposal.score,
            priority: request
                .client
                .as_ref()
                .map(|client| client.urgency)
                .unwrap_or(VisitPriority::Normal),
            status: VisitStatus::Pending,
            travel_minutes: None,
            distance_km: None,
            confirmation: None,
            notes: Vec::new(),
        };

        let schedule = self.store.commit_visit(slot, schedule)?;
        let conflicts = self.record_conflicts(&schedule)?;

        info!(
            schedule = %schedule.id,
            agent = %schedule.agent.0,
            date = %schedule.date,
            window = %schedule.window,
            algorithm = schedule.algorithm.label(),
            score = schedule.score.total,
            conflicts = conflicts.len(),
            "visit scheduled"
        );

        self.send_notice("visit_scheduled", &schedule, Recipient::Client(schedule.client.0.clone()));
        self.send_notice("visit_scheduled", &schedule, Recipient::Agent(schedule.agent.0.clone()));

        Ok(schedule)
    }

    /// Fetches a committed schedule by id.
    pub fn schedule(&self, id: &ScheduleId) -> Result<VisitSchedule, SchedulingError> {
        self.store
            .schedule(id)?
            .ok_or_else(|| SchedulingError::UnknownSchedule(id.0.clone()))
    }

    /// Forward day-by-day scan for the first free interval, up to the
    /// configured horizon. A day without working hours is skipped, not an
    /// error; exhausting the horizon yields `Ok(None)`.
    pub fn find_first_available_slot(
        &self,
        agent: &AgentId,
        preferred_date: Option<NaiveDate>,
        duration_minutes: u32,
        today: NaiveDate,
    ) -> Result<Option<SlotProposal>, SchedulingError> {
        if duration_minutes == 0 {
            return Err(DomainError::InvalidDuration { minutes: 0 }.into());
        }

        let start = preferred_date.map_or(today, |date| date.max(today));
        for offset in 0..self.config.first_available_horizon_days {
            let date = start + Duration::days(i64::from(offset));
            if let Some(window) = self.first_free_window(agent, date, duration_minutes)? {
                return Ok(Some(SlotProposal {
                    date,
                    window,
                    score: MatchScore::first_available(),
                }));
            }
        }
        Ok(None)
    }

    /// Scores every candidate inside the best-match horizon and returns the
    /// top three above the minimum score, ranked by score descending with
    /// ties broken by earliest date, then earliest start time.
    pub fn find_best_match_slot(
        &self,
        agent: &AgentId,
        client: &ClientAvailability,
        property: &PropertySnapshot,
        preferences: Option<&SchedulingPreference>,
        today: NaiveDate,
    ) -> Result<Vec<SlotProposal>, SchedulingError> {
        if client.preferred_duration_minutes == 0 {
            return Err(DomainError::InvalidDuration { minutes: 0 }.into());
        }

        let start = client.preferred_date.max(today);
        let mut proposals = Vec::new();

        for offset in 0..=self.config.best_match_horizon_days {
            let date = start + Duration::days(i64::from(offset));
            let Some(hours) = self.store.working_hours(agent, date.weekday())? else {
                continue;
            };
            let occupied = self.occupied_windows(agent, date)?;

            for window in day_candidates(&hours, client.preferred_duration_minutes, &occupied) {
                let score = score_candidate(date, window.start, client, property, preferences);
                if score.total >= self.config.min_match_score {
                    proposals.push(SlotProposal {
                        date,
                        window,
                        score,
                    });
                }
            }
        }

        proposals.sort_by(|a, b| {
            b.score
                .total
                .cmp(&a.score.total)
                .then(a.date.cmp(&b.date))
                .then(a.window.start.cmp(&b.window.start))
        });
        proposals.truncate(3);
        Ok(proposals)
    }

    /// Re-runs the route optimizer over an agent's pending/scheduled visits
    /// for one day and overwrites their times. Affects only that agent/date.
    pub fn optimize_existing_schedules(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<OptimizationOutcome, SchedulingError> {
        let mut schedules: Vec<VisitSchedule> = self
            .store
            .agent_schedules_on(agent, date)?
            .into_iter()
            .filter(|schedule| {
                matches!(
                    schedule.status,
                    VisitStatus::Pending | VisitStatus::Scheduled
                )
            })
            .collect();

        if schedules.len() < 2 {
            return Ok(OptimizationOutcome::skipped_with_reason(
                "fewer than two visits on this day",
            ));
        }

        let preferences = self.directory.agent_preferences(agent)?;
        let start_point = preferences
            .as_ref()
            .and_then(|prefs| prefs.base_location)
            .unwrap_or(self.config.office_location);

        let mut visits = Vec::with_capacity(schedules.len());
        for schedule in &schedules {
            let property = self
                .directory
                .property(&schedule.property)?
                .ok_or_else(|| SchedulingError::UnknownProperty(schedule.property.0.clone()))?;
            visits.push(RouteVisit {
                schedule: schedule.id.clone(),
                location: property.location,
                duration_minutes: schedule.window.duration_minutes().max(0) as u32,
            });
        }

        let optimizer = RouteOptimizer::new(self.config.speed_kmh, self.config.day_start);
        let plan = optimizer.plan(start_point, visits);

        for planned in &plan.ordered {
            if let Some(schedule) = schedules
                .iter_mut()
                .find(|schedule| schedule.id == planned.schedule)
            {
                schedule.window = planned.window;
                schedule.travel_minutes = Some(planned.travel_minutes);
                schedule.distance_km = Some(planned.leg_distance_km);
                self.store.update_schedule(schedule.clone())?;
            }
        }

        info!(
            agent = %agent.0,
            %date,
            rescheduled = plan.ordered.len(),
            skipped = plan.skipped.len(),
            travel_minutes = plan.total_travel_minutes,
            "day route optimized"
        );

        Ok(OptimizationOutcome {
            optimized: true,
            reason: None,
            visits_rescheduled: plan.ordered.len() as u32,
            skipped: plan.skipped,
            total_travel_minutes: plan.total_travel_minutes,
            total_distance_km: plan.total_distance_km,
            estimated_end: Some(plan.day_end),
        })
    }

    /// Bulk-generates `Available` slots for every working day in the range.
    /// Existing slots of any status count as occupied, so regeneration never
    /// produces overlapping duplicates.
    pub fn generate_time_slots(
        &self,
        agent: &AgentId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        if duration_minutes == 0 {
            return Err(DomainError::InvalidDuration { minutes: 0 }.into());
        }
        if start_date > end_date {
            return Err(DomainError::InvalidDateSpan {
                start: start_date,
                end: end_date,
            }
            .into());
        }

        let mut created = Vec::new();
        let mut date = start_date;
        while date <= end_date {
            if let Some(hours) = self.store.working_hours(agent, date.weekday())? {
                let occupied: Vec<TimeRange> = self
                    .store
                    .slots_for_day(agent, date)?
                    .iter()
                    .map(|slot| slot.window)
                    .collect();

                for window in day_candidates(&hours, duration_minutes, &occupied) {
                    created.push(TimeSlot {
                        id: next_slot_id(),
                        agent: agent.clone(),
                        date,
                        window,
                        status: SlotStatus::Available,
                        booking: None,
                    });
                }
            }
            date += Duration::days(1);
        }

        let created = self.store.insert_slots(created)?;
        info!(agent = %agent.0, %start_date, %end_date, slots = created.len(), "time slots generated");
        Ok(created)
    }

    /// Runs conflict detection for a committed schedule and persists any new
    /// findings. Idempotent per (pair, kind).
    pub fn detect_conflicts(
        &self,
        id: &ScheduleId,
    ) -> Result<Vec<CalendarConflict>, SchedulingError> {
        let schedule = self
            .store
            .schedule(id)?
            .ok_or_else(|| SchedulingError::UnknownSchedule(id.0.clone()))?;
        self.record_conflicts(&schedule)
    }

    /// Proposes resolutions for a recorded conflict: pure rule application
    /// over the two schedules it names, nothing persisted.
    pub fn suggest_resolutions(
        &self,
        id: &ConflictId,
    ) -> Result<Vec<ResolutionSuggestion>, SchedulingError> {
        let conflict = self
            .store
            .conflict(id)?
            .ok_or_else(|| SchedulingError::UnknownConflict(id.0.clone()))?;
        let first = self.schedule(&conflict.first)?;
        let second = self.schedule(&conflict.second)?;
        Ok(conflicts::suggest(&conflict, &first, &second))
    }

    /// Manually resolves or ignores a detected conflict. Re-invoking on an
    /// already handled conflict is a no-op.
    pub fn resolve_conflict(
        &self,
        id: &ConflictId,
        resolved_by: String,
        action: ResolutionAction,
        notes: String,
        at: NaiveDateTime,
    ) -> Result<CalendarConflict, SchedulingError> {
        let mut conflict = self
            .store
            .conflict(id)?
            .ok_or_else(|| SchedulingError::UnknownConflict(id.0.clone()))?;

        if !matches!(conflict.resolution, ConflictResolution::Detected) {
            return Ok(conflict);
        }

        conflict.resolution = match action {
            ResolutionAction::Resolve => ConflictResolution::Resolved {
                by: resolved_by,
                at,
                notes,
            },
            ResolutionAction::Ignore => ConflictResolution::Ignored {
                by: resolved_by,
                at,
                notes,
            },
        };
        self.store.update_conflict(conflict.clone())?;
        Ok(conflict)
    }

    pub fn mark_scheduled(&self, id: &ScheduleId) -> Result<VisitSchedule, SchedulingError> {
        let (schedule, outcome) = self.apply_transition(id, VisitStatus::Scheduled)?;
        self.persist_if_applied(&schedule, outcome)?;
        Ok(schedule)
    }

    /// Confirms a visit, recording who confirmed it and when.
    pub fn confirm(
        &self,
        id: &ScheduleId,
        confirmed_by: String,
        at: NaiveDateTime,
    ) -> Result<VisitSchedule, SchedulingError> {
        let (mut schedule, outcome) = self.apply_transition(id, VisitStatus::Confirmed)?;
        if outcome == TransitionOutcome::Applied {
            schedule.confirmation = Some(Confirmation {
                confirmed_by,
                confirmed_at: at,
            });
            self.store.update_schedule(schedule.clone())?;
            self.send_notice("visit_confirmed", &schedule, Recipient::Agent(schedule.agent.0.clone()));
        }
        Ok(schedule)
    }

    pub fn start_visit(&self, id: &ScheduleId) -> Result<VisitSchedule, SchedulingError> {
        let (schedule, outcome) = self.apply_transition(id, VisitStatus::InProgress)?;
        self.persist_if_applied(&schedule, outcome)?;
        Ok(schedule)
    }

    pub fn complete(
        &self,
        id: &ScheduleId,
        notes: Option<String>,
    ) -> Result<VisitSchedule, SchedulingError> {
        let (mut schedule, outcome) = self.apply_transition(id, VisitStatus::Completed)?;
        if outcome == TransitionOutcome::Applied {
            if let Some(notes) = notes {
                schedule.notes.push(notes);
            }
            self.store.update_schedule(schedule.clone())?;
        }
        Ok(schedule)
    }

    pub fn mark_no_show(&self, id: &ScheduleId) -> Result<VisitSchedule, SchedulingError> {
        let (schedule, outcome) = self.apply_transition(id, VisitStatus::NoShow)?;
        self.persist_if_applied(&schedule, outcome)?;
        Ok(schedule)
    }

    /// Cancels a visit and releases its slot back to `Available`. A second
    /// cancel is a no-op: the status stays `Cancelled` and nothing else runs.
    pub fn cancel(
        &self,
        id: &ScheduleId,
        notes: Option<String>,
    ) -> Result<VisitSchedule, SchedulingError> {
        let (mut schedule, outcome) = self.apply_transition(id, VisitStatus::Cancelled)?;
        if outcome == TransitionOutcome::NoOp {
            return Ok(schedule);
        }

        if let Some(notes) = notes {
            schedule.notes.push(notes);
        }
        self.store.update_schedule(schedule.clone())?;
        self.store
            .set_slot_status(&schedule.slot, SlotStatus::Available, None)?;

        info!(schedule = %schedule.id, slot = ?schedule.slot, "visit cancelled, slot released");
        self.send_notice("visit_cancelled", &schedule, Recipient::Client(schedule.client.0.clone()));
        self.send_notice("visit_cancelled", &schedule, Recipient::Agent(schedule.agent.0.clone()));
        Ok(schedule)
    }

    /// Assigns a batch of pending bookings across the active agent pool, in
    /// request order, by lowest running same-day load.
    pub fn assign_visit_batch(
        &self,
        requests: &[BookingId],
        today: NaiveDate,
    ) -> Result<Vec<(BookingId, AgentId)>, SchedulingError> {
        let mut loads = BTreeMap::new();
        for agent in self.directory.active_agents()? {
            let load = self.today_load(&agent, today)?;
            loads.insert(agent, load);
        }

        let mut balancer = LoadBalancer::new(loads);
        if balancer.is_empty() {
            return Err(SchedulingError::NoAgentAvailable);
        }
        let mut assignments = Vec::with_capacity(requests.len());
        for booking in requests {
            let agent = balancer
                .assign_next()
                .ok_or(SchedulingError::NoAgentAvailable)?;
            assignments.push((booking.clone(), agent));
        }
        Ok(assignments)
    }

    /// Recomputes and stores the derived per-agent/day counters.
    pub fn recompute_metrics(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<ScheduleMetrics, SchedulingError> {
        let schedules = self.store.agent_schedules_on(agent, date)?;
        let metrics = metrics::compute(agent.clone(), date, &schedules);
        self.store.upsert_metrics(metrics.clone())?;
        Ok(metrics)
    }

    fn resolve_slot(
        &self,
        agent: &AgentId,
        property: &PropertySnapshot,
        preferences: Option<&SchedulingPreference>,
        client: Option<&ClientAvailability>,
        algorithm: MatchAlgorithm,
        duration: u32,
        today: NaiveDate,
    ) -> Result<(SlotProposal, MatchAlgorithm), SchedulingError> {
        // Best-match needs client preferences to score against; without them,
        // and for a single-booking optimal-route request, the first-available
        // scan runs and is recorded as the algorithm that actually decided.
        match (algorithm, client) {
            (MatchAlgorithm::BestMatch, Some(client)) => {
                let proposals =
                    self.find_best_match_slot(agent, client, property, preferences, today)?;
                let best = proposals.into_iter().next().ok_or(
                    SchedulingError::NoSlotAvailable {
                        horizon_days: self.config.best_match_horizon_days,
                    },
                )?;
                Ok((best, MatchAlgorithm::BestMatch))
            }
            _ => {
                let preferred = client.map(|client| client.preferred_date);
                let proposal = self
                    .find_first_available_slot(agent, preferred, duration, today)?
                    .ok_or(SchedulingError::NoSlotAvailable {
                        horizon_days: self.config.first_available_horizon_days,
                    })?;
                Ok((proposal, MatchAlgorithm::FirstAvailable))
            }
        }
    }

    /// Explicit agent id wins when active; otherwise agents are scored by
    /// remaining capacity plus affinity bonuses and the first strict maximum
    /// wins.
    fn select_agent(
        &self,
        explicit: Option<&AgentId>,
        property: &PropertySnapshot,
        today: NaiveDate,
    ) -> Result<AgentId, SchedulingError> {
        let pool = self.directory.active_agents()?;
        if pool.is_empty() {
            return Err(SchedulingError::NoAgentAvailable);
        }

        if let Some(wanted) = explicit {
            if pool.contains(wanted) {
                return Ok(wanted.clone());
            }
            return Err(SchedulingError::NoAgentAvailable);
        }

        let mut best: Option<(AgentId, i32)> = None;
        for agent in pool {
            let load = self.today_load(&agent, today)? as i32;
            let mut score = (10 - load).max(0);

            if let Some(preferences) = self.directory.agent_preferences(&agent)? {
                if preferences.working_radius_km.is_some() {
                    score += 5;
                }
                if preferences.preferred_categories.contains(&property.category) {
                    score += 3;
                }
            }

            match &best {
                Some((_, current)) if *current >= score => {}
                _ => best = Some((agent, score)),
            }
        }

        best.map(|(agent, _)| agent)
            .ok_or(SchedulingError::NoAgentAvailable)
    }

    fn today_load(&self, agent: &AgentId, date: NaiveDate) -> Result<u32, SchedulingError> {
        let count = self
            .store
            .agent_schedules_on(agent, date)?
            .iter()
            .filter(|schedule| schedule.status.counts_toward_load())
            .count();
        Ok(count as u32)
    }

    fn first_free_window(
        &self,
        agent: &AgentId,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Option<TimeRange>, SchedulingError> {
        let Some(hours) = self.store.working_hours(agent, date.weekday())? else {
            return Ok(None);
        };
        let occupied = self.occupied_windows(agent, date)?;
        Ok(day_candidates(&hours, duration_minutes, &occupied).next())
    }

    fn occupied_windows(
        &self,
        agent: &AgentId,
        date: NaiveDate,
    ) -> Result<Vec<TimeRange>, SchedulingError> {
        Ok(self
            .store
            .slots_for_day(agent, date)?
            .iter()
            .filter(|slot| slot.status.occupies_calendar())
            .map(|slot| slot.window)
            .collect())
    }

    fn record_conflicts(
        &self,
        schedule: &VisitSchedule,
    ) -> Result<Vec<CalendarConflict>, SchedulingError> {
        let live = |entry: &VisitSchedule| !entry.status.is_terminal();
        let same_agent: Vec<VisitSchedule> = self
            .store
            .agent_schedules_on(&schedule.agent, schedule.date)?
            .into_iter()
            .filter(live)
            .collect();
        let same_property: Vec<VisitSchedule> = self
            .store
            .property_schedules_on(&schedule.property, schedule.date)?
            .into_iter()
            .filter(live)
            .collect();

        let mut created = Vec::new();
        for detected in conflicts::detect(schedule, &same_agent, &same_property) {
            if self
                .store
                .find_conflict(&detected.first, &detected.second, detected.kind)?
                .is_some()
            {
                continue;
            }

            let conflict = self.store.insert_conflict(CalendarConflict {
                id: next_conflict_id(),
                first: detected.first,
                second: detected.second,
                kind: detected.kind,
                severity: detected.severity,
                description: detected.description,
                resolution: ConflictResolution::Detected,
            })?;

            warn!(
                conflict = ?conflict.id,
                kind = conflict.kind.label(),
                severity = conflict.severity.label(),
                "calendar conflict detected"
            );
            self.send_notice(
                "conflict_detected",
                schedule,
                Recipient::Agent(schedule.agent.0.clone()),
            );
            created.push(conflict);
        }
        Ok(created)
    }

    fn apply_transition(
        &self,
        id: &ScheduleId,
        next: VisitStatus,
    ) -> Result<(VisitSchedule, TransitionOutcome), SchedulingError> {
        let mut schedule = self
            .store
            .schedule(id)?
            .ok_or_else(|| SchedulingError::UnknownSchedule(id.0.clone()))?;
        let outcome = schedule.status.transition(next)?;
        if outcome == TransitionOutcome::Applied {
            schedule.status = next;
        }
        Ok((schedule, outcome))
    }

    fn persist_if_applied(
        &self,
        schedule: &VisitSchedule,
        outcome: TransitionOutcome,
    ) -> Result<(), SchedulingError> {
        if outcome == TransitionOutcome::Applied {
            self.store.update_schedule(schedule.clone())?;
        }
        Ok(())
    }

    fn send_notice(&self, template: &str, schedule: &VisitSchedule, recipient: Recipient) {
        let mut details = BTreeMap::new();
        details.insert("date".to_string(), schedule.date.to_string());
        details.insert("window".to_string(), schedule.window.to_string());
        details.insert("status".to_string(), schedule.status.label().to_string());

        let notice = VisitNotice {
            template: template.to_string(),
            recipient,
            schedule: schedule.id.clone(),
            details,
        };

        if let Err(err) = self.notifier.notify(notice) {
            warn!(schedule = %schedule.id, %err, "notification dispatch failed; schedule unaffected");
        }
    }
}
