use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for agents (the users that conduct visits).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

/// Identifier wrapper for CRM clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Identifier wrapper for listed properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for the transactional booking a visit fulfils.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

/// Identifier wrapper for committed visit schedules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

/// Identifier wrapper for calendar time slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(pub String);

/// Identifier wrapper for detected calendar conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(pub String);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation errors raised while building domain values.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidRange { start: NaiveTime, end: NaiveTime },
    #[error("visit duration must be positive, got {minutes} minutes")]
    InvalidDuration { minutes: i64 },
    #[error("status transition {from} -> {to} is not allowed")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("invalid date span: start {start} is after end {end}")]
    InvalidDateSpan { start: NaiveDate, end: NaiveDate },
}

/// Half-open `[start, end)` interval on a single day. Local time of day only;
/// the engine performs no timezone conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Half-open overlap test: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Geographic coordinate used for route planning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Recurring weekly availability of one agent. Created by the agent or an
/// admin, never by the engine; at most one record per (agent, weekday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub agent: AgentId,
    pub weekday: Weekday,
    pub hours: TimeRange,
    pub break_time: Option<TimeRange>,
    pub is_working: bool,
}

/// Lifecycle of a calendar slot. Slots are never deleted, only
/// status-transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
    Holiday,
    Sick,
}

impl SlotStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Blocked => "blocked",
            SlotStatus::Holiday => "holiday",
            SlotStatus::Sick => "sick",
        }
    }

    /// Occupied slots exclude candidate generation over their window.
    pub const fn occupies_calendar(self) -> bool {
        !matches!(self, SlotStatus::Available)
    }
}

/// A concrete interval on one agent's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: SlotId,
    pub agent: AgentId,
    pub date: NaiveDate,
    pub window: TimeRange,
    pub status: SlotStatus,
    pub booking: Option<BookingId>,
}

/// Slot-search strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAlgorithm {
    FirstAvailable,
    BestMatch,
    OptimalRoute,
}

impl MatchAlgorithm {
    pub const fn label(self) -> &'static str {
        match self {
            MatchAlgorithm::FirstAvailable => "first_available",
            MatchAlgorithm::BestMatch => "best_match",
            MatchAlgorithm::OptimalRoute => "optimal_route",
        }
    }
}

/// Visit urgency, carried over from the client's stated urgency. Ordered
/// lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl VisitPriority {
    pub const fn label(self) -> &'static str {
        match self {
            VisitPriority::Low => "low",
            VisitPriority::Normal => "normal",
            VisitPriority::High => "high",
            VisitPriority::Urgent => "urgent",
        }
    }
}

/// Outcome of applying a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// Re-invoking the transition the schedule already completed; idempotent.
    NoOp,
}

/// Lifecycle of a committed visit.
///
/// `pending -> scheduled -> confirmed -> in_progress -> completed | cancelled
/// | no_show`. Cancellation is reachable from any non-terminal state; terminal
/// states accept only the identical transition, as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Pending,
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl VisitStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::Confirmed => "confirmed",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::NoShow => "no_show",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            VisitStatus::Completed | VisitStatus::Cancelled | VisitStatus::NoShow
        )
    }

    /// Statuses that count toward an agent's same-day load.
    pub const fn counts_toward_load(self) -> bool {
        matches!(
            self,
            VisitStatus::Scheduled | VisitStatus::Confirmed | VisitStatus::InProgress
        )
    }

    pub fn transition(self, next: VisitStatus) -> Result<TransitionOutcome, DomainError> {
        // Terminal states swallow every further attempt so retrying clients
        // stay idempotent.
        if self == next || self.is_terminal() {
            return Ok(TransitionOutcome::NoOp);
        }

        let allowed = match (self, next) {
            (VisitStatus::Pending, VisitStatus::Scheduled) => true,
            (VisitStatus::Pending | VisitStatus::Scheduled, VisitStatus::Confirmed) => true,
            (VisitStatus::Scheduled | VisitStatus::Confirmed, VisitStatus::InProgress) => true,
            (VisitStatus::Confirmed | VisitStatus::InProgress, VisitStatus::Completed) => true,
            (
                VisitStatus::Pending
                | VisitStatus::Scheduled
                | VisitStatus::Confirmed
                | VisitStatus::InProgress,
                VisitStatus::Cancelled,
            ) => true,
            (
                VisitStatus::Scheduled | VisitStatus::Confirmed | VisitStatus::InProgress,
                VisitStatus::NoShow,
            ) => true,
            _ => false,
        };

        if allowed {
            Ok(TransitionOutcome::Applied)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.label(),
                to: next.label(),
            })
        }
    }
}

/// Factor contributing to a candidate's match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFactor {
    DatePreference,
    TimePreference,
    PropertyAffinity,
    BudgetFit,
}

/// Discrete contribution to a match score, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: MatchFactor,
    pub points: u8,
    pub notes: String,
}

/// Composite match score in 0..=100 with its factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub total: u8,
    pub components: Vec<ScoreComponent>,
}

impl MatchScore {
    /// The first-available strategy does not weigh preferences; the first fit
    /// is by definition a full match.
    pub fn first_available() -> Self {
        Self {
            total: 100,
            components: Vec::new(),
        }
    }
}

/// Who confirmed a visit, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub confirmed_by: String,
    pub confirmed_at: NaiveDateTime,
}

/// Composite visit assignment produced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitSchedule {
    pub id: ScheduleId,
    pub client: ClientId,
    pub agent: AgentId,
    pub property: PropertyId,
    pub booking: BookingId,
    pub slot: SlotId,
    pub date: NaiveDate,
    pub window: TimeRange,
    pub algorithm: MatchAlgorithm,
    pub score: MatchScore,
    pub priority: VisitPriority,
    pub status: VisitStatus,
    pub travel_minutes: Option<u32>,
    pub distance_km: Option<f64>,
    pub confirmation: Option<Confirmation>,
    pub notes: Vec<String>,
}

/// Kinds of committed-schedule overlap the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    TimeOverlap,
    PropertyConflict,
}

impl ConflictKind {
    pub const fn label(self) -> &'static str {
        match self {
            ConflictKind::TimeOverlap => "time_overlap",
            ConflictKind::PropertyConflict => "property_conflict",
        }
    }

    /// A double-booked agent is serious; a double-shown property is worse.
    pub const fn severity(self) -> ConflictSeverity {
        match self {
            ConflictKind::TimeOverlap => ConflictSeverity::High,
            ConflictKind::PropertyConflict => ConflictSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            ConflictSeverity::Low => "low",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::High => "high",
            ConflictSeverity::Critical => "critical",
        }
    }
}

/// Resolution state of a conflict. Only explicit manual resolution moves a
/// conflict out of `Detected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Detected,
    Resolved {
        by: String,
        at: NaiveDateTime,
        notes: String,
    },
    Ignored {
        by: String,
        at: NaiveDateTime,
        notes: String,
    },
}

impl ConflictResolution {
    pub const fn label(&self) -> &'static str {
        match self {
            ConflictResolution::Detected => "detected",
            ConflictResolution::Resolved { .. } => "resolved",
            ConflictResolution::Ignored { .. } => "ignored",
        }
    }
}

/// Overlap between two committed schedules, recorded at detection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConflict {
    pub id: ConflictId,
    pub first: ScheduleId,
    pub second: ScheduleId,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub description: String,
    pub resolution: ConflictResolution,
}

/// Client-stated preferences for an upcoming visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAvailability {
    pub preferred_date: NaiveDate,
    pub preferred_time: TimeOfDay,
    pub preferred_duration_minutes: u32,
    pub urgency: VisitPriority,
    pub budget_max: Option<u32>,
}

/// Coarse time-of-day bucket a client prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Any,
}

impl TimeOfDay {
    /// Bucket membership for a visit start time. Morning 08-12, afternoon
    /// 12-17, evening 17-20; `Any` matches everything.
    pub fn contains(self, start: NaiveTime) -> bool {
        use chrono::Timelike;
        let hour = start.hour();
        match self {
            TimeOfDay::Morning => (8..12).contains(&hour),
            TimeOfDay::Afternoon => (12..17).contains(&hour),
            TimeOfDay::Evening => (17..20).contains(&hour),
            TimeOfDay::Any => true,
        }
    }
}

/// How an agent wants bundled visits ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOptimizationMode {
    None,
    Distance,
    Time,
    Fuel,
}

/// Per-agent scheduling configuration, read-only input to the scorer and the
/// route optimizer. Always passed explicitly, never fetched ambiently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPreference {
    pub agent: AgentId,
    pub route_optimization: RouteOptimizationMode,
    pub max_daily_visits: u32,
    pub min_break_minutes: u32,
    pub travel_buffer_minutes: u32,
    pub working_radius_km: Option<f64>,
    pub preferred_areas: Vec<String>,
    pub preferred_categories: Vec<PropertyCategory>,
    pub base_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyCategory {
    Apartment,
    House,
    Studio,
    Office,
    Retail,
    Land,
}

/// Materialized view of a listed property from the listings subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub id: PropertyId,
    pub title: String,
    pub category: PropertyCategory,
    pub price: Option<u32>,
    pub area: Option<String>,
    pub location: Option<GeoPoint>,
}

/// Materialized view of the booking a visit fulfils.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub id: BookingId,
    pub client: ClientId,
    pub property: PropertyId,
}

/// Per-agent, per-date derived counters. Recomputed from stored schedules,
/// never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetrics {
    pub agent: AgentId,
    pub date: NaiveDate,
    pub scheduled_visits: u32,
    pub completed_visits: u32,
    pub cancelled_visits: u32,
    pub no_show_visits: u32,
    pub average_match_score: Option<f64>,
    pub total_travel_minutes: u32,
    pub total_distance_km: f64,
    pub efficiency_score: Option<f64>,
}
