//! Visit scheduling engine: slot generation, slot/client match scoring,
//! greedy day routing, conflict detection, and agent load balancing, tied
//! together by an orchestrator that owns the visit state machine.
//!
//! All operations take explicit dates and timestamps; nothing here reads a
//! wall clock, so every code path is reproducible in tests.

pub(crate) mod balancer;
pub(crate) mod conflicts;
pub mod domain;
pub(crate) mod metrics;
pub mod repository;
pub mod router;
pub mod routing;
pub mod scoring;
pub mod service;
pub(crate) mod slots;

#[cfg(test)]
mod tests;

pub use conflicts::{ResolutionSuggestion, SuggestionKind};
pub use domain::{
    AgentId, BookingId, BookingSnapshot, CalendarConflict, ClientAvailability, ClientId,
    Confirmation, ConflictId, ConflictKind, ConflictResolution, ConflictSeverity, DomainError,
    GeoPoint, MatchAlgorithm, MatchFactor, MatchScore, PropertyCategory, PropertyId,
    PropertySnapshot, RouteOptimizationMode, ScheduleId, ScheduleMetrics, SchedulingPreference,
    ScoreComponent, SlotId,
    SlotStatus, TimeOfDay, TimeRange, TimeSlot, TransitionOutcome, VisitPriority, VisitSchedule,
    VisitStatus, WorkingHours,
};
pub use repository::{
    Directory, DirectoryError, Notifier, NotifyError, Recipient, ScheduleView, SchedulingStore,
    StoreError, VisitNotice, WorkingHoursRecord,
};
pub use router::scheduling_router;
pub use routing::{haversine_km, travel_minutes, PlannedVisit, RoutePlan, RouteOptimizer, RouteVisit};
pub use scoring::score_candidate;
pub use service::{
    OptimizationOutcome, ResolutionAction, ScheduleRequest, SchedulingError,
    SchedulingOrchestrator, SlotProposal,
};
