use serde::{Deserialize, Serialize};

use super::domain::{CalendarConflict, ConflictKind, ConflictSeverity, ScheduleId, VisitSchedule};

/// An overlap found by detection, before it is persisted as a
/// `CalendarConflict`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedConflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub first: ScheduleId,
    pub second: ScheduleId,
    pub description: String,
}

/// Finds overlaps between a freshly committed schedule and its same-day
/// neighbors. Two independent checks: other visits of the same agent
/// (time_overlap, high) and other visits of the same property regardless of
/// agent (property_conflict, critical: a property cannot be shown to two
/// parties at once). One record per overlapping pair; detection never blocks
/// the commit and never resolves anything.
pub fn detect(
    schedule: &VisitSchedule,
    same_agent_day: &[VisitSchedule],
    same_property_day: &[VisitSchedule],
) -> Vec<DetectedConflict> {
    let mut found = Vec::new();

    for other in same_agent_day {
        if other.id == schedule.id || other.date != schedule.date {
            continue;
        }
        if schedule.window.overlaps(&other.window) {
            found.push(pair(
                ConflictKind::TimeOverlap,
                schedule,
                other,
                format!(
                    "agent {} double-booked: {} overlaps {}",
                    schedule.agent.0, schedule.window, other.window
                ),
            ));
        }
    }

    for other in same_property_day {
        if other.id == schedule.id || other.date != schedule.date {
            continue;
        }
        if schedule.window.overlaps(&other.window) {
            found.push(pair(
                ConflictKind::PropertyConflict,
                schedule,
                other,
                format!(
                    "property {} shown twice at once: {} overlaps {}",
                    schedule.property.0, schedule.window, other.window
                ),
            ));
        }
    }

    found
}

/// What a suggestion proposes doing about a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Reschedule,
    AlternativeSlot,
}

/// A proposed way out of a recorded conflict. Suggestions are advisory; acting
/// on one still goes through the normal cancel/reschedule operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSuggestion {
    pub kind: SuggestionKind,
    pub target: ScheduleId,
    pub severity: ConflictSeverity,
    pub description: String,
}

/// Proposes resolutions for a recorded conflict, given the two schedules it
/// names. A time overlap targets the lower-priority visit for rescheduling
/// (the second one on a priority tie); a property conflict asks for an
/// alternative slot for the first visit of the pair.
pub fn suggest(
    conflict: &CalendarConflict,
    first: &VisitSchedule,
    second: &VisitSchedule,
) -> Vec<ResolutionSuggestion> {
    match conflict.kind {
        ConflictKind::TimeOverlap => {
            let target = if first.priority < second.priority {
                first
            } else {
                second
            };
            vec![ResolutionSuggestion {
                kind: SuggestionKind::Reschedule,
                target: target.id.clone(),
                severity: ConflictSeverity::High,
                description: format!(
                    "reschedule {}, the lower-priority visit of the overlapping pair",
                    target.id
                ),
            }]
        }
        ConflictKind::PropertyConflict => vec![ResolutionSuggestion {
            kind: SuggestionKind::AlternativeSlot,
            target: first.id.clone(),
            severity: ConflictSeverity::Critical,
            description: format!(
                "offer an alternative slot for {} so the property is shown once at a time",
                first.id
            ),
        }],
    }
}

fn pair(
    kind: ConflictKind,
    schedule: &VisitSchedule,
    other: &VisitSchedule,
    description: String,
) -> DetectedConflict {
    DetectedConflict {
        kind,
        severity: kind.severity(),
        first: schedule.id.clone(),
        second: other.id.clone(),
        description,
    }
}
