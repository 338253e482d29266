use chrono::NaiveDate;

use super::domain::{AgentId, ScheduleMetrics, VisitSchedule, VisitStatus};

/// Derives the per-agent/day counters from stored schedules.
///
/// Pure recomputation: callers replace the previous record wholesale, nothing
/// is incremented in place. Efficiency is the completed share of all finished
/// visits (completed + cancelled + no-show), in percent.
pub fn compute(agent: AgentId, date: NaiveDate, schedules: &[VisitSchedule]) -> ScheduleMetrics {
    let mut scheduled = 0u32;
    let mut completed = 0u32;
    let mut cancelled = 0u32;
    let mut no_show = 0u32;
    let mut score_sum = 0u64;
    let mut travel_minutes = 0u32;
    let mut distance_km = 0.0f64;

    for schedule in schedules {
        match schedule.status {
            VisitStatus::Completed => completed += 1,
            VisitStatus::Cancelled => cancelled += 1,
            VisitStatus::NoShow => no_show += 1,
            _ => scheduled += 1,
        }
        score_sum += u64::from(schedule.score.total);
        travel_minutes += schedule.travel_minutes.unwrap_or(0);
        distance_km += schedule.distance_km.unwrap_or(0.0);
    }

    let total = schedules.len() as u32;
    let finished = completed + cancelled + no_show;

    ScheduleMetrics {
        agent,
        date,
        scheduled_visits: scheduled,
        completed_visits: completed,
        cancelled_visits: cancelled,
        no_show_visits: no_show,
        average_match_score: (total > 0).then(|| score_sum as f64 / f64::from(total)),
        total_travel_minutes: travel_minutes,
        total_distance_km: distance_km,
        efficiency_score: (finished > 0)
            .then(|| f64::from(completed) * 100.0 / f64::from(finished)),
    }
}
