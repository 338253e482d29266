use chrono::{NaiveTime, Timelike};

use super::domain::{TimeRange, WorkingHours};

/// Candidate free intervals for one agent/day.
///
/// The sequence is ordered, finite, and restartable (the iterator is `Clone`;
/// cloning before iteration restarts from the working-day start). Every
/// candidate has exactly the requested duration, lies inside the working
/// window, and intersects neither the break nor any occupied interval. A
/// duration that cannot fit anywhere simply yields an empty sequence.
#[derive(Debug, Clone)]
pub struct SlotCandidates {
    cursor: u32,
    work_end: u32,
    duration: u32,
    break_time: Option<(u32, u32)>,
    occupied: Vec<(u32, u32)>,
}

/// Builds the candidate sequence for a day. A non-working record (or, at the
/// call site, a missing record for that weekday) produces an empty sequence.
pub fn day_candidates(
    hours: &WorkingHours,
    duration_minutes: u32,
    occupied: &[TimeRange],
) -> SlotCandidates {
    if !hours.is_working || duration_minutes == 0 {
        return SlotCandidates::empty();
    }

    SlotCandidates {
        cursor: to_minutes(hours.hours.start),
        work_end: to_minutes(hours.hours.end),
        duration: duration_minutes,
        break_time: hours
            .break_time
            .map(|range| (to_minutes(range.start), to_minutes(range.end))),
        occupied: occupied
            .iter()
            .map(|range| (to_minutes(range.start), to_minutes(range.end)))
            .collect(),
    }
}

impl SlotCandidates {
    fn empty() -> Self {
        Self {
            cursor: 0,
            work_end: 0,
            duration: 1,
            break_time: None,
            occupied: Vec::new(),
        }
    }
}

impl Iterator for SlotCandidates {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        loop {
            let start = self.cursor;
            let end = start.checked_add(self.duration)?;
            if end > self.work_end {
                return None;
            }

            if let Some((break_start, break_end)) = self.break_time {
                if overlaps(start, end, break_start, break_end) {
                    self.cursor = break_end;
                    continue;
                }
            }

            if self
                .occupied
                .iter()
                .any(|&(busy_start, busy_end)| overlaps(start, end, busy_start, busy_end))
            {
                self.cursor = end;
                continue;
            }

            self.cursor = end;
            return Some(TimeRange {
                start: from_minutes(start),
                end: from_minutes(end),
            });
        }
    }
}

/// Half-open overlap in minute space.
fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

fn to_minutes(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn from_minutes(minutes: u32) -> NaiveTime {
    // Candidates never leave the working window, which itself fits in a day.
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .unwrap_or(NaiveTime::MIN)
}
