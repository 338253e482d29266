use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::domain::{GeoPoint, ScheduleId, TimeRange};

const EARTH_RADIUS_KM: f64 = 6371.0;
const LAST_MINUTE_OF_DAY: u32 = 23 * 60 + 59;

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Travel time for a leg, truncated to whole minutes.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if speed_kmh <= 0.0 {
        return 0;
    }
    ((distance_km / speed_kmh) * 60.0).max(0.0) as u32
}

/// One visit submitted for day-level route planning.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteVisit {
    pub schedule: ScheduleId,
    pub location: Option<GeoPoint>,
    pub duration_minutes: u32,
}

/// A visit placed on the optimized route with its assigned wall-clock window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedVisit {
    pub schedule: ScheduleId,
    pub window: TimeRange,
    pub travel_minutes: u32,
    pub leg_distance_km: f64,
}

/// Result of planning one agent's day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub ordered: Vec<PlannedVisit>,
    /// Visits without coordinates; excluded from ordering, never dropped.
    pub skipped: Vec<ScheduleId>,
    pub total_distance_km: f64,
    pub total_travel_minutes: u32,
    pub day_end: NaiveTime,
}

/// Greedy nearest-neighbor route planner, O(n²) over the day's visits.
///
/// This is a local-improvement heuristic, not an exact shortest-tour solver:
/// it always extends the route with the closest remaining coordinate-bearing
/// visit. Wall-clock times are assigned sequentially afterwards: the first
/// visit starts at `day_start`, each later visit at the previous end plus the
/// leg's travel time.
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    speed_kmh: f64,
    day_start: NaiveTime,
}

impl RouteOptimizer {
    pub fn new(speed_kmh: f64, day_start: NaiveTime) -> Self {
        Self {
            speed_kmh,
            day_start,
        }
    }

    pub fn plan(&self, start_point: GeoPoint, visits: Vec<RouteVisit>) -> RoutePlan {
        let mut remaining = Vec::new();
        let mut skipped = Vec::new();
        for visit in visits {
            match visit.location {
                Some(location) => remaining.push((visit.schedule, location, visit.duration_minutes)),
                None => skipped.push(visit.schedule),
            }
        }

        let mut ordered = Vec::with_capacity(remaining.len());
        let mut current = start_point;
        let mut total_distance = 0.0;
        let mut total_travel = 0u32;
        let mut cursor = (self.day_start.hour() * 60 + self.day_start.minute())
            .min(LAST_MINUTE_OF_DAY - 1);
        let mut first = true;

        while !remaining.is_empty() {
            let (index, distance) = remaining
                .iter()
                .enumerate()
                .map(|(index, &(_, location, _))| (index, haversine_km(current, location)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, 0.0));

            let (schedule, location, duration) = remaining.swap_remove(index);
            let travel = travel_minutes(distance, self.speed_kmh);

            // First visit starts at the configured day start; travel to it is
            // still accounted in the totals. Windows are clamped to 23:59 on
            // an overloaded day but always keep start < end.
            if !first {
                cursor = (cursor + travel).min(LAST_MINUTE_OF_DAY - 1);
            }
            let start = cursor.min(LAST_MINUTE_OF_DAY - 1);
            let end = (start + duration.max(1)).min(LAST_MINUTE_OF_DAY);
            cursor = end;

            ordered.push(PlannedVisit {
                schedule,
                window: TimeRange {
                    start: minute_of_day(start),
                    end: minute_of_day(end),
                },
                travel_minutes: travel,
                leg_distance_km: distance,
            });

            current = location;
            total_distance += distance;
            total_travel += travel;
            first = false;
        }

        RoutePlan {
            day_end: minute_of_day(cursor),
            ordered,
            skipped,
            total_distance_km: total_distance,
            total_travel_minutes: total_travel,
        }
    }
}

fn minute_of_day(minutes: u32) -> NaiveTime {
    let clamped = minutes.min(LAST_MINUTE_OF_DAY);
    NaiveTime::from_hms_opt(clamped / 60, clamped % 60, 0).unwrap_or(NaiveTime::MIN)
}
