use chrono::{NaiveDate, NaiveTime};

use super::domain::{
    ClientAvailability, MatchFactor, MatchScore, PropertySnapshot, SchedulingPreference,
    ScoreComponent, TimeOfDay,
};
use super::routing::haversine_km;

const DATE_EXACT: u8 = 30;
const DATE_IN_HORIZON: u8 = 24;
const TIME_FULL: u8 = 30;
const TIME_OFF_BUCKET: u8 = 9;
const AFFINITY_CATEGORY: u8 = 15;
const AFFINITY_RADIUS: u8 = 10;
const AFFINITY_RADIUS_UNKNOWN: u8 = 5;
const AFFINITY_NEUTRAL: u8 = 12;
const BUDGET_WITHIN: u8 = 15;
const BUDGET_OVER: u8 = 4;
const BUDGET_NEUTRAL: u8 = 8;

/// Scores one candidate slot against client and agent preferences.
///
/// Deterministic and side-effect-free: identical inputs always produce the
/// identical score and breakdown, which keeps top-N rankings stable. Every
/// sub-score is independently bounded and an absent preference contributes a
/// neutral mid-range value rather than a penalty. The total never exceeds 100.
pub fn score_candidate(
    candidate_date: NaiveDate,
    candidate_start: NaiveTime,
    client: &ClientAvailability,
    property: &PropertySnapshot,
    agent_preferences: Option<&SchedulingPreference>,
) -> MatchScore {
    let mut components = Vec::with_capacity(4);
    let mut total: u16 = 0;

    let date_points = if candidate_date == client.preferred_date {
        components.push(ScoreComponent {
            factor: MatchFactor::DatePreference,
            points: DATE_EXACT,
            notes: format!("matches preferred date {candidate_date}"),
        });
        DATE_EXACT
    } else {
        components.push(ScoreComponent {
            factor: MatchFactor::DatePreference,
            points: DATE_IN_HORIZON,
            notes: format!(
                "{candidate_date} inside search horizon, preferred {}",
                client.preferred_date
            ),
        });
        DATE_IN_HORIZON
    };
    total += u16::from(date_points);

    let time_points = match client.preferred_time {
        TimeOfDay::Any => {
            components.push(ScoreComponent {
                factor: MatchFactor::TimePreference,
                points: TIME_FULL,
                notes: "client accepts any time of day".to_string(),
            });
            TIME_FULL
        }
        bucket if bucket.contains(candidate_start) => {
            components.push(ScoreComponent {
                factor: MatchFactor::TimePreference,
                points: TIME_FULL,
                notes: format!("{} falls in the preferred bucket", candidate_start.format("%H:%M")),
            });
            TIME_FULL
        }
        _ => {
            components.push(ScoreComponent {
                factor: MatchFactor::TimePreference,
                points: TIME_OFF_BUCKET,
                notes: format!(
                    "{} outside the preferred bucket",
                    candidate_start.format("%H:%M")
                ),
            });
            TIME_OFF_BUCKET
        }
    };
    total += u16::from(time_points);

    let affinity_points = property_affinity(property, agent_preferences, &mut components);
    total += u16::from(affinity_points);

    let budget_points = budget_fit(property, client, &mut components);
    total += u16::from(budget_points);

    MatchScore {
        total: total.min(100) as u8,
        components,
    }
}

fn property_affinity(
    property: &PropertySnapshot,
    agent_preferences: Option<&SchedulingPreference>,
    components: &mut Vec<ScoreComponent>,
) -> u8 {
    let Some(preferences) = agent_preferences else {
        components.push(ScoreComponent {
            factor: MatchFactor::PropertyAffinity,
            points: AFFINITY_NEUTRAL,
            notes: "no agent preferences on file, neutral affinity".to_string(),
        });
        return AFFINITY_NEUTRAL;
    };

    let mut points = 0u8;
    let mut notes = Vec::new();

    if preferences
        .preferred_categories
        .contains(&property.category)
    {
        points += AFFINITY_CATEGORY;
        notes.push(format!("{:?} in preferred categories", property.category));
    }

    if let Some(radius_km) = preferences.working_radius_km {
        match (preferences.base_location, property.location) {
            (Some(base), Some(location)) => {
                let distance = haversine_km(base, location);
                if distance <= radius_km {
                    points += AFFINITY_RADIUS;
                    notes.push(format!(
                        "{distance:.1} km from base, inside {radius_km:.0} km radius"
                    ));
                } else {
                    notes.push(format!(
                        "{distance:.1} km from base, outside {radius_km:.0} km radius"
                    ));
                }
            }
            _ => {
                points += AFFINITY_RADIUS_UNKNOWN;
                notes.push("working radius declared but geometry unknown".to_string());
            }
        }
    }

    if notes.is_empty() {
        notes.push("no affinity signals matched".to_string());
    }

    components.push(ScoreComponent {
        factor: MatchFactor::PropertyAffinity,
        points,
        notes: notes.join("; "),
    });
    points
}

fn budget_fit(
    property: &PropertySnapshot,
    client: &ClientAvailability,
    components: &mut Vec<ScoreComponent>,
) -> u8 {
    let (points, notes) = match (client.budget_max, property.price) {
        (Some(budget), Some(price)) if price <= budget => {
            (BUDGET_WITHIN, format!("price {price} within budget {budget}"))
        }
        (Some(budget), Some(price)) => {
            (BUDGET_OVER, format!("price {price} exceeds budget {budget}"))
        }
        _ => (
            BUDGET_NEUTRAL,
            "budget or price unspecified, neutral fit".to_string(),
        ),
    };

    components.push(ScoreComponent {
        factor: MatchFactor::BudgetFit,
        points,
        notes,
    });
    points
}
