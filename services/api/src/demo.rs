use crate::infra::{seed_sandbox, InMemoryDirectory, InMemorySchedulingStore, LoggingNotifier};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::sync::Arc;
use visit_scheduler::config::SchedulerConfig;
use visit_scheduler::error::AppError;
use visit_scheduler::scheduling::{
    AgentId, BookingId, ClientAvailability, MatchAlgorithm, ScheduleRequest,
    SchedulingOrchestrator, TimeOfDay, VisitPriority, VisitSchedule,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Scheduling date for the demo (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the day-route optimization portion of the demo.
    #[arg(long)]
    pub(crate) skip_optimization: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        skip_optimization,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());

    println!("Visit scheduling demo");

    let store = Arc::new(InMemorySchedulingStore::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let notifier = Arc::new(LoggingNotifier::default());
    seed_sandbox(&store, &directory);

    let orchestrator = Arc::new(SchedulingOrchestrator::new(
        store.clone(),
        directory,
        notifier.clone(),
        SchedulerConfig::default(),
    ));

    let agent = AgentId("agent-moreau".to_string());
    println!("\nOpen calendar for {} starting {}", agent.0, today);
    let slots = match orchestrator.generate_time_slots(&agent, today, today + Duration::days(4), 60)
    {
        Ok(slots) => slots,
        Err(err) => {
            println!("  Slot generation failed: {}", err);
            return Ok(());
        }
    };
    println!("- {} open slots over the next five days", slots.len());

    println!("\nBooking three visits for {}", agent.0);
    let requests = [
        (
            "booking-1001",
            ScheduleRequest {
                booking: BookingId("booking-1001".to_string()),
                client: Some(ClientAvailability {
                    preferred_date: today + Duration::days(1),
                    preferred_time: TimeOfDay::Morning,
                    preferred_duration_minutes: 60,
                    urgency: VisitPriority::Normal,
                    budget_max: Some(1400),
                }),
                agent: Some(agent.clone()),
                algorithm: MatchAlgorithm::BestMatch,
            },
        ),
        (
            "booking-1002",
            ScheduleRequest {
                booking: BookingId("booking-1002".to_string()),
                client: None,
                agent: Some(agent.clone()),
                algorithm: MatchAlgorithm::FirstAvailable,
            },
        ),
        (
            "booking-1003",
            ScheduleRequest {
                booking: BookingId("booking-1003".to_string()),
                client: Some(ClientAvailability {
                    preferred_date: today + Duration::days(1),
                    preferred_time: TimeOfDay::Afternoon,
                    preferred_duration_minutes: 90,
                    urgency: VisitPriority::High,
                    budget_max: Some(2000),
                }),
                agent: Some(agent.clone()),
                algorithm: MatchAlgorithm::BestMatch,
            },
        ),
    ];

    let mut booked: Vec<VisitSchedule> = Vec::new();
    for (label, request) in requests {
        match orchestrator.create_schedule(request, today) {
            Ok(schedule) => {
                println!(
                    "- {} -> {} on {} at {} ({}, score {})",
                    label,
                    schedule.id,
                    schedule.date,
                    schedule.window,
                    schedule.algorithm.label(),
                    schedule.score.total
                );
                for component in &schedule.score.components {
                    println!(
                        "    - {:?}: {} ({})",
                        component.factor, component.points, component.notes
                    );
                }
                booked.push(schedule);
            }
            Err(err) => println!("- {} rejected: {}", label, err),
        }
    }

    let Some(first) = booked.first().cloned() else {
        println!("No visits were booked; nothing left to demonstrate");
        return Ok(());
    };

    println!("\nLifecycle for {}", first.id);
    match orchestrator.mark_scheduled(&first.id) {
        Ok(schedule) => println!("- status -> {}", schedule.status.label()),
        Err(err) => println!("- scheduling step failed: {}", err),
    }
    let confirmed_at = first
        .date
        .and_hms_opt(8, 0, 0)
        .unwrap_or_default();
    match orchestrator.confirm(&first.id, "client-garcia".to_string(), confirmed_at) {
        Ok(schedule) => println!("- status -> {}", schedule.status.label()),
        Err(err) => println!("- confirmation failed: {}", err),
    }

    if !skip_optimization {
        println!("\nOptimizing {}'s day on {}", agent.0, first.date);
        match orchestrator.optimize_existing_schedules(&agent, first.date) {
            Ok(outcome) if outcome.optimized => {
                println!(
                    "- reordered {} visits | {:.1} km | {} min on the road",
                    outcome.visits_rescheduled,
                    outcome.total_distance_km,
                    outcome.total_travel_minutes
                );
                if let Some(end) = outcome.estimated_end {
                    println!("- estimated day end {}", end.format("%H:%M"));
                }
                for skipped in &outcome.skipped {
                    println!("- left in place (no coordinates): {}", skipped);
                }
            }
            Ok(outcome) => {
                println!(
                    "- nothing to optimize: {}",
                    outcome.reason.unwrap_or_else(|| "no reason given".to_string())
                );
            }
            Err(err) => println!("- optimization failed: {}", err),
        }
    }

    println!("\nSpreading the same bookings across the whole team");
    let batch = [
        BookingId("booking-1001".to_string()),
        BookingId("booking-1002".to_string()),
        BookingId("booking-1003".to_string()),
    ];
    match orchestrator.assign_visit_batch(&batch, today) {
        Ok(assignments) => {
            for (booking, assignee) in assignments {
                println!("- {} -> {}", booking.0, assignee.0);
            }
        }
        Err(err) => println!("- batch assignment failed: {}", err),
    }

    if let Some(last) = booked.last() {
        println!("\nCancelling {}", last.id);
        match orchestrator.cancel(&last.id, Some("client asked to postpone".to_string())) {
            Ok(schedule) => println!("- status -> {} (slot released)", schedule.status.label()),
            Err(err) => println!("- cancellation failed: {}", err),
        }
    }

    println!("\nDay metrics for {} on {}", agent.0, first.date);
    match orchestrator.recompute_metrics(&agent, first.date) {
        Ok(metrics) => {
            println!(
                "- {} scheduled | {} completed | {} cancelled | {} no-show",
                metrics.scheduled_visits,
                metrics.completed_visits,
                metrics.cancelled_visits,
                metrics.no_show_visits
            );
            if let Some(average) = metrics.average_match_score {
                println!("- average match score {:.1}", average);
            }
        }
        Err(err) => println!("- metrics unavailable: {}", err),
    }

    let deliveries = notifier.deliveries();
    if deliveries.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications:");
        for notice in deliveries {
            println!("  - template={} -> {}", notice.template, notice.schedule);
        }
    }

    Ok(())
}
