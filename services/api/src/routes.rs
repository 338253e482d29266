use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use visit_scheduler::scheduling::{
    scheduling_router, Directory, GeoPoint, Notifier, PlannedVisit, RouteOptimizer, RouteVisit,
    ScheduleId, SchedulingOrchestrator, SchedulingStore,
};

#[derive(Debug, Deserialize)]
pub(crate) struct RoutePreviewStop {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) latitude: Option<f64>,
    #[serde(default)]
    pub(crate) longitude: Option<f64>,
    pub(crate) duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoutePreviewRequest {
    pub(crate) start_latitude: f64,
    pub(crate) start_longitude: f64,
    pub(crate) day_start: NaiveTime,
    pub(crate) speed_kmh: f64,
    pub(crate) stops: Vec<RoutePreviewStop>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoutePreviewResponse {
    pub(crate) ordered: Vec<PlannedVisit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) skipped: Vec<ScheduleId>,
    pub(crate) total_distance_km: f64,
    pub(crate) total_travel_minutes: u32,
    pub(crate) day_end: NaiveTime,
}

pub(crate) fn with_scheduling_routes<S, D, N>(
    service: Arc<SchedulingOrchestrator<S, D, N>>,
) -> axum::Router
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    scheduling_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/routes/preview",
            axum::routing::post(route_preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Plans a what-if itinerary from caller-supplied stops without touching any
/// stored calendar.
pub(crate) async fn route_preview_endpoint(
    Json(payload): Json<RoutePreviewRequest>,
) -> Json<RoutePreviewResponse> {
    let start = GeoPoint {
        latitude: payload.start_latitude,
        longitude: payload.start_longitude,
    };
    let visits = payload
        .stops
        .into_iter()
        .map(|stop| RouteVisit {
            schedule: ScheduleId(stop.id),
            location: match (stop.latitude, stop.longitude) {
                (Some(latitude), Some(longitude)) => Some(GeoPoint {
                    latitude,
                    longitude,
                }),
                _ => None,
            },
            duration_minutes: stop.duration_minutes,
        })
        .collect();

    let plan = RouteOptimizer::new(payload.speed_kmh, payload.day_start).plan(start, visits);

    Json(RoutePreviewResponse {
        ordered: plan.ordered,
        skipped: plan.skipped,
        total_distance_km: plan.total_distance_km,
        total_travel_minutes: plan.total_travel_minutes,
        day_end: plan.day_end,
    })
}
