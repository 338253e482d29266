use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AgentId, ConflictId, ScheduleId};
use super::repository::{Directory, Notifier, ScheduleView, SchedulingStore, StoreError};
use super::service::{
    ResolutionAction, ScheduleRequest, SchedulingError, SchedulingOrchestrator,
};

/// Router builder exposing HTTP endpoints for booking, lifecycle transitions,
/// day optimization, slot generation, and conflict resolution.
pub fn scheduling_router<S, D, N>(service: Arc<SchedulingOrchestrator<S, D, N>>) -> Router
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/visits", post(create_handler::<S, D, N>))
        .route("/api/v1/visits/:schedule_id", get(get_handler::<S, D, N>))
        .route(
            "/api/v1/visits/:schedule_id/confirm",
            post(confirm_handler::<S, D, N>),
        )
        .route(
            "/api/v1/visits/:schedule_id/cancel",
            post(cancel_handler::<S, D, N>),
        )
        .route(
            "/api/v1/visits/:schedule_id/complete",
            post(complete_handler::<S, D, N>),
        )
        .route(
            "/api/v1/agents/:agent_id/optimize",
            post(optimize_handler::<S, D, N>),
        )
        .route(
            "/api/v1/agents/:agent_id/slots",
            post(generate_slots_handler::<S, D, N>),
        )
        .route(
            "/api/v1/conflicts/:conflict_id/resolve",
            post(resolve_conflict_handler::<S, D, N>),
        )
        .route(
            "/api/v1/conflicts/:conflict_id/suggestions",
            get(suggest_resolutions_handler::<S, D, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    #[serde(flatten)]
    pub request: ScheduleRequest,
    pub today: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub confirmed_by: String,
    pub at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSlotsRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResolveConflictRequest {
    pub resolved_by: String,
    pub action: ResolutionAction,
    #[serde(default)]
    pub notes: String,
    pub at: NaiveDateTime,
}

pub(crate) async fn create_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    axum::Json(payload): axum::Json<CreateVisitRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    match service.create_schedule(payload.request, payload.today) {
        Ok(schedule) => {
            let view = ScheduleView::from_schedule(&schedule);
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(schedule_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ScheduleId(schedule_id);
    match service.schedule(&id) {
        Ok(schedule) => {
            let view = ScheduleView::from_schedule(&schedule);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn confirm_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(schedule_id): Path<String>,
    axum::Json(payload): axum::Json<ConfirmRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ScheduleId(schedule_id);
    match service.confirm(&id, payload.confirmed_by, payload.at) {
        Ok(schedule) => {
            let view = ScheduleView::from_schedule(&schedule);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(schedule_id): Path<String>,
    axum::Json(payload): axum::Json<NotesRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ScheduleId(schedule_id);
    match service.cancel(&id, payload.notes) {
        Ok(schedule) => {
            let view = ScheduleView::from_schedule(&schedule);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(schedule_id): Path<String>,
    axum::Json(payload): axum::Json<NotesRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ScheduleId(schedule_id);
    match service.complete(&id, payload.notes) {
        Ok(schedule) => {
            let view = ScheduleView::from_schedule(&schedule);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn optimize_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(agent_id): Path<String>,
    axum::Json(payload): axum::Json<OptimizeRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let agent = AgentId(agent_id);
    match service.optimize_existing_schedules(&agent, payload.date) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn generate_slots_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(agent_id): Path<String>,
    axum::Json(payload): axum::Json<GenerateSlotsRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let agent = AgentId(agent_id);
    match service.generate_time_slots(
        &agent,
        payload.start_date,
        payload.end_date,
        payload.duration_minutes,
    ) {
        Ok(slots) => {
            let payload = json!({
                "agent_id": agent.0,
                "slots_created": slots.len(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resolve_conflict_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(conflict_id): Path<String>,
    axum::Json(payload): axum::Json<ResolveConflictRequest>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ConflictId(conflict_id);
    match service.resolve_conflict(
        &id,
        payload.resolved_by,
        payload.action,
        payload.notes,
        payload.at,
    ) {
        Ok(conflict) => {
            let body = json!({
                "conflict_id": conflict.id.0,
                "resolution": conflict.resolution.label(),
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn suggest_resolutions_handler<S, D, N>(
    State(service): State<Arc<SchedulingOrchestrator<S, D, N>>>,
    Path(conflict_id): Path<String>,
) -> Response
where
    S: SchedulingStore + 'static,
    D: Directory + 'static,
    N: Notifier + 'static,
{
    let id = ConflictId(conflict_id);
    match service.suggest_resolutions(&id) {
        Ok(suggestions) => (StatusCode::OK, axum::Json(suggestions)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: SchedulingError) -> Response {
    let status = match &error {
        SchedulingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingError::NoSlotAvailable { .. }
        | SchedulingError::NoAgentAvailable
        | SchedulingError::Store(StoreError::SlotTaken)
        | SchedulingError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        SchedulingError::UnknownBooking(_)
        | SchedulingError::UnknownProperty(_)
        | SchedulingError::UnknownSchedule(_)
        | SchedulingError::UnknownConflict(_)
        | SchedulingError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
