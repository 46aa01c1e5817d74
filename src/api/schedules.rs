use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::auth::Caller;
use crate::error::ApiError;
use crate::services::schedule_store::{RideSchedule, ScheduleFields, ScheduleTime, TimeFields};
use crate::services::schedules::SeedResult;
use crate::state::AppState;

fn deleted() -> Json<Value> {
    Json(json!({ "message": "Deleted" }))
}

pub async fn list(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RideSchedule>>, ApiError> {
    Ok(Json(state.schedules.list(&user).await?))
}

pub async fn create(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScheduleFields>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(fields) = body?;
    let id = state.schedules.create(&user, fields).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn get(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RideSchedule>, ApiError> {
    Ok(Json(state.schedules.get(&user, &id).await?))
}

pub async fn update(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<ScheduleFields>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(fields) = body?;
    let id = state.schedules.update(&user, &id, fields).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.schedules.delete(&user, &id).await?;
    Ok(deleted())
}

pub async fn list_times(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<String>,
) -> Result<Json<Vec<ScheduleTime>>, ApiError> {
    Ok(Json(state.schedules.list_times(&user, &schedule_id).await?))
}

pub async fn add_time(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<String>,
    body: Result<Json<TimeFields>, JsonRejection>,
) -> Result<Json<ScheduleTime>, ApiError> {
    let Json(fields) = body?;
    Ok(Json(
        state.schedules.add_time(&user, &schedule_id, fields).await?,
    ))
}

pub async fn update_time(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path((schedule_id, day)): Path<(String, String)>,
    body: Result<Json<TimeFields>, JsonRejection>,
) -> Result<Json<ScheduleTime>, ApiError> {
    let Json(fields) = body?;
    Ok(Json(
        state
            .schedules
            .update_time(&user, &schedule_id, &day, fields)
            .await?,
    ))
}

pub async fn delete_time(
    Caller(user): Caller,
    State(state): State<Arc<AppState>>,
    Path((schedule_id, day)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .schedules
        .delete_time(&user, &schedule_id, &day)
        .await?;
    Ok(deleted())
}

/// Unauthenticated.
pub async fn seed(State(state): State<Arc<AppState>>) -> Result<Json<SeedResult>, ApiError> {
    Ok(Json(state.schedules.seed().await?))
}
