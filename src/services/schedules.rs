//! Ride-schedule operations on behalf of an authenticated caller.

use chrono::NaiveTime;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::services::schedule_store::{
    AuthUser, NewSchedule, Owned, RideSchedule, ScheduleFields, ScheduleInput, ScheduleStore,
    ScheduleTime, TimeFields,
};

pub const SEED_USER_ID: &str = "3f8c0c1e-1b4a-4c1a-9e6f-001111111111";
pub const SEED_USER_EMAIL: &str = "test@example.com";

#[derive(Debug, Clone, Serialize)]
pub struct SeedResult {
    pub ride: RideSchedule,
    pub time: ScheduleTime,
}

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

fn schedule_not_found() -> ApiError {
    ApiError::not_found("Schedule not found")
}

fn owned<T>(outcome: Owned<T>) -> Result<T, ApiError> {
    match outcome {
        Owned::Yes(value) => Ok(value),
        Owned::NotOwned => Err(schedule_not_found()),
    }
}

/// `days` must be an array of non-empty strings; when `required`, it must
/// also be present and non-empty.
fn parse_days(days: Option<&Value>, required: bool) -> Result<Option<Vec<String>>, ApiError> {
    const MSG: &str = "days must be a non-empty array";
    let items = match days {
        None | Some(Value::Null) if !required => return Ok(None),
        Some(Value::Array(items)) if !(required && items.is_empty()) => items,
        _ => return Err(ApiError::bad_request(MSG)),
    };
    items
        .iter()
        .map(|d| match d.as_str().map(str::trim) {
            Some(day) if !day.is_empty() => Ok(day.to_string()),
            _ => Err(ApiError::bad_request("days must contain day names")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Accepts `HH:MM` or `HH:MM:SS` and renders `HH:MM:SS`.
fn parse_depart_time(value: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(|t| Some(t.format("%H:%M:%S").to_string()))
        .map_err(|_| ApiError::bad_request(format!("Invalid depart_time_local {raw:?}")))
}

fn schedule_input(fields: ScheduleFields, days_required: bool) -> Result<ScheduleInput, ApiError> {
    let days = parse_days(fields.days.as_ref(), days_required)?;
    let depart_time_local = parse_depart_time(fields.depart_time_local.as_deref())?;
    Ok(ScheduleInput {
        title: fields.title,
        origin_stop_id: fields.origin_stop_id,
        route_id: fields.route_id,
        direction_id: fields.direction_id,
        notify_lead_time_min: fields.notify_lead_time_min,
        days,
        depart_time_local,
    })
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<RideSchedule>, ApiError> {
        let schedules = self.store.list_schedules(&user.id).await?;
        debug!(count = schedules.len(), "Fetched schedules");
        Ok(schedules)
    }

    /// Creates a schedule and its per-day times through the store's
    /// `create_schedule_with_times` procedure. Returns the new id.
    #[tracing::instrument(skip(self, user, fields), fields(user_id = %user.id))]
    pub async fn create(&self, user: &AuthUser, fields: ScheduleFields) -> Result<Value, ApiError> {
        let input = schedule_input(fields, true)?;
        debug!(days = ?input.days, depart = ?input.depart_time_local, "Creating schedule");
        let id = self.store.create_schedule_with_times(&user.id, &input).await?;
        info!(schedule_id = %id, "Schedule created");
        Ok(id)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn get(&self, user: &AuthUser, id: &str) -> Result<RideSchedule, ApiError> {
        self.store
            .get_schedule(&user.id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Not found"))
    }

    #[tracing::instrument(skip(self, user, fields), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: &AuthUser,
        id: &str,
        fields: ScheduleFields,
    ) -> Result<Value, ApiError> {
        let input = schedule_input(fields, false)?;
        let result = self
            .store
            .update_schedule_with_times(&user.id, id, &input)
            .await?;
        info!("Schedule updated");
        Ok(result)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &AuthUser, id: &str) -> Result<(), ApiError> {
        self.store.delete_schedule(&user.id, id).await?;
        info!("Schedule deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn list_times(
        &self,
        user: &AuthUser,
        schedule_id: &str,
    ) -> Result<Vec<ScheduleTime>, ApiError> {
        owned(self.store.list_times(&user.id, schedule_id).await?)
    }

    #[tracing::instrument(skip(self, user, fields), fields(user_id = %user.id))]
    pub async fn add_time(
        &self,
        user: &AuthUser,
        schedule_id: &str,
        fields: TimeFields,
    ) -> Result<ScheduleTime, ApiError> {
        let day = fields
            .day
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing day"))?;
        let depart = parse_depart_time(fields.depart_time_local.as_deref())?;
        owned(
            self.store
                .insert_time(&user.id, schedule_id, day, depart.as_deref())
                .await?,
        )
    }

    #[tracing::instrument(skip(self, user, fields), fields(user_id = %user.id))]
    pub async fn update_time(
        &self,
        user: &AuthUser,
        schedule_id: &str,
        day: &str,
        fields: TimeFields,
    ) -> Result<ScheduleTime, ApiError> {
        // A time row is only ever retimed, never cleared.
        let depart = parse_depart_time(fields.depart_time_local.as_deref())?
            .ok_or_else(|| ApiError::bad_request("Missing depart_time_local"))?;
        owned(
            self.store
                .update_time(&user.id, schedule_id, day, &depart)
                .await?,
        )?
        .ok_or_else(|| ApiError::not_found("Time not found"))
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_time(
        &self,
        user: &AuthUser,
        schedule_id: &str,
        day: &str,
    ) -> Result<(), ApiError> {
        owned(self.store.delete_time(&user.id, schedule_id, day).await?)
    }

    /// Inserts a fixed user, schedule and Monday time for manual testing.
    #[tracing::instrument(skip(self))]
    pub async fn seed(&self) -> Result<SeedResult, ApiError> {
        self.store.upsert_user(SEED_USER_ID, SEED_USER_EMAIL).await?;

        let ride = self
            .store
            .insert_schedule(&NewSchedule {
                user_id: SEED_USER_ID.to_string(),
                title: "Go to Campus".to_string(),
                origin_stop_id: "22273".to_string(),
                route_id: "A".to_string(),
                direction_id: "A_0_var0".to_string(),
                notify_lead_time_min: 10,
            })
            .await?;

        let time = owned(
            self.store
                .insert_time(SEED_USER_ID, &ride.id, "Monday", Some("08:00:00"))
                .await?,
        )?;

        info!(schedule_id = %ride.id, "Seed data inserted");
        Ok(SeedResult { ride, time })
    }
}
