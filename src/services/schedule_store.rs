//! Trait and types for the ride-schedule data store.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// The store answered with an error status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A row of `ride_schedule`. Columns not modelled here pass through in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RideSchedule {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub origin_stop_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub route_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub direction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub notify_lead_time_min: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A row of `rider_schedule_time`, keyed by `(schedule_id, day)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScheduleTime {
    #[serde(deserialize_with = "lenient::string")]
    pub schedule_id: String,
    pub day: String,
    #[serde(default)]
    pub depart_time_local: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /schedules` and `PUT /schedules/{id}` as sent by clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleFields {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub origin_stop_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub route_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub direction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub notify_lead_time_min: Option<i64>,
    #[serde(default)]
    pub days: Option<Value>,
    #[serde(default)]
    pub depart_time_local: Option<String>,
}

/// Validated schedule fields handed to the stored procedures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleInput {
    pub title: Option<String>,
    pub origin_stop_id: Option<String>,
    pub route_id: Option<String>,
    pub direction_id: Option<String>,
    pub notify_lead_time_min: Option<i64>,
    pub days: Option<Vec<String>>,
    pub depart_time_local: Option<String>,
}

/// Body of the time endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeFields {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub depart_time_local: Option<String>,
}

/// A direct `ride_schedule` insert, used by seeding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSchedule {
    pub user_id: String,
    pub title: String,
    pub origin_stop_id: String,
    pub route_id: String,
    pub direction_id: String,
    pub notify_lead_time_min: i64,
}

/// Outcome of an operation that only proceeds when the caller owns the
/// schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum Owned<T> {
    Yes(T),
    NotOwned,
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the token is rejected.
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, StoreError>;
}

/// Abstraction over the schedule tables and stored procedures.
///
/// Every schedule read or write is scoped by `owner`. Time operations report
/// [`Owned::NotOwned`] instead of touching rows of a schedule the owner does
/// not hold.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list_schedules(&self, owner: &str) -> Result<Vec<RideSchedule>, StoreError>;

    async fn get_schedule(&self, owner: &str, id: &str) -> Result<Option<RideSchedule>, StoreError>;

    /// Calls `create_schedule_with_times`; returns the new schedule id.
    async fn create_schedule_with_times(
        &self,
        owner: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError>;

    /// Calls `update_schedule_with_times`; returns what the procedure returns.
    async fn update_schedule_with_times(
        &self,
        owner: &str,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError>;

    /// Deleting a missing or foreign schedule is not an error.
    async fn delete_schedule(&self, owner: &str, id: &str) -> Result<(), StoreError>;

    async fn list_times(
        &self,
        owner: &str,
        schedule_id: &str,
    ) -> Result<Owned<Vec<ScheduleTime>>, StoreError>;

    async fn insert_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: Option<&str>,
    ) -> Result<Owned<ScheduleTime>, StoreError>;

    /// `Owned::Yes(None)` when the schedule has no row for `day`.
    async fn update_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: &str,
    ) -> Result<Owned<Option<ScheduleTime>>, StoreError>;

    async fn delete_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
    ) -> Result<Owned<()>, StoreError>;

    async fn upsert_user(&self, id: &str, email: &str) -> Result<(), StoreError>;

    async fn insert_schedule(&self, row: &NewSchedule) -> Result<RideSchedule, StoreError>;
}

/// Deserializers for columns and form fields that arrive as either strings
/// or numbers.
mod lenient {
    use super::*;

    fn to_string(v: Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        to_string(Value::deserialize(d)?)
            .ok_or_else(|| serde::de::Error::custom("expected a string or number"))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(to_string(Value::deserialize(d)?))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("expected an integer")),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {s:?}"))),
            _ => Err(serde::de::Error::custom("expected an integer")),
        }
    }
}
