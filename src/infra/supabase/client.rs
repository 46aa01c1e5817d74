use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::StoreConfig;
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, FetchError, HttpClient, build_request, send_json};
use crate::services::schedule_store::{
    AuthUser, Authenticator, NewSchedule, Owned, RideSchedule, ScheduleInput, ScheduleStore,
    ScheduleTime, StoreError,
};

const SCHEDULES: &str = "ride_schedule";
const TIMES: &str = "rider_schedule_time";
const USERS: &str = "app_user";

const RETURN_ROWS: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates";

/// Supabase (PostgREST + GoTrue) client authenticated with the service key.
pub struct SupabaseClient {
    http: Box<dyn HttpClient>,
    base_url: Url,
}

/// PostgREST reports failures as `{"message": ..., "code": ..., ...}`.
fn rejection(err: FetchError) -> StoreError {
    match err {
        FetchError::Status { status, body } => {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("msg"))
                        .and_then(Value::as_str)
                        .map(String::from)
                })
                .unwrap_or(body);
            StoreError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
        other => StoreError::Fetch(other),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

fn first_row<T: DeserializeOwned>(value: Value) -> Result<Option<T>, StoreError> {
    Ok(decode::<Vec<T>>(value)?.into_iter().next())
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl SupabaseClient {
    pub fn new(config: &StoreConfig) -> Result<Self, FetchError> {
        let basic = BasicClient::with_timeout(config.timeout)?;
        let http = ApiKey::new(
            ApiKey::bearer(basic, &config.service_key)?,
            "apikey",
            &config.service_key,
        )?;
        Self::with_client(http, &config.url)
    }

    /// Builds a client over any [`HttpClient`]. The caller is responsible
    /// for attaching the service key.
    pub fn with_client<C: HttpClient + 'static>(http: C, base_url: &str) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Box::new(http),
            base_url,
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    fn table(&self, table: &str, query: &[(&str, String)]) -> Url {
        self.url(&["rest", "v1", table], query)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        prefer: Option<&'static str>,
    ) -> Result<Value, StoreError> {
        debug!(%method, %url, "Supabase request");
        let mut req = build_request(method, url.as_str(), body)?;
        if let Some(prefer) = prefer {
            req.headers_mut()
                .insert("prefer", HeaderValue::from_static(prefer));
        }
        send_json(&self.http, req).await.map_err(rejection)
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value, StoreError> {
        let url = self.url(&["rest", "v1", "rpc", function], &[]);
        self.send(Method::POST, url, Some(&params), None).await
    }

    async fn owns(&self, owner: &str, schedule_id: &str) -> Result<bool, StoreError> {
        let url = self.table(
            SCHEDULES,
            &[
                ("select", "id".to_string()),
                ("id", eq(schedule_id)),
                ("user_id", eq(owner)),
            ],
        );
        let rows = self.send(Method::GET, url, None, None).await?;
        Ok(rows.as_array().is_some_and(|rows| !rows.is_empty()))
    }

    fn rpc_params(owner: &str, input: &ScheduleInput) -> Value {
        json!({
            "p_user_id": owner,
            "p_title": input.title,
            "p_origin_stop_id": input.origin_stop_id,
            "p_route_id": input.route_id,
            "p_direction_id": input.direction_id,
            "p_notify_lead_time_min": input.notify_lead_time_min,
            "p_days": input.days,
            "p_depart_time_local": input.depart_time_local,
        })
    }

    fn time_key(schedule_id: &str, day: &str) -> [(&'static str, String); 2] {
        [("schedule_id", eq(schedule_id)), ("day", eq(day))]
    }
}

#[async_trait]
impl Authenticator for SupabaseClient {
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, StoreError> {
        let url = self.url(&["auth", "v1", "user"], &[]);
        let mut req = build_request(Method::GET, url.as_str(), None)?;
        let Ok(mut bearer) = HeaderValue::from_str(&format!("Bearer {token}")) else {
            return Ok(None);
        };
        bearer.set_sensitive(true);
        req.headers_mut().insert(AUTHORIZATION, bearer);

        match send_json(&self.http, req).await {
            Ok(user) => Ok(decode::<AuthUser>(user).ok()),
            Err(FetchError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED
                    || status == StatusCode::FORBIDDEN
                    || status == StatusCode::BAD_REQUEST
                    || status == StatusCode::NOT_FOUND =>
            {
                debug!(status = status.as_u16(), "Token rejected");
                Ok(None)
            }
            Err(e) => Err(rejection(e)),
        }
    }
}

#[async_trait]
impl ScheduleStore for SupabaseClient {
    async fn list_schedules(&self, owner: &str) -> Result<Vec<RideSchedule>, StoreError> {
        let url = self.table(
            SCHEDULES,
            &[("select", "*".to_string()), ("user_id", eq(owner))],
        );
        decode(self.send(Method::GET, url, None, None).await?)
    }

    async fn get_schedule(&self, owner: &str, id: &str) -> Result<Option<RideSchedule>, StoreError> {
        let url = self.table(
            SCHEDULES,
            &[
                ("select", "*".to_string()),
                ("id", eq(id)),
                ("user_id", eq(owner)),
            ],
        );
        first_row(self.send(Method::GET, url, None, None).await?)
    }

    async fn create_schedule_with_times(
        &self,
        owner: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError> {
        self.rpc("create_schedule_with_times", Self::rpc_params(owner, input))
            .await
    }

    async fn update_schedule_with_times(
        &self,
        owner: &str,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError> {
        let mut params = Self::rpc_params(owner, input);
        params["p_schedule_id"] = json!(id);
        self.rpc("update_schedule_with_times", params).await
    }

    async fn delete_schedule(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let url = self.table(SCHEDULES, &[("id", eq(id)), ("user_id", eq(owner))]);
        self.send(Method::DELETE, url, None, None).await?;
        Ok(())
    }

    /// One request: the owner-filtered schedule with its times embedded.
    async fn list_times(
        &self,
        owner: &str,
        schedule_id: &str,
    ) -> Result<Owned<Vec<ScheduleTime>>, StoreError> {
        let url = self.table(
            SCHEDULES,
            &[
                ("select", format!("id,{TIMES}(*)")),
                ("id", eq(schedule_id)),
                ("user_id", eq(owner)),
            ],
        );
        let rows = self.send(Method::GET, url, None, None).await?;
        let Some(mut schedule) = first_row::<Value>(rows)? else {
            return Ok(Owned::NotOwned);
        };
        let times = schedule
            .get_mut(TIMES)
            .map(Value::take)
            .unwrap_or_else(|| json!([]));
        Ok(Owned::Yes(decode(times)?))
    }

    // PostgREST cannot filter a write on a joined table, so time mutations
    // check ownership with a separate read first.

    async fn insert_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: Option<&str>,
    ) -> Result<Owned<ScheduleTime>, StoreError> {
        if !self.owns(owner, schedule_id).await? {
            return Ok(Owned::NotOwned);
        }
        let url = self.table(TIMES, &[]);
        let body = json!({
            "schedule_id": schedule_id,
            "day": day,
            "depart_time_local": depart_time_local,
        });
        let rows = self.send(Method::POST, url, Some(&body), Some(RETURN_ROWS)).await?;
        first_row(rows)?
            .map(Owned::Yes)
            .ok_or_else(|| StoreError::Decode("insert returned no rows".into()))
    }

    async fn update_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: &str,
    ) -> Result<Owned<Option<ScheduleTime>>, StoreError> {
        if !self.owns(owner, schedule_id).await? {
            return Ok(Owned::NotOwned);
        }
        let url = self.table(TIMES, &Self::time_key(schedule_id, day));
        let body = json!({ "depart_time_local": depart_time_local });
        let rows = self.send(Method::PATCH, url, Some(&body), Some(RETURN_ROWS)).await?;
        Ok(Owned::Yes(first_row(rows)?))
    }

    async fn delete_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
    ) -> Result<Owned<()>, StoreError> {
        if !self.owns(owner, schedule_id).await? {
            return Ok(Owned::NotOwned);
        }
        let url = self.table(TIMES, &Self::time_key(schedule_id, day));
        self.send(Method::DELETE, url, None, None).await?;
        Ok(Owned::Yes(()))
    }

    async fn upsert_user(&self, id: &str, email: &str) -> Result<(), StoreError> {
        let url = self.table(USERS, &[("on_conflict", "id".to_string())]);
        let body = json!({ "id": id, "email": email });
        self.send(Method::POST, url, Some(&body), Some(MERGE_DUPLICATES))
            .await?;
        Ok(())
    }

    async fn insert_schedule(&self, row: &NewSchedule) -> Result<RideSchedule, StoreError> {
        let url = self.table(SCHEDULES, &[]);
        let body = serde_json::to_value(row).map_err(|e| StoreError::Decode(e.to_string()))?;
        let rows = self.send(Method::POST, url, Some(&body), Some(RETURN_ROWS)).await?;
        first_row(rows)?.ok_or_else(|| StoreError::Decode("insert returned no rows".into()))
    }
}
