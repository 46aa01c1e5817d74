#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ride_notifier::api;
use ride_notifier::config::TransitConfig;
use ride_notifier::fetch::HttpClient;
use ride_notifier::infra::umoiq::UmoIqClient;
use ride_notifier::services::schedule_store::{
    AuthUser, Authenticator, NewSchedule, Owned, RideSchedule, ScheduleInput, ScheduleStore,
    ScheduleTime, StoreError,
};
use ride_notifier::state::AppState;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const UMO_BASE: &str = "http://umo.test/api/pub/v1";
pub const AGENCY_PATH: &str = "/api/pub/v1/agencies/unitrans";

/// One request as seen by [`MockHttp`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub body: Option<Value>,
    pub prefer: Option<String>,
    pub authorization: Option<String>,
}

/// Canned upstream responses keyed by path (plus `?query` when present).
/// Unknown paths answer 404.
#[derive(Default)]
pub struct MockHttp {
    responses: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.into()));
    }

    pub fn json(&self, path: &str, body: Value) {
        self.respond(path, 200, body.to_string());
    }

    /// Request targets in the order they were sent.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.target.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let url = req.url();
        let key = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let body = req
            .body()
            .and_then(|b| b.as_bytes())
            .and_then(|bytes| serde_json::from_slice(bytes).ok());
        self.requests.lock().unwrap().push(Recorded {
            method: req.method().to_string(),
            target: key.clone(),
            body,
            prefer: header("prefer"),
            authorization: header("authorization"),
        });
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or((404, "not found".to_string()));
        let resp = axum::http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}

/// Tokens `token-<name>` authenticate as user `<name>`.
pub struct StaticAuth;

#[async_trait]
impl Authenticator for StaticAuth {
    async fn user_for_token(&self, token: &str) -> Result<Option<AuthUser>, StoreError> {
        Ok(token.strip_prefix("token-").map(|id| AuthUser {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
        }))
    }
}

#[derive(Default)]
struct Tables {
    schedules: Vec<RideSchedule>,
    times: Vec<ScheduleTime>,
    users: Vec<(String, String)>,
    next_id: u64,
}

impl Tables {
    fn owns(&self, owner: &str, id: &str) -> bool {
        self.schedules
            .iter()
            .any(|s| s.id == id && s.user_id == owner)
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

fn time_row(schedule_id: &str, day: &str, depart: Option<&str>) -> ScheduleTime {
    ScheduleTime {
        schedule_id: schedule_id.to_string(),
        day: day.to_string(),
        depart_time_local: depart.map(String::from),
        extra: Map::new(),
    }
}

/// In-memory schedule store; ownership checks and writes happen under one
/// lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    store_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        *self.store_calls.lock().unwrap()
    }

    fn tick(&self) {
        *self.store_calls.lock().unwrap() += 1;
    }

    pub fn insert(&self, owner: &str, title: &str) -> String {
        let mut t = self.tables.lock().unwrap();
        let id = t.new_id();
        t.schedules.push(RideSchedule {
            id: id.clone(),
            user_id: owner.to_string(),
            title: Some(title.to_string()),
            origin_stop_id: Some("22273".into()),
            route_id: Some("A".into()),
            direction_id: None,
            notify_lead_time_min: Some(10),
            extra: Map::new(),
        });
        id
    }

    pub fn add_time(&self, schedule_id: &str, day: &str, depart: &str) {
        let mut t = self.tables.lock().unwrap();
        t.times.push(time_row(schedule_id, day, Some(depart)));
    }

    pub fn schedule(&self, id: &str) -> Option<RideSchedule> {
        let t = self.tables.lock().unwrap();
        t.schedules.iter().find(|s| s.id == id).cloned()
    }

    pub fn times(&self, schedule_id: &str) -> Vec<ScheduleTime> {
        let t = self.tables.lock().unwrap();
        t.times
            .iter()
            .filter(|r| r.schedule_id == schedule_id)
            .cloned()
            .collect()
    }

    pub fn users(&self) -> Vec<(String, String)> {
        self.tables.lock().unwrap().users.clone()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn list_schedules(&self, owner: &str) -> Result<Vec<RideSchedule>, StoreError> {
        self.tick();
        let t = self.tables.lock().unwrap();
        Ok(t.schedules
            .iter()
            .filter(|s| s.user_id == owner)
            .cloned()
            .collect())
    }

    async fn get_schedule(&self, owner: &str, id: &str) -> Result<Option<RideSchedule>, StoreError> {
        self.tick();
        let t = self.tables.lock().unwrap();
        Ok(t.schedules
            .iter()
            .find(|s| s.id == id && s.user_id == owner)
            .cloned())
    }

    async fn create_schedule_with_times(
        &self,
        owner: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        let id = t.new_id();
        t.schedules.push(RideSchedule {
            id: id.clone(),
            user_id: owner.to_string(),
            title: input.title.clone(),
            origin_stop_id: input.origin_stop_id.clone(),
            route_id: input.route_id.clone(),
            direction_id: input.direction_id.clone(),
            notify_lead_time_min: input.notify_lead_time_min,
            extra: Map::new(),
        });
        for day in input.days.iter().flatten() {
            t.times
                .push(time_row(&id, day, input.depart_time_local.as_deref()));
        }
        Ok(json!(id))
    }

    async fn update_schedule_with_times(
        &self,
        owner: &str,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        let Some(row) = t
            .schedules
            .iter_mut()
            .find(|s| s.id == id && s.user_id == owner)
        else {
            return Ok(Value::Null);
        };
        if input.title.is_some() {
            row.title = input.title.clone();
        }
        if input.notify_lead_time_min.is_some() {
            row.notify_lead_time_min = input.notify_lead_time_min;
        }
        if let Some(days) = &input.days {
            t.times.retain(|r| r.schedule_id != id);
            for day in days {
                t.times
                    .push(time_row(id, day, input.depart_time_local.as_deref()));
            }
        }
        Ok(json!(id))
    }

    async fn delete_schedule(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        if t.owns(owner, id) {
            t.schedules.retain(|s| s.id != id);
            t.times.retain(|r| r.schedule_id != id);
        }
        Ok(())
    }

    async fn list_times(
        &self,
        owner: &str,
        schedule_id: &str,
    ) -> Result<Owned<Vec<ScheduleTime>>, StoreError> {
        self.tick();
        let t = self.tables.lock().unwrap();
        if !t.owns(owner, schedule_id) {
            return Ok(Owned::NotOwned);
        }
        Ok(Owned::Yes(
            t.times
                .iter()
                .filter(|r| r.schedule_id == schedule_id)
                .cloned()
                .collect(),
        ))
    }

    async fn insert_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: Option<&str>,
    ) -> Result<Owned<ScheduleTime>, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        if !t.owns(owner, schedule_id) {
            return Ok(Owned::NotOwned);
        }
        if t.times
            .iter()
            .any(|r| r.schedule_id == schedule_id && r.day == day)
        {
            return Err(StoreError::Rejected {
                status: 409,
                message: "duplicate key value violates unique constraint".into(),
            });
        }
        let row = time_row(schedule_id, day, depart_time_local);
        t.times.push(row.clone());
        Ok(Owned::Yes(row))
    }

    async fn update_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
        depart_time_local: &str,
    ) -> Result<Owned<Option<ScheduleTime>>, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        if !t.owns(owner, schedule_id) {
            return Ok(Owned::NotOwned);
        }
        let row = t
            .times
            .iter_mut()
            .find(|r| r.schedule_id == schedule_id && r.day == day)
            .map(|r| {
                r.depart_time_local = Some(depart_time_local.to_string());
                r.clone()
            });
        Ok(Owned::Yes(row))
    }

    async fn delete_time(
        &self,
        owner: &str,
        schedule_id: &str,
        day: &str,
    ) -> Result<Owned<()>, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        if !t.owns(owner, schedule_id) {
            return Ok(Owned::NotOwned);
        }
        t.times
            .retain(|r| !(r.schedule_id == schedule_id && r.day == day));
        Ok(Owned::Yes(()))
    }

    async fn upsert_user(&self, id: &str, email: &str) -> Result<(), StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        t.users.retain(|(uid, _)| uid != id);
        t.users.push((id.to_string(), email.to_string()));
        Ok(())
    }

    async fn insert_schedule(&self, row: &NewSchedule) -> Result<RideSchedule, StoreError> {
        self.tick();
        let mut t = self.tables.lock().unwrap();
        let id = t.new_id();
        let schedule = RideSchedule {
            id,
            user_id: row.user_id.clone(),
            title: Some(row.title.clone()),
            origin_stop_id: Some(row.origin_stop_id.clone()),
            route_id: Some(row.route_id.clone()),
            direction_id: Some(row.direction_id.clone()),
            notify_lead_time_min: Some(row.notify_lead_time_min),
            extra: Map::new(),
        };
        t.schedules.push(schedule.clone());
        Ok(schedule)
    }
}

pub fn transit_config() -> TransitConfig {
    TransitConfig::from_lookup(|key| match key {
        "UMO_BASE_URL" => Some(UMO_BASE.to_string()),
        "UMO_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn app(http: Arc<MockHttp>, store: Arc<MemoryStore>) -> Router {
    let config = transit_config();
    let umo = UmoIqClient::with_client(http, &config.base_url, &config.agency).unwrap();
    let state = AppState::new(Arc::new(umo), store, Arc::new(StaticAuth), &config);
    api::router(Arc::new(state))
}

pub async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub fn authed(method: &str, uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer token-{user}"));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
