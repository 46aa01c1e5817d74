//! Normalization of UmoIQ JSON payloads into a stable schema.
//!
//! Every field is optional upstream. Missing or mistyped fields fall back to
//! null, `"Unknown"`, `false` or an empty list; nothing here returns an error.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: Option<String>,
    pub name: String,
    pub short_name: Option<String>,
    pub region: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Option<String>,
    pub title: String,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub hidden: bool,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: Option<String>,
    pub name: String,
    pub code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub hidden: bool,
    pub show_destination_selector: bool,
    pub directions: Vec<String>,
    pub route: String,
    pub timestamp: Option<String>,
}

/// A search hit: one stop on one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopMatch {
    pub id: Option<String>,
    pub name: String,
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub id: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopSummary {
    pub id: Option<String>,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Direction {
    pub id: Option<String>,
    pub name: Option<String>,
    pub destination_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub timestamp: Option<i64>,
    pub minutes: Option<i64>,
    pub departure: bool,
    pub occupancy_status: Option<String>,
    pub occupancy_description: Option<String>,
    pub vehicle_id: Option<String>,
    pub linked_vehicle_ids: Vec<String>,
    pub direction: Direction,
    pub trip_id: Option<String>,
    pub delay: Option<i64>,
    pub affected_by_layover: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionBundle {
    pub server_timestamp: Option<i64>,
    pub route: RouteSummary,
    pub stop: StopSummary,
    pub predictions: Vec<Prediction>,
}

// field accessors

fn text(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or_unknown(v: &Value, key: &str) -> String {
    text(v, key).unwrap_or_else(|| UNKNOWN.to_string())
}

fn flag(v: &Value, key: &str) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn int(v: &Value, key: &str) -> Option<i64> {
    let field = v.get(key)?;
    field
        .as_i64()
        .or_else(|| field.as_f64().map(|f| f.round() as i64))
}

fn float(v: &Value, key: &str) -> Option<f64> {
    match v.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(_) => text(item, "id"),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// The elements of `payload` if it is an array, else nothing.
pub fn items(payload: &Value) -> &[Value] {
    payload.as_array().map(Vec::as_slice).unwrap_or(&[])
}

impl Agency {
    pub fn from_value(v: &Value) -> Self {
        Agency {
            id: text(v, "id"),
            name: text_or_unknown(v, "name"),
            short_name: text(v, "shortName"),
            region: text(v, "region"),
            website: text(v, "website"),
            logo: text(v, "logo"),
            timezone: text(v, "timezone"),
        }
    }
}

/// First agency whose name contains any of `keywords`, ignoring case.
pub fn select_agency(payload: &Value, keywords: &[String]) -> Option<Agency> {
    items(payload)
        .iter()
        .find(|a| {
            let name = a.get("name").and_then(Value::as_str).unwrap_or_default();
            let name = name.to_lowercase();
            keywords
                .iter()
                .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
        })
        .map(Agency::from_value)
}

impl Route {
    pub fn from_value(v: &Value) -> Self {
        Route {
            id: text(v, "id"),
            title: text_or_unknown(v, "title"),
            color: text(v, "color"),
            text_color: text(v, "textColor"),
            hidden: flag(v, "hidden"),
            timestamp: text(v, "timestamp"),
        }
    }
}

pub fn routes(payload: &Value) -> Vec<Route> {
    items(payload).iter().map(Route::from_value).collect()
}

/// Ids of the routes in `payload`, skipping routes without one.
pub fn route_ids(payload: &Value) -> Vec<String> {
    items(payload).iter().filter_map(|r| text(r, "id")).collect()
}

impl Stop {
    pub fn from_value(v: &Value, route_id: &str) -> Self {
        Stop {
            id: text(v, "id"),
            name: text_or_unknown(v, "name"),
            code: text(v, "code"),
            lat: float(v, "lat"),
            lon: float(v, "lon"),
            hidden: flag(v, "hidden"),
            show_destination_selector: flag(v, "showDestinationSelector"),
            directions: id_list(v.get("directions")),
            route: route_id.to_string(),
            timestamp: text(v, "timestamp"),
        }
    }
}

pub fn stops(payload: &Value, route_id: &str) -> Vec<Stop> {
    items(payload)
        .iter()
        .map(|s| Stop::from_value(s, route_id))
        .collect()
}

/// Stops in `payload` whose upstream name contains `needle` (already
/// lowercased). Stops without a name never match.
pub fn matching_stops(payload: &Value, route_id: &str, needle: &str) -> Vec<StopMatch> {
    items(payload)
        .iter()
        .filter_map(|s| {
            let name = s.get("name").and_then(Value::as_str)?;
            name.to_lowercase().contains(needle).then(|| StopMatch {
                id: text(s, "id"),
                name: name.to_string(),
                route: route_id.to_string(),
            })
        })
        .collect()
}

impl Direction {
    fn from_value(v: Option<&Value>) -> Self {
        match v {
            Some(d) => Direction {
                id: text(d, "id"),
                name: text(d, "name"),
                destination_name: text(d, "destinationName"),
            },
            None => Direction::default(),
        }
    }
}

/// `linkedVehicleIds` followed by any `vehiclesInConsist` not already listed.
fn linked_vehicles(v: &Value) -> Vec<String> {
    let mut ids = id_list(v.get("linkedVehicleIds"));
    for id in id_list(v.get("vehiclesInConsist")) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

impl Prediction {
    pub fn from_value(v: &Value) -> Self {
        Prediction {
            timestamp: int(v, "timestamp"),
            minutes: int(v, "minutes"),
            departure: flag(v, "departure"),
            occupancy_status: text(v, "occupancyStatus"),
            occupancy_description: text(v, "occupancyDescription"),
            vehicle_id: text(v, "vehicleId"),
            linked_vehicle_ids: linked_vehicles(v),
            direction: Direction::from_value(v.get("direction")),
            trip_id: text(v, "tripId"),
            delay: int(v, "delay"),
            affected_by_layover: flag(v, "affectedByLayover"),
        }
    }
}

impl PredictionBundle {
    pub fn from_value(v: &Value) -> Self {
        let route = v.get("route").unwrap_or(&Value::Null);
        let stop = v.get("stop").unwrap_or(&Value::Null);
        let values = v.get("values").or_else(|| v.get("predictions"));

        PredictionBundle {
            server_timestamp: int(v, "serverTimestamp"),
            route: RouteSummary {
                id: text(route, "id"),
                title: text_or_unknown(route, "title"),
            },
            stop: StopSummary {
                id: text(stop, "id"),
                name: text_or_unknown(stop, "name"),
                code: text(stop, "code"),
            },
            predictions: values
                .map(items)
                .unwrap_or_default()
                .iter()
                .map(Prediction::from_value)
                .collect(),
        }
    }

    /// Smallest known `minutes` among this bundle's predictions.
    pub fn next_minutes(&self) -> Option<i64> {
        self.predictions.iter().filter_map(|p| p.minutes).min()
    }
}

pub fn bundles(payload: &Value) -> Vec<PredictionBundle> {
    items(payload)
        .iter()
        .map(PredictionBundle::from_value)
        .collect()
}

/// Stable sort by soonest arrival; bundles with no minutes go last.
pub fn sort_soonest(bundles: &mut [PredictionBundle]) {
    bundles.sort_by(|a, b| match (a.next_minutes(), b.next_minutes()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
