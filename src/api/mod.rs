//! HTTP surface: route table and handlers.

mod auth;
mod health;
mod schedules;
mod transit;

pub use auth::Caller;

use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/test", get(health::test))
        .route("/schedules", get(schedules::list).post(schedules::create))
        .route("/schedules/seed", post(schedules::seed))
        .route(
            "/schedules/{id}",
            get(schedules::get)
                .put(schedules::update)
                .delete(schedules::delete),
        )
        .route(
            "/schedules/{id}/times",
            get(schedules::list_times).post(schedules::add_time),
        )
        .route(
            "/schedules/{id}/times/{day}",
            put(schedules::update_time).delete(schedules::delete_time),
        )
        .route("/umo_routes/agency", get(transit::agency))
        .route("/umo_routes/routes", get(transit::routes))
        .route("/umo_routes/routes/{route}/stops", get(transit::stops))
        .route("/umo_routes/predictions", get(transit::predictions))
        .route("/umo_routes/predictions/near", get(transit::predictions_near))
        .route("/umo_routes/stops/search", get(transit::search_stops))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
