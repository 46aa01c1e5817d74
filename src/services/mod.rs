pub mod schedule_store;
pub mod schedules;
pub mod transit;
pub mod transit_api;
