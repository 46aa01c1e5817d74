pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod normalize;
pub mod services;
pub mod state;
