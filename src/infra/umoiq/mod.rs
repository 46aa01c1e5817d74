//! UmoIQ public API v1 client.

mod client;

pub use client::{API_KEY_HEADER, UmoIqClient};
