//! Supabase-backed schedule store and token verification.

mod client;

pub use client::SupabaseClient;
