//! Client wrappers that attach credentials to outgoing requests.

mod api_key;

pub use api_key::ApiKey;
