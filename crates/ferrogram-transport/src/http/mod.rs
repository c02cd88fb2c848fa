//! Bot HTTP API client.

mod client;

pub use client::{DEFAULT_API_URL, HttpApiClient, HttpApiClientBuilder};
