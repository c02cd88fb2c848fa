//! # Ferrogram Transport
//!
//! Concrete [`ApiClient`](ferrogram_core::ApiClient) implementations for the
//! ferrogram bot framework, selected through feature flags.
//!
//! ## Features
//!
//! - `http-client`: [`HttpApiClient`], the Bot HTTP API over `reqwest`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Runtime / Router   │  (calls ApiClient)
//! ├─────────────────────┤
//! │  ferrogram-core     │  (ApiClient trait, envelope decoding)
//! ├─────────────────────┤
//! │  ferrogram-transport│  <- This crate
//! ├─────────────────────┤
//! │  Network (HTTPS)    │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram_core::ApiClientExt;
//! use ferrogram_transport::HttpApiClient;
//!
//! let client = HttpApiClient::builder("123:ABC").build()?;
//! let me = client.get_me().await?;
//! ```

#[cfg(feature = "http-client")]
pub mod http;

mod status;

pub use status::classify_response;

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_API_URL, HttpApiClient, HttpApiClientBuilder};
