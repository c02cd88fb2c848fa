//! # Ferrogram
//!
//! A rule-driven, type-safe bot framework for the Bot HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌──────────────────────────────────────┐
//! │ PollLoop │────▶│ Dispatcher │────▶│ Router ─▶ View "message"             │
//! │ (offset) │     │ (per-chat  │     │            ├─ Middleware::pre        │
//! └──────────┘     │  ordering) │     │            ├─ Handler (Rules) ─▶ API │
//!                  └────────────┘     │            └─ Middleware::post       │
//!                                     │        ─▶ View "callback_query" ...  │
//!                                     └──────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: polls updates, dispatches them, shuts down gracefully
//! - **Views**: one per family of update kinds, each with handlers and middleware
//! - **Rules**: composable predicates that can bind values for the handler
//! - **Handlers**: async functions whose parameters are extracted from the update
//! - **State**: per-conversation FSM state shared through a `StateStore`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram::prelude::*;
//!
//! async fn echo(message: Message) -> Option<String> {
//!     message.text
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = FerrogramRuntime::new()?;
//!     runtime
//!         .router_mut()
//!         .register_view(View::message().with_handler(Handler::new("echo", echo)))?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client` (default): the `reqwest`-backed API client

pub use ferrogram_core as core;
pub use ferrogram_framework as framework;
pub use ferrogram_runtime as runtime;
pub use ferrogram_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ferrogram::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use ferrogram_runtime::{FerrogramRuntime, RuntimeError, RuntimeResult};

    // Routing, rules, handlers, state
    pub use ferrogram_framework::prelude::*;

    #[cfg(feature = "http-client")]
    pub use ferrogram_transport::HttpApiClient;

    // Logging macros
    pub use ferrogram_runtime::prelude::*;
}
