//! Ferrogram Runtime - polling and orchestration for ferrogram bots.
//!
//! This crate provides:
//! - The long-poll loop (`PollLoop`) with a monotonic cursor and backoff
//! - Concurrent dispatch with per-conversation ordering (`Dispatcher`)
//! - Runtime orchestration and graceful shutdown (`FerrogramRuntime`)
//! - figment configuration and `tracing` logging setup
//!
//! ```rust,ignore
//! use ferrogram_runtime::FerrogramRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = FerrogramRuntime::new()?;
//!     runtime.router_mut().register_view(my_view())?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod poller;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, FerrogramConfig, LoggingConfig, PollingConfig,
};
pub use dispatcher::{ConversationLocks, ConversationTurn, DispatchMode, Dispatcher};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{PollLoop, PollOptions, PollState, UpdateSink};
pub use runtime::{FerrogramRuntime, RuntimeBuilder, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
