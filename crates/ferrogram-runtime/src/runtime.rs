//! Runtime orchestration: config, client, poll loop, dispatch, shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ferrogram_runtime::FerrogramRuntime;
//!
//! let mut runtime = FerrogramRuntime::builder()
//!     .config_file("ferrogram.toml")
//!     .build()?;
//! runtime.router_mut().register_view(view)?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferrogram_core::{ApiClientExt, BoxedClient};
use ferrogram_framework::Router;

use crate::config::{ConfigLoader, ConfigResult, FerrogramConfig, validate_config};
use crate::dispatcher::{DispatchMode, Dispatcher};
use crate::error::RuntimeResult;
use crate::logging;
use crate::poller::{PollLoop, PollOptions};

/// Runs a [`Router`] against the long-poll API until shutdown.
pub struct FerrogramRuntime {
    config: FerrogramConfig,
    router: Router,
    client: Option<BoxedClient>,
}

impl FerrogramRuntime {
    /// Loads configuration from the default locations and initializes
    /// logging.
    pub fn new() -> ConfigResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from loaded configuration.
    ///
    /// Installs the logging subscriber unless one is already set, and
    /// applies the configured error mode to the router.
    pub fn from_config(config: FerrogramConfig) -> ConfigResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            error_mode = ?config.errors.mode,
            "Runtime initialized from configuration"
        );

        let mut router = Router::new();
        router.error_handler_mut().set_mode(config.errors.mode);
        if let Some(username) = &config.bot.username {
            router.set_bot_username(username);
        }

        Ok(Self {
            config,
            router,
            client: None,
        })
    }

    pub fn config(&self) -> &FerrogramConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Replaces the router. The configured error mode and bot username are
    /// applied to it.
    pub fn set_router(&mut self, mut router: Router) -> &mut Self {
        router.error_handler_mut().set_mode(self.config.errors.mode);
        if let Some(username) = &self.config.bot.username {
            router.set_bot_username(username);
        }
        self.router = router;
        self
    }

    /// Uses `client` instead of building an HTTP client from `bot.token`.
    pub fn with_client(mut self, client: BoxedClient) -> Self {
        self.client = Some(client);
        self
    }

    fn client(&self) -> RuntimeResult<BoxedClient> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        self.http_client()
    }

    #[cfg(feature = "http-client")]
    fn http_client(&self) -> RuntimeResult<BoxedClient> {
        use ferrogram_transport::HttpApiClient;

        let token = self
            .config
            .bot
            .token
            .as_deref()
            .ok_or_else(|| crate::config::ConfigError::missing_field("bot.token"))?;
        let client = HttpApiClient::builder(token)
            .api_url(&self.config.bot.api_url)
            .timeout(self.config.bot.request_timeout())
            .build()?;
        debug!(api_url = client.api_url(), "HTTP client created");
        Ok(Arc::new(client))
    }

    #[cfg(not(feature = "http-client"))]
    fn http_client(&self) -> RuntimeResult<BoxedClient> {
        Err(crate::error::RuntimeError::NoClient(
            "enable the `http-client` feature or call `with_client`",
        ))
    }

    /// Learns the bot username with `getMe` when it is not configured.
    ///
    /// A rejected token is fatal; other failures leave mention checks
    /// without a username.
    async fn resolve_username(&mut self, client: &BoxedClient) -> RuntimeResult<()> {
        if self.router.bot_username().is_some() {
            return Ok(());
        }
        match client.get_me().await {
            Ok(me) => {
                match me.username.as_deref() {
                    Some(username) => {
                        info!(username, id = me.id, "Bot identity resolved");
                        self.router.set_bot_username(username);
                    }
                    None => warn!(id = me.id, "Bot account has no username"),
                }
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                warn!(error = %err, "getMe failed, command mentions will not match");
                Ok(())
            }
        }
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, the token is rejected, or an error is
    /// raised in raise mode. In-flight dispatches are drained before
    /// returning.
    pub async fn run_until<F>(mut self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let client = self.client()?;
        self.resolve_username(&client).await?;

        let kinds = self.router.allowed_updates();
        let options = PollOptions::from_config(&self.config.polling, kinds);
        let mode = if self.config.polling.concurrent_dispatch {
            DispatchMode::Concurrent
        } else {
            DispatchMode::Sequential
        };

        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(Arc::new(self.router), Arc::clone(&client), mode)
            .with_shutdown(cancel.clone());
        let mut poller = PollLoop::new(client, options);

        info!(?mode, "Ferrogram runtime is now running");

        let polled = {
            let cancel_on_signal = cancel.clone();
            let signal = async move {
                shutdown.await;
                cancel_on_signal.cancel();
            };
            tokio::pin!(signal);

            let run = poller.run(&dispatcher, cancel.clone());
            tokio::pin!(run);

            loop {
                tokio::select! {
                    result = &mut run => break result,
                    _ = &mut signal, if !cancel.is_cancelled() => {}
                }
            }
        };

        let drained = dispatcher.drain().await;
        info!(offset = ?poller.offset(), "Runtime stopped");

        polled.and(drained)
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler");
                let _ = signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`FerrogramRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a programmatic base configuration.
    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<FerrogramRuntime> {
        let config = self.config_loader.load()?;
        FerrogramRuntime::from_config(config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio_test::assert_ok;

    use super::*;
    use crate::error::RuntimeError;
    use ferrogram_core::{ApiClient, ApiError, ApiResult};
    use ferrogram_framework::prelude::*;
    use ferrogram_framework::{ErrorMode, View};

    /// Serves `getMe`, scripted `getUpdates` batches and records sends.
    struct FakeApi {
        batches: Mutex<VecDeque<ApiResult<Value>>>,
        sent: Mutex<Vec<String>>,
        get_me: Mutex<Option<ApiResult<Value>>>,
        exhausted: CancellationToken,
    }

    impl FakeApi {
        fn new(batches: Vec<ApiResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
                sent: Mutex::new(Vec::new()),
                get_me: Mutex::new(Some(Ok(
                    json!({"id": 42, "is_bot": true, "first_name": "Bot", "username": "ferro_bot"}),
                ))),
                exhausted: CancellationToken::new(),
            })
        }
    }

    fn ok(result: Value) -> ApiResult<Vec<u8>> {
        Ok(serde_json::to_vec(&json!({"ok": true, "result": result})).unwrap())
    }

    #[async_trait]
    impl ApiClient for FakeApi {
        async fn request(&self, method: &str, params: Value) -> ApiResult<Vec<u8>> {
            match method {
                "getMe" => match self.get_me.lock().clone() {
                    Some(Ok(me)) => ok(me),
                    Some(Err(err)) => Err(err),
                    None => ok(Value::Null),
                },
                "getUpdates" => {
                    let next = self.batches.lock().pop_front();
                    match next {
                        Some(Ok(batch)) => ok(batch),
                        Some(Err(err)) => Err(err),
                        None => {
                            self.exhausted.cancel();
                            std::future::pending().await
                        }
                    }
                }
                "sendMessage" => {
                    self.sent
                        .lock()
                        .push(params["text"].as_str().unwrap_or_default().to_string());
                    ok(json!({"message_id": 1, "date": 0, "chat": {"id": params["chat_id"], "type": "private"}}))
                }
                other => panic!("unexpected method {other}"),
            }
        }
    }

    fn message(id: i64, text: &str) -> Value {
        json!({
            "update_id": id,
            "message": {
                "message_id": id,
                "date": 0,
                "chat": {"id": 5, "type": "private"},
                "from": {"id": 5, "first_name": "Ann"},
                "text": text
            }
        })
    }

    fn runtime(api: &Arc<FakeApi>, config: FerrogramConfig) -> FerrogramRuntime {
        FerrogramRuntime::from_config(config)
            .unwrap()
            .with_client(api.clone())
    }

    async fn echo(message: Message) -> String {
        message.text.unwrap_or_default()
    }

    #[tokio::test]
    async fn test_runs_until_shutdown_and_drains() {
        let api = FakeApi::new(vec![Ok(json!([
            message(1, "/start@ferro_bot"),
            message(2, "hello"),
        ]))]);
        let mut rt = runtime(&api, FerrogramConfig::default());
        rt.router_mut()
            .register_view(
                View::message()
                    .with_handler(Handler::new("start", || async { "welcome" }).rule(Command::new(["start"])))
                    .with_handler(Handler::new("echo", echo)),
            )
            .unwrap();

        let exhausted = api.exhausted.clone();
        assert_ok!(rt.run_until(async move { exhausted.cancelled().await }).await);

        assert_eq!(*api.sent.lock(), vec!["welcome".to_string(), "hello".to_string()]);
    }

    #[tokio::test]
    async fn test_fatal_get_me_aborts() {
        let api = FakeApi::new(Vec::new());
        *api.get_me.lock() = Some(Err(ApiError::from_code(401, "Unauthorized")));
        let rt = runtime(&api, FerrogramConfig::default());

        let err = rt.run_until(std::future::pending()).await.unwrap_err();
        assert!(err.is_fatal_api());
    }

    #[tokio::test]
    async fn test_fatal_poll_error_stops_runtime() {
        let api = FakeApi::new(vec![Err(ApiError::from_code(404, "Not Found"))]);
        let mut config = FerrogramConfig::default();
        config.bot.username = Some("ferro_bot".into());
        let rt = runtime(&api, config);
        assert_eq!(rt.router().bot_username(), Some("ferro_bot"));

        let err = rt.run_until(std::future::pending()).await.unwrap_err();
        assert!(err.is_fatal_api());
    }

    #[tokio::test]
    async fn test_raise_mode_stops_on_handler_error() {
        let api = FakeApi::new(vec![Ok(json!([message(1, "boom"), message(2, "later")]))]);
        let mut config = FerrogramConfig::default();
        config.errors.mode = ErrorMode::Raise;
        config.polling.concurrent_dispatch = false;
        let mut rt = runtime(&api, config);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        rt.router_mut()
            .register_view(View::message().with_handler(Handler::new("fail", move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(std::io::Error::other("boom"))
                }
            })))
            .unwrap();

        let err = rt.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Dispatch(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = FerrogramConfig::default();
        config.polling.limit = 0;
        assert!(FerrogramRuntime::from_config(config).is_err());
    }
}
