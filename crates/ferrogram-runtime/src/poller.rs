//! Long-poll loop feeding updates to an [`UpdateSink`].
//!
//! One fetch is in flight at a time. The cursor (`offset`) only moves
//! forward: it becomes `update_id + 1` as each update is handed off, so a
//! failed fetch is retried from the same position.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use ferrogram_core::{
    ApiClientExt, ApiError, ApiResult, BoxedClient, GetUpdates, Update, UpdateType,
};

use crate::config::PollingConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Receives the updates fetched by a [`PollLoop`].
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Takes ownership of one update. An error stops the loop.
    async fn deliver(&self, update: Update) -> RuntimeResult<()>;

    /// Reports a recoverable polling failure. An error stops the loop.
    fn report(&self, err: &ApiError) -> RuntimeResult<()> {
        warn!(error = %err, "Polling error");
        Ok(())
    }
}

/// Lifecycle of a [`PollLoop`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Stopped,
}

/// Fetch parameters and retry policy.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub timeout_secs: u64,
    pub limit: u32,
    pub allowed_updates: Vec<UpdateType>,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default(), Vec::new())
    }
}

impl PollOptions {
    /// Builds options from config; `allowed_updates` from config wins over
    /// `default_kinds`.
    pub fn from_config(config: &PollingConfig, default_kinds: Vec<UpdateType>) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            limit: config.limit,
            allowed_updates: config.allowed_updates.clone().unwrap_or(default_kinds),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_retry_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }
}

/// The fetch loop.
pub struct PollLoop {
    client: BoxedClient,
    options: PollOptions,
    offset: Option<i64>,
    state: PollState,
    backoff: Duration,
}

impl PollLoop {
    pub fn new(client: BoxedClient, options: PollOptions) -> Self {
        let backoff = options.retry_delay;
        Self {
            client,
            options,
            offset: None,
            state: PollState::Running,
            backoff,
        }
    }

    /// Next `update_id` to request, once any update has been seen.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Moves the loop to `Stopped`.
    pub fn stop(&mut self) {
        self.state = PollState::Stopped;
    }

    fn request(&self) -> GetUpdates {
        GetUpdates {
            offset: self.offset,
            limit: Some(self.options.limit),
            timeout_secs: Some(self.options.timeout_secs),
            allowed_updates: self.options.allowed_updates.clone(),
        }
    }

    /// Fetches and delivers a single batch.
    ///
    /// Fetch errors are returned as [`RuntimeError::Api`]; fatal ones also
    /// stop the loop. Returns the number of updates delivered.
    pub async fn poll_once(&mut self, sink: &dyn UpdateSink) -> RuntimeResult<usize> {
        if self.state == PollState::Stopped {
            return Err(RuntimeError::Stopped);
        }
        let request = self.request();
        let fetched = self.client.get_updates(&request).await;
        self.on_fetched(fetched, sink).await
    }

    /// Polls until cancelled, stopped by a fatal error, or stopped by the
    /// sink.
    ///
    /// Cancellation interrupts a pending fetch or retry delay, never a
    /// delivery in progress.
    pub async fn run(
        &mut self,
        sink: &dyn UpdateSink,
        cancel: CancellationToken,
    ) -> RuntimeResult<()> {
        info!(
            kinds = ?self.options.allowed_updates,
            timeout_secs = self.options.timeout_secs,
            "Poll loop started"
        );

        while self.state == PollState::Running {
            let request = self.request();
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                fetched = self.client.get_updates(&request) => fetched,
            };

            match self.on_fetched(fetched, sink).await {
                Ok(_) => {}
                Err(RuntimeError::Api(err)) if self.state == PollState::Running => {
                    if let Err(e) = sink.report(&err) {
                        self.stop();
                        return Err(e);
                    }
                    let delay = self.next_delay(&err);
                    warn!(error = %err, delay_ms = delay.as_millis() as u64, "Fetch failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    self.stop();
                    return Err(err);
                }
            }
        }

        self.stop();
        info!(offset = ?self.offset, "Poll loop stopped");
        Ok(())
    }

    async fn on_fetched(
        &mut self,
        fetched: ApiResult<Vec<Value>>,
        sink: &dyn UpdateSink,
    ) -> RuntimeResult<usize> {
        match fetched {
            Ok(batch) => {
                self.backoff = self.options.retry_delay;
                let delivered = self.deliver_batch(batch, sink).await;
                if delivered.is_err() {
                    self.stop();
                }
                delivered
            }
            Err(err) if err.is_fatal() => {
                error!(error = %err, "Bot credentials rejected, stopping poll loop");
                self.stop();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn deliver_batch(
        &mut self,
        batch: Vec<Value>,
        sink: &dyn UpdateSink,
    ) -> RuntimeResult<usize> {
        if batch.is_empty() {
            trace!("Empty batch");
            return Ok(0);
        }

        let mut entries: Vec<(Option<i64>, Value)> = batch
            .into_iter()
            .map(|raw| (raw.get("update_id").and_then(Value::as_i64), raw))
            .collect();
        entries.sort_by_key(|(id, _)| *id);

        let mut delivered = 0;
        for (id, raw) in entries {
            if let (Some(id), Some(offset)) = (id, self.offset)
                && id < offset
            {
                debug!(update_id = id, offset, "Skipping already delivered update");
                continue;
            }

            if let Some(id) = id
                && !Update::carries_known_kind(&raw)
            {
                self.advance(id);
                debug!(update_id = id, "Skipping update of an unknown kind");
                continue;
            }

            match Update::from_value(raw) {
                Ok(update) => {
                    self.advance(update.update_id);
                    sink.deliver(update).await?;
                    delivered += 1;
                }
                Err(err) => {
                    if let Some(id) = id {
                        self.advance(id);
                    }
                    warn!(update_id = ?id, error = %err, "Skipping malformed update");
                    sink.report(&ApiError::from(err))?;
                }
            }
        }

        debug!(delivered, offset = ?self.offset, "Batch delivered");
        Ok(delivered)
    }

    fn advance(&mut self, update_id: i64) {
        let next = update_id + 1;
        if self.offset.is_none_or(|offset| next > offset) {
            self.offset = Some(next);
        }
    }

    /// Server-requested delay if any, otherwise the doubling backoff.
    fn next_delay(&mut self, err: &ApiError) -> Duration {
        let backoff = self.backoff;
        self.backoff = (backoff * 2).min(self.options.max_retry_delay);
        err.retry_after().map_or(backoff, Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use ferrogram_core::ApiClient;

    /// Serves scripted batches, then cancels `done` once the script runs out.
    struct ScriptedClient {
        script: Mutex<VecDeque<ApiResult<Value>>>,
        requests: Mutex<Vec<Value>>,
        done: CancellationToken,
    }

    impl ScriptedClient {
        fn new(script: Vec<ApiResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
                done: CancellationToken::new(),
            })
        }

        fn offsets(&self) -> Vec<Option<i64>> {
            self.requests
                .lock()
                .iter()
                .map(|p| p.get("offset").and_then(Value::as_i64))
                .collect()
        }
    }

    #[async_trait]
    impl ApiClient for ScriptedClient {
        async fn request(&self, method: &str, params: Value) -> ApiResult<Vec<u8>> {
            assert_eq!(method, "getUpdates");
            self.requests.lock().push(params);
            let next = self.script.lock().pop_front();
            match next {
                Some(Ok(result)) => Ok(serde_json::to_vec(&json!({"ok": true, "result": result}))
                    .unwrap()),
                Some(Err(err)) => Err(err),
                None => {
                    self.done.cancel();
                    Ok(br#"{"ok":true,"result":[]}"#.to_vec())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<i64>>,
        reported: AtomicUsize,
    }

    #[async_trait]
    impl UpdateSink for RecordingSink {
        async fn deliver(&self, update: Update) -> RuntimeResult<()> {
            self.delivered.lock().push(update.update_id);
            Ok(())
        }

        fn report(&self, _err: &ApiError) -> RuntimeResult<()> {
            self.reported.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn message(id: i64) -> Value {
        json!({
            "update_id": id,
            "message": {
                "message_id": id,
                "date": 0,
                "chat": {"id": 1, "type": "private"},
                "from": {"id": 1, "first_name": "Ann"},
                "text": "hi"
            }
        })
    }

    fn poll_loop(client: &Arc<ScriptedClient>) -> PollLoop {
        PollLoop::new(client.clone(), PollOptions::default())
    }

    #[tokio::test]
    async fn test_cursor_follows_delivered_updates() {
        let client = ScriptedClient::new(vec![
            Ok(json!([message(5), message(6)])),
            Ok(json!([message(7)])),
        ]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        assert_ok!(poller.run(&sink, client.done.clone()).await);

        assert_eq!(*sink.delivered.lock(), vec![5, 6, 7]);
        assert_eq!(poller.offset(), Some(8));
        assert_eq!(client.offsets(), vec![None, Some(7), Some(8)]);
        assert_eq!(poller.state(), PollState::Stopped);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_without_refetch() {
        let client = ScriptedClient::new(vec![
            Err(ApiError::from_code(401, "Unauthorized")),
            Ok(json!([message(1)])),
        ]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        let err = poller.run(&sink, CancellationToken::new()).await.unwrap_err();

        assert!(err.is_fatal_api());
        assert_eq!(poller.state(), PollState::Stopped);
        assert_eq!(client.requests.lock().len(), 1);
        assert!(sink.delivered.lock().is_empty());
        assert!(matches!(
            poller.poll_once(&sink).await,
            Err(RuntimeError::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_error_retries_same_offset() {
        let client = ScriptedClient::new(vec![
            Ok(json!([message(1)])),
            Err(ApiError::Timeout),
            Err(ApiError::TooManyRequests { retry_after: 3 }),
            Ok(json!([message(2)])),
        ]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        let started = tokio::time::Instant::now();
        assert_ok!(poller.run(&sink, client.done.clone()).await);

        assert_eq!(*sink.delivered.lock(), vec![1, 2]);
        assert_eq!(sink.reported.load(Ordering::SeqCst), 2);
        assert_eq!(
            client.offsets(),
            vec![None, Some(2), Some(2), Some(2), Some(3)]
        );
        // 1s backoff, then the server's 3s.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_redelivered_and_malformed_updates_are_skipped() {
        let client = ScriptedClient::new(vec![
            Ok(json!([message(10)])),
            Ok(json!([
                message(9),
                message(10),
                {"update_id": 11, "message": {"text": "no chat"}},
                message(12),
            ])),
        ]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        assert_ok!(poller.run(&sink, client.done.clone()).await);

        assert_eq!(*sink.delivered.lock(), vec![10, 12]);
        assert_eq!(sink.reported.load(Ordering::SeqCst), 1);
        assert_eq!(poller.offset(), Some(13));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_skipped_without_report() {
        let client = ScriptedClient::new(vec![Ok(json!([
            message(1),
            {"update_id": 2, "message_reaction": {"chat": {"id": 1}, "new_reaction": []}},
            {"update_id": 3, "chat_boost": {"chat": {"id": 1}}},
        ]))]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        assert_eq!(assert_ok!(poller.poll_once(&sink).await), 1);
        assert_eq!(*sink.delivered.lock(), vec![1]);
        assert_eq!(sink.reported.load(Ordering::SeqCst), 0);
        assert_eq!(poller.offset(), Some(4));
    }

    #[tokio::test]
    async fn test_batch_is_delivered_in_id_order() {
        let client = ScriptedClient::new(vec![Ok(json!([message(3), message(1), message(2)]))]);
        let sink = RecordingSink::default();
        let mut poller = poll_loop(&client);

        assert_eq!(assert_ok!(poller.poll_once(&sink).await), 3);
        assert_eq!(*sink.delivered.lock(), vec![1, 2, 3]);
        assert_eq!(poller.offset(), Some(4));
    }

    #[tokio::test]
    async fn test_sink_error_stops_loop() {
        struct FailingSink;

        #[async_trait]
        impl UpdateSink for FailingSink {
            async fn deliver(&self, _update: Update) -> RuntimeResult<()> {
                Err(RuntimeError::NoClient("test"))
            }
        }

        let client = ScriptedClient::new(vec![Ok(json!([message(1), message(2)]))]);
        let mut poller = poll_loop(&client);

        assert_err!(poller.run(&FailingSink, CancellationToken::new()).await);
        assert_eq!(poller.state(), PollState::Stopped);
        assert_eq!(poller.offset(), Some(2));
    }

    #[tokio::test]
    async fn test_request_parameters() {
        let client = ScriptedClient::new(vec![Ok(json!([]))]);
        let options = PollOptions {
            allowed_updates: vec![UpdateType::Message, UpdateType::CallbackQuery],
            ..PollOptions::default()
        };
        let mut poller = PollLoop::new(client.clone(), options);

        assert_eq!(assert_ok!(poller.poll_once(&RecordingSink::default()).await), 0);

        let params = client.requests.lock()[0].clone();
        assert_eq!(params["timeout"], 30);
        assert_eq!(params["limit"], 100);
        assert_eq!(params["allowed_updates"], json!(["message", "callback_query"]));
        assert!(params.get("offset").is_none());
    }
}
