//! Hands polled updates to the [`Router`].
//!
//! In concurrent mode every update runs on its own task, so a slow handler
//! never holds up the next fetch. Updates sharing a conversation key are
//! still handled one after another, in the order they were polled; updates
//! without a key are not serialized.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, error};

use ferrogram_core::{ApiError, BoxedClient, Update};
use ferrogram_framework::state::{StateKeyFn, default_state_key};
use ferrogram_framework::{DispatchError, Router};

use crate::error::{RuntimeError, RuntimeResult};
use crate::poller::UpdateSink;

// =============================================================================
// ConversationLocks
// =============================================================================

struct Slot {
    seq: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct LocksInner {
    next_seq: u64,
    slots: HashMap<String, Slot>,
}

/// Per-conversation FIFO ordering.
///
/// [`queue`](Self::queue) is called synchronously in arrival order and hands
/// back a [`ConversationTurn`] chained behind the previous turn for the same
/// key. A turn becomes ready once its predecessor is dropped.
#[derive(Default)]
pub struct ConversationLocks {
    inner: Mutex<LocksInner>,
}

impl ConversationLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the next turn for `key`.
    pub fn queue(self: &Arc<Self>, key: impl Into<String>) -> ConversationTurn {
        let key = key.into();
        let (tx, rx) = oneshot::channel();

        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let previous = inner.slots.insert(key.clone(), Slot { seq, done: rx });

        ConversationTurn {
            locks: Arc::clone(self),
            key,
            seq,
            previous: previous.map(|slot| slot.done),
            done: Some(tx),
        }
    }

    /// Number of conversations with a turn outstanding.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str, seq: u64) {
        let mut inner = self.inner.lock();
        if inner.slots.get(key).is_some_and(|slot| slot.seq == seq) {
            inner.slots.remove(key);
        }
    }
}

/// One place in a conversation's queue. Dropping it lets the next turn run.
pub struct ConversationTurn {
    locks: Arc<ConversationLocks>,
    key: String,
    seq: u64,
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

impl ConversationTurn {
    /// Waits until every earlier turn for the same key has finished.
    pub async fn ready(&mut self) {
        if let Some(previous) = self.previous.take() {
            // A dropped sender also means the predecessor is finished.
            let _ = previous.await;
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ConversationTurn {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        self.locks.release(&self.key, self.seq);
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Whether updates are handled inline or on spawned tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    Concurrent,
}

/// [`UpdateSink`] that routes updates through a [`Router`].
///
/// In raise mode the first dispatch error is kept, `shutdown` is cancelled
/// and the error is returned from [`drain`](Self::drain).
pub struct Dispatcher {
    router: Arc<Router>,
    client: BoxedClient,
    mode: DispatchMode,
    key_fn: StateKeyFn,
    locks: Arc<ConversationLocks>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    failure: Arc<Mutex<Option<DispatchError>>>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, client: BoxedClient, mode: DispatchMode) -> Self {
        Self {
            router,
            client,
            mode,
            key_fn: Arc::new(default_state_key),
            locks: ConversationLocks::new(),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Overrides the key used to serialize updates of one conversation.
    pub fn with_key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Update) -> Option<String> + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(f);
        self
    }

    /// Cancelled when a dispatch error is raised on a spawned task.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Number of dispatch tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for all spawned dispatches to finish and returns the raised
    /// error, if any.
    pub async fn drain(&self) -> RuntimeResult<()> {
        self.tasks.close();
        debug!(in_flight = self.tasks.len(), "Draining dispatch tasks");
        self.tasks.wait().await;
        self.tasks.reopen();
        match self.failure.lock().take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn spawn(&self, update: Update) {
        let router = Arc::clone(&self.router);
        let client = Arc::clone(&self.client);
        let failure = Arc::clone(&self.failure);
        let shutdown = self.shutdown.clone();
        let mut turn = (self.key_fn)(&update).map(|key| self.locks.queue(key));
        let span = debug_span!("task", update_id = update.update_id);

        self.tasks.spawn(
            async move {
                if let Some(turn) = turn.as_mut() {
                    turn.ready().await;
                }
                if let Err(err) = router.route(update, client).await {
                    error!(error = %err, "Dispatch error raised, shutting down");
                    {
                        let mut failure = failure.lock();
                        if failure.is_none() {
                            *failure = Some(err);
                        }
                    }
                    shutdown.cancel();
                }
                drop(turn);
            }
            .instrument(span),
        );
    }
}

#[async_trait]
impl UpdateSink for Dispatcher {
    async fn deliver(&self, update: Update) -> RuntimeResult<()> {
        match self.mode {
            DispatchMode::Sequential => {
                self.router.route(update, Arc::clone(&self.client)).await?;
                Ok(())
            }
            DispatchMode::Concurrent => {
                if self.failure.lock().is_some() {
                    return self.drain().await;
                }
                self.spawn(update);
                Ok(())
            }
        }
    }

    fn report(&self, err: &ApiError) -> RuntimeResult<()> {
        self.router
            .error_handler()
            .handle(err.clone())
            .map_err(RuntimeError::from)
    }
}
