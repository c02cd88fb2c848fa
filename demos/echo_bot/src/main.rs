//! Echo Bot Example
//!
//! A small bot exercising the main pieces of ferrogram:
//!
//! - a message view with command, regex, fuzzy and chat-type rules
//! - a throttling `pre` middleware backed by an expiring store
//! - an auditing `post` middleware
//! - a two-step order conversation driven by FSM state
//! - a callback-query view for inline buttons
//!
//! # Usage
//!
//! ```bash
//! FERROGRAM_BOT__TOKEN=123:ABC cargo run --package echo-bot
//! cargo run --package echo-bot -- --config bot.toml --profile prod
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use ferrogram::core::update::CallbackQuery;
use ferrogram::framework::state::{ExpiringStore, MemoryExpiringStore};
use ferrogram::prelude::*;
use ferrogram::runtime::ConfigLoader;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo bot built on ferrogram")]
struct Args {
    /// Configuration file; defaults to ferrogram.toml in the working directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (dev, prod, ...)
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, overriding the configured one
    #[arg(long)]
    token: Option<String>,

    /// Dispatch updates one at a time
    #[arg(long)]
    sequential: bool,

    /// Minimum seconds between two messages from the same user
    #[arg(long, default_value_t = 1)]
    throttle_secs: u64,
}

// ============================================================================
// Middleware
// ============================================================================

/// Updates between two sweeps of the throttle store.
const PURGE_EVERY: u64 = 256;

/// Drops messages from users who wrote within the last `window`.
struct Throttle {
    seen: MemoryExpiringStore,
    window: Duration,
    checks: AtomicU64,
}

impl Throttle {
    fn new(window: Duration) -> Self {
        Self {
            seen: MemoryExpiringStore::new(),
            window,
            checks: AtomicU64::new(0),
        }
    }

    /// Expired entries of one-off senders are never read again.
    fn sweep(&self) {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let purged = self.seen.purge_expired();
            debug!(purged, remaining = self.seen.len(), "Swept throttle store");
        }
    }
}

#[async_trait]
impl Middleware for Throttle {
    async fn pre(&self, ctx: &DispatchContext) -> Result<bool, BoxError> {
        if self.window.is_zero() {
            return Ok(true);
        }
        let Some(user) = ctx.update().from() else {
            return Ok(true);
        };
        self.sweep();

        let key = format!("throttle:{}", user.id);
        if self.seen.get(&key).await?.is_some() {
            debug!(user_id = user.id, "Throttled");
            return Ok(false);
        }
        self.seen.set(&key, ContextValue::from(true), self.window).await?;
        Ok(true)
    }
}

/// Logs which handlers answered each update.
struct Audit;

#[async_trait]
impl Middleware for Audit {
    async fn post(
        &self,
        ctx: &DispatchContext,
        outcomes: &[HandlerOutcome],
    ) -> Result<(), BoxError> {
        for outcome in outcomes {
            debug!(
                update_id = ctx.update().update_id,
                handler = %outcome.handler,
                replied = outcome.response.is_some(),
                "Handler finished"
            );
        }
        Ok(())
    }
}

// ============================================================================
// Message handlers
// ============================================================================

async fn log_message(msg: Message) {
    let sender = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or("unknown");
    info!(
        chat_id = msg.chat.id,
        "[{:?}] {}: {}",
        msg.chat.kind,
        sender,
        msg.text_or_caption().unwrap_or("<no text>")
    );
}

async fn start(user: User) -> String {
    format!(
        "Hi {}! I repeat what you say. Send /help to see what else I can do.",
        user.first_name
    )
}

async fn help() -> &'static str {
    "/echo <text> - repeat text\n\
     /ping - check I'm alive\n\
     /order - place an order\n\
     /cancel - abandon the current order\n\
     /members - group chats only\n\
     roll <sides> - roll a die"
}

async fn ping() -> &'static str {
    "pong"
}

async fn echo(text: Binding<keys::ArgsText>) -> String {
    if text.is_empty() {
        "Usage: /echo <text>".to_string()
    } else {
        text.into_inner()
    }
}

async fn members(chat: Chat) -> String {
    format!(
        "This is {}.",
        chat.title.as_deref().unwrap_or("an untitled group")
    )
}

async fn roll(bindings: Bindings, msg: Message) -> Result<String, BoxError> {
    let sides: u64 = bindings.get_str("sides").unwrap_or("6").parse()?;
    if sides == 0 {
        return Ok("A die needs at least one side.".to_string());
    }
    // Not a real RNG; good enough for a demo.
    let value = (msg.message_id.unsigned_abs() ^ msg.date.unsigned_abs()) % sides + 1;
    Ok(format!("🎲 {value} (d{sides})"))
}

async fn thanks(ratio: Binding<keys::FuzzyRatio>) -> String {
    debug!(ratio = *ratio, "Matched thanks");
    "You're welcome!".to_string()
}

// ============================================================================
// Order conversation
// ============================================================================

const ORDER: &str = "order";

async fn order_start(fsm: FsmContext) -> Result<&'static str, BoxError> {
    fsm.set_with(&state_label(ORDER, "item"), Context::new())
        .await?;
    Ok("What would you like to order?")
}

async fn order_item(msg: Message, fsm: FsmContext) -> Result<String, BoxError> {
    let item = msg.text.unwrap_or_default();
    fsm.set_with(
        &state_label(ORDER, "address"),
        Context::new().with("item", item.as_str()),
    )
    .await?;
    Ok(format!("{item}, noted. Where should it go?"))
}

async fn order_address(
    msg: Message,
    state: StateRepr,
    fsm: FsmContext,
) -> Result<String, BoxError> {
    let item = state.payload.get_str("item").unwrap_or("something");
    let address = msg.text.unwrap_or_default();
    let reply = format!("Order placed: {item} to {address}.");
    fsm.finish().await?;
    Ok(reply)
}

async fn order_cancel(fsm: FsmContext) -> Result<&'static str, BoxError> {
    fsm.finish().await?;
    Ok("Order cancelled.")
}

// ============================================================================
// Callback queries
// ============================================================================

async fn vote(query: CallbackQuery, data: Binding<keys::CallbackData>) -> Option<String> {
    let choice = data.strip_prefix("vote:")?;
    Some(format!("{} voted {choice}", query.from.first_name))
}

fn message_view(throttle: Duration) -> Result<View> {
    let view = View::message()
        .with_middleware(Throttle::new(throttle))
        .with_middleware(Audit)
        .with_handler(Handler::new("log", log_message).blocking(false))
        .with_handler(Handler::new("start", start).rule(Command::new(["start"])))
        .with_handler(Handler::new("help", help).rule(Command::new(["help"])))
        .with_handler(Handler::new("ping", ping).rule(Command::new(["ping"])))
        .with_handler(Handler::new("echo", echo).rule(Command::new(["echo"])))
        .with_handler(
            Handler::new("members", members)
                .rule(Command::new(["members"]))
                .rule(ChatTypeIs::new([ChatType::Group, ChatType::Supergroup])),
        )
        .with_handler(
            Handler::new("order_cancel", order_cancel)
                .rule(Command::new(["cancel"]))
                .rule(StateGroup::new(ORDER)),
        )
        .with_handler(
            Handler::new("order_start", order_start)
                .rule(Command::new(["order"]))
                .rule(State::none()),
        )
        .with_handler(
            Handler::new("order_item", order_item)
                .rule(State::new([state_label(ORDER, "item")])),
        )
        .with_handler(
            Handler::new("order_address", order_address)
                .rule(State::new([state_label(ORDER, "address")])),
        )
        .with_handler(
            Handler::new("roll", roll).rule(Regex::new(r"^roll (?P<sides>\d{1,6})$")?),
        )
        .with_handler(
            Handler::new("thanks", thanks)
                .rule(Fuzzy::new(["thanks", "thank you"]).min_ratio(0.8)),
        );
    Ok(view)
}

fn callback_view() -> View {
    View::callback_query()
        .with_handler(Handler::new("vote", vote).rule(CallbackData::prefix("vote:")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }

    let mut config = loader.load()?;
    if let Some(token) = args.token {
        config.bot.token = Some(token);
    }
    if args.sequential {
        config.polling.concurrent_dispatch = false;
    }

    let mut runtime = FerrogramRuntime::from_config(config)?;
    let router = runtime.router_mut();
    router.register_view(message_view(Duration::from_secs(args.throttle_secs))?)?;
    router.register_view(callback_view())?;

    info!(views = runtime.router().view_count(), "Echo bot starting");
    runtime.run().await?;
    info!("Echo bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttle_sweeps_expired_senders() {
        let throttle = Throttle::new(Duration::from_millis(1));
        for user in 0..10 {
            throttle
                .seen
                .set(&format!("throttle:{user}"), true.into(), throttle.window)
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        for _ in 0..PURGE_EVERY - 1 {
            throttle.sweep();
        }
        assert_eq!(throttle.seen.len(), 10);

        throttle.sweep();
        assert!(throttle.seen.is_empty());
    }
}
