//! Reactive subscription model for background work.
//!
//! Each subscription declares its own poll interval and is driven by the
//! same loop in [`spawn_subscriptions`]. Adding a job only requires
//! implementing [`ReactiveSubscription`].

use std::sync::Arc;
use std::time::Duration;

use crate::engine::background::SchedulerState;
use crate::AppState;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A job the scheduler loop polls on a fixed interval.
#[async_trait::async_trait]
pub trait ReactiveSubscription: Send + Sync + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// How often this subscription should be polled.
    fn interval(&self) -> Duration;

    /// Optional delay before the first poll.
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Execute one poll cycle. Errors are logged internally; the loop
    /// continues regardless.
    async fn tick(&self);
}

// ---------------------------------------------------------------------------
// Concrete subscriptions
// ---------------------------------------------------------------------------

/// Materializes upcoming bill instances from active templates.
pub struct GenerationSubscription {
    pub state: Arc<AppState>,
}

#[async_trait::async_trait]
impl ReactiveSubscription for GenerationSubscription {
    fn name(&self) -> &'static str {
        "bill_generation"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.state.config.generation.interval_secs)
    }

    /// The daemon runs one pass itself at start-up.
    fn initial_delay(&self) -> Duration {
        self.interval()
    }

    async fn tick(&self) {
        super::background::generation_tick(&self.state).await;
    }
}

// ---------------------------------------------------------------------------
// Scheduler loop
// ---------------------------------------------------------------------------

/// Run a single subscription in its own task, respecting initial delay,
/// interval, and the scheduler's running flag.
async fn run_single(sub: Box<dyn ReactiveSubscription>, scheduler: Arc<SchedulerState>) {
    let name = sub.name();
    let delay = sub.initial_delay();
    if !delay.is_zero() {
        tracing::debug!(subscription = name, delay_secs = ?delay.as_secs(), "Delaying initial poll");
        tokio::time::sleep(delay).await;
    }

    let mut interval = tokio::time::interval(sub.interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if !scheduler.is_running() {
            break;
        }
        sub.tick().await;
    }
    tracing::info!(subscription = name, "Subscription loop exited");
}

/// Spawn every subscription as an independent tokio task.
pub fn spawn_subscriptions(
    subscriptions: Vec<Box<dyn ReactiveSubscription>>,
    scheduler: Arc<SchedulerState>,
) -> Vec<tokio::task::JoinHandle<()>> {
    subscriptions
        .into_iter()
        .map(|sub| tokio::spawn(run_single(sub, scheduler.clone())))
        .collect()
}
