//! Cosmetic progress indicator for uploads.
//!
//! The percentage shown while an image is being prepared does **not** measure
//! real I/O. A fixed-interval timer bumps it by a constant step until it
//! reaches 100; one tick later the indicator is marked done and, after a short
//! delay, the completion callback receives the real work's output. The real
//! work (typically reading and encoding the upload) runs concurrently, and the
//! callback waits for both.
//!
//! The state is a plain value ([`ProgressState`]) published on a
//! `tokio::sync::watch` channel, so a UI can render it however it likes. The
//! clock is the [`Ticker`] trait: [`IntervalTicker`] uses tokio timers and
//! tests inject a ticker that returns immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use roomify_render::progress::{IntervalTicker, ProgressConfig, ProgressProxy};
//!
//! # async fn demo() {
//! let config = ProgressConfig::default();
//! let proxy = ProgressProxy::new(IntervalTicker::new(config.interval()), config);
//! let mut updates = proxy.subscribe();
//! tokio::spawn(async move {
//!     while updates.changed().await.is_ok() {
//!         let state = *updates.borrow();
//!         eprintln!("{}%", state.percent);
//!     }
//! });
//! proxy
//!     .run_then(async { "encoded" }, |encoded| println!("done: {encoded}"))
//!     .await;
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Timer period between progress bumps.
pub const PROGRESS_INTERVAL_MS: u64 = 100;
/// Percentage added per tick.
pub const PROGRESS_STEP: u8 = 5;
/// Pause between reaching 100 % and firing the completion callback.
pub const COMPLETION_DELAY_MS: u64 = 600;

/// Cadence of the progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub interval_ms: u64,
    pub step: u8,
    pub completion_delay_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: PROGRESS_INTERVAL_MS,
            step: PROGRESS_STEP,
            completion_delay_ms: COMPLETION_DELAY_MS,
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// What the UI shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// 0–100.
    pub percent: u8,
    /// Set on the first tick that finds `percent` already at 100.
    pub done: bool,
}

impl ProgressState {
    /// Apply one timer tick. Returns `true` once the indicator is done.
    pub fn advance(&mut self, step: u8) -> bool {
        if self.percent >= 100 {
            self.done = true;
        } else {
            self.percent = self.percent.saturating_add(step).min(100);
        }
        self.done
    }
}

/// Source of timer ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick.
    async fn tick(&mut self);

    /// Wait for `duration`.
    async fn sleep(&mut self, duration: Duration);
}

/// [`Ticker`] backed by `tokio::time`.
///
/// The first tick fires one full period after creation, not immediately.
/// A zero period is raised to one millisecond.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives a [`ProgressState`] on a [`Ticker`] alongside real work.
pub struct ProgressProxy<T> {
    ticker: T,
    config: ProgressConfig,
    state: watch::Sender<ProgressState>,
}

impl<T: Ticker> ProgressProxy<T> {
    pub fn new(ticker: T, config: ProgressConfig) -> Self {
        let (state, _) = watch::channel(ProgressState::default());
        Self {
            ticker,
            config,
            state,
        }
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    /// Run `work` and the indicator together; return once both have finished
    /// and the completion delay has elapsed.
    pub async fn run<Fut>(self, work: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        let Self {
            mut ticker,
            config,
            state,
        } = self;
        let step = config.step.max(1);

        let timer = async {
            let mut current = ProgressState::default();
            loop {
                ticker.tick().await;
                let finished = current.advance(step);
                state.send_replace(current);
                if finished {
                    break;
                }
            }
        };

        let (output, ()) = tokio::join!(work, timer);
        ticker.sleep(config.completion_delay()).await;
        output
    }

    /// [`Self::run`], then hand the output to `on_complete`.
    pub async fn run_then<Fut, F>(self, work: Fut, on_complete: F)
    where
        Fut: Future,
        F: FnOnce(Fut::Output),
    {
        let output = self.run(work).await;
        on_complete(output);
    }
}
