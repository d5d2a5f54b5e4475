//! Tick sources: the clocks a watch observes.
//!
//! A [`TickSource`] is one run of a clock. The watch builds a fresh source on
//! every start through a [`DeviceFactory`], hands it a [`Feed`] and from then
//! on only listens. Sources report through the feed with [`Reading`]s: raw
//! ticks carrying the elapsed or remaining time, and changes of their
//! suspended and finished flags.
//!
//! Feeds are stamped with a generation. Once the watch moves on to a newer
//! source the old feed is detached: [`Feed::send`] returns `false` and the
//! watch drops anything that was already in flight.
//!
//! [`TimerDevice`] is the stock source, ticking on a tokio interval.
//!
//! # Custom sources
//!
//! ```rust
//! use bubbletea_watch::device::{DeviceConfig, Feed, Reading, TickSource};
//! use std::time::Duration;
//!
//! /// A source that never moves.
//! struct Frozen {
//!     feed: Option<Feed>,
//!     suspended: bool,
//! }
//!
//! impl TickSource for Frozen {
//!     fn run(&mut self, feed: Feed) {
//!         feed.send(Reading::Tick(Duration::ZERO));
//!         self.feed = Some(feed);
//!     }
//!
//!     fn interrupt(&mut self) {
//!         self.suspended = true;
//!         if let Some(feed) = &self.feed {
//!             feed.send(Reading::Suspended(true));
//!         }
//!     }
//!
//!     fn value(&self) -> Duration {
//!         Duration::ZERO
//!     }
//!
//!     fn is_suspended(&self) -> bool {
//!         self.suspended
//!     }
//!
//!     fn is_finished(&self) -> bool {
//!         false
//!     }
//! }
//!
//! let factory = |_config: DeviceConfig| {
//!     Box::new(Frozen { feed: None, suspended: false }) as Box<dyn TickSource>
//! };
//! # let _ = bubbletea_watch::watch::with_factory(factory);
//! ```

use crate::watch::Inbox;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// How often the stock device publishes a tick.
pub const DEFAULT_REFRESH_RATE: Duration = Duration::from_millis(100);

const MIN_REFRESH_RATE: Duration = Duration::from_millis(1);

// Deadlines past this are clamped; roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Which way a source counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Elapsed time since the run began.
    Up,
    /// Time left until the deadline.
    Down,
}

/// Construction parameters for one source run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Counting direction.
    pub direction: Direction,
    /// Absolute deadline for countdowns; `None` when counting up.
    pub deadline: Option<Instant>,
}

impl DeviceConfig {
    /// Counts up from zero with no deadline.
    pub fn up() -> Self {
        Self {
            direction: Direction::Up,
            deadline: None,
        }
    }

    /// Counts down toward an absolute deadline.
    pub fn down(deadline: Instant) -> Self {
        Self {
            direction: Direction::Down,
            deadline: Some(deadline),
        }
    }

    /// Counts down `target` from now. Targets too far out for the clock are
    /// clamped to a deadline decades away.
    pub fn countdown(target: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(target)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self::down(deadline)
    }

    /// Picks [`countdown`](Self::countdown) for a target and [`up`](Self::up)
    /// without one.
    pub fn for_target(target: Option<Duration>) -> Self {
        match target {
            Some(target) => Self::countdown(target),
            None => Self::up(),
        }
    }
}

/// Something a source reports to the watch observing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Raw clock value: elapsed time counting up, remaining time counting down.
    Tick(Duration),
    /// The suspended flag changed.
    Suspended(bool),
    /// The finished flag changed.
    Finished(bool),
}

/// Channel from one source run back to its watch.
///
/// Cloning is cheap. A feed does not keep its watch alive.
#[derive(Debug, Clone)]
pub struct Feed {
    generation: u64,
    current: Arc<AtomicU64>,
    inbox: WeakUnboundedSender<Inbox>,
}

impl Feed {
    pub(crate) fn new(
        generation: u64,
        current: Arc<AtomicU64>,
        inbox: WeakUnboundedSender<Inbox>,
    ) -> Self {
        Self {
            generation,
            current,
            inbox,
        }
    }

    /// Run number this feed belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the watch still listens to this feed. Turns false for good
    /// once the watch starts a newer source or shuts down.
    pub fn is_attached(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
            && self.inbox.upgrade().is_some_and(|inbox| !inbox.is_closed())
    }

    /// Reports a reading. Returns `false` if nobody listens any more, which
    /// is the source's cue to stop producing.
    pub fn send(&self, reading: Reading) -> bool {
        if !self.is_attached() {
            trace!(generation = self.generation, ?reading, "feed detached");
            return false;
        }
        self.deliver(reading)
    }

    // Skips the attachment check; the watch still filters by generation.
    pub(crate) fn deliver(&self, reading: Reading) -> bool {
        match self.inbox.upgrade() {
            Some(inbox) => inbox
                .send(Inbox::Reading {
                    generation: self.generation,
                    reading,
                })
                .is_ok(),
            None => false,
        }
    }
}

/// One run of a clock, as observed by a watch.
///
/// Implementations are built already configured, are run at most once, and
/// are never reused: the watch discards them without interrupting when it
/// starts a newer run. [`run`](Self::run) is called from within a tokio
/// runtime.
pub trait TickSource: Send {
    /// Begins producing readings into `feed`.
    fn run(&mut self, feed: Feed);

    /// Pauses production and raises the suspended flag.
    fn interrupt(&mut self);

    /// Latest raw value.
    fn value(&self) -> Duration;

    /// Current suspended flag.
    fn is_suspended(&self) -> bool;

    /// Current finished flag; true once a countdown reached its deadline.
    fn is_finished(&self) -> bool;
}

/// Builds the source for each new run.
pub trait DeviceFactory: Send + Sync {
    /// Creates a fresh, not yet running source.
    fn build(&self, config: DeviceConfig) -> Box<dyn TickSource>;
}

impl<F> DeviceFactory for F
where
    F: Fn(DeviceConfig) -> Box<dyn TickSource> + Send + Sync,
{
    fn build(&self, config: DeviceConfig) -> Box<dyn TickSource> {
        self(config)
    }
}

/// Factory for [`TimerDevice`]s sharing one refresh rate.
#[derive(Debug, Clone, Copy)]
pub struct TimerDeviceFactory {
    refresh_rate: Duration,
}

impl TimerDeviceFactory {
    /// Creates a factory whose devices tick every `refresh_rate`.
    pub fn new(refresh_rate: Duration) -> Self {
        Self { refresh_rate }
    }

    /// Tick period of the devices this factory builds.
    pub fn refresh_rate(&self) -> Duration {
        self.refresh_rate
    }
}

impl Default for TimerDeviceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_RATE)
    }
}

impl DeviceFactory for TimerDeviceFactory {
    fn build(&self, config: DeviceConfig) -> Box<dyn TickSource> {
        Box::new(TimerDevice::new(config, self.refresh_rate))
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    value: Duration,
    suspended: bool,
    finished: bool,
}

/// Stock tick source driven by a tokio interval.
///
/// Counting up it reports the time since [`run`](TickSource::run); counting
/// down it reports the time left until the deadline and finishes when that
/// reaches zero. The ticking task ends on interrupt, on finishing, or once
/// its feed is detached.
#[derive(Debug)]
pub struct TimerDevice {
    config: DeviceConfig,
    refresh_rate: Duration,
    state: Arc<Mutex<DeviceState>>,
    feed: Option<Feed>,
    task: Option<JoinHandle<()>>,
}

impl TimerDevice {
    /// Creates an idle device. A countdown starts out showing its full
    /// remaining time.
    pub fn new(config: DeviceConfig, refresh_rate: Duration) -> Self {
        let value = match config.deadline {
            Some(deadline) if config.direction == Direction::Down => {
                deadline.saturating_duration_since(Instant::now())
            }
            _ => Duration::ZERO,
        };
        Self {
            config,
            refresh_rate,
            state: Arc::new(Mutex::new(DeviceState {
                value,
                ..DeviceState::default()
            })),
            feed: None,
            task: None,
        }
    }

    /// Configuration this device was built with.
    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TickSource for TimerDevice {
    fn run(&mut self, feed: Feed) {
        if self.task.is_some() {
            return;
        }
        {
            let state = self.state();
            if state.suspended || state.finished {
                return;
            }
        }

        let config = self.config;
        let state = Arc::clone(&self.state);
        let period = self.refresh_rate.max(MIN_REFRESH_RATE);
        self.feed = Some(feed.clone());

        self.task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let (value, finished) = match config.deadline {
                    Some(deadline) if config.direction == Direction::Down => {
                        let remaining = deadline.saturating_duration_since(now);
                        (remaining, remaining.is_zero())
                    }
                    _ => (now.saturating_duration_since(started), false),
                };

                {
                    let mut state = lock(&state);
                    state.value = value;
                    state.finished = finished;
                }

                if !feed.send(Reading::Tick(value)) {
                    break;
                }
                if finished {
                    feed.send(Reading::Finished(true));
                    break;
                }
            }
            trace!(generation = feed.generation(), "device stopped ticking");
        }));
    }

    fn interrupt(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        {
            let mut state = self.state();
            if state.finished || state.suspended {
                return;
            }
            state.suspended = true;
        }
        if let Some(feed) = &self.feed {
            feed.send(Reading::Suspended(true));
        }
    }

    fn value(&self) -> Duration {
        self.state().value
    }

    fn is_suspended(&self) -> bool {
        self.state().suspended
    }

    fn is_finished(&self) -> bool {
        self.state().finished
    }
}
