//! The watch: a countdown or stopwatch whose state follows its current clock.
//!
//! A watch is an actor. [`new`] spawns it on the current tokio runtime and
//! returns a [`WatchHandle`]. Everything the handle does becomes a message in
//! the actor's inbox, and readings from the running [`TickSource`] arrive in
//! the same inbox. The actor applies messages one at a time and afterwards
//! publishes a complete [`Snapshot`], so observers never see a half-applied
//! change.
//!
//! # State
//!
//! * **target text**: whatever the user typed; re-parsed into the *pending
//!   target* on every edit that actually changes it.
//! * **committed target**: the pending target as it was when the current run
//!   started. `None` means the run counts up.
//! * **display text**: the current source's latest tick, formatted with
//!   [`duration::encode`](crate::duration::encode); empty before the first
//!   start.
//! * **running / suspended / finished**: running is true once a source
//!   exists; the other two mirror the current source only.
//!
//! Starting again replaces the source. The old one is not interrupted, it is
//! just no longer heard: its feed detaches and any reading of it still in
//! flight is dropped on arrival.
//!
//! # Examples
//!
//! ```rust
//! use bubbletea_watch::watch::{new, with_refresh_rate};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bubbletea_watch::error::Result<()> {
//! let watch = new(1, &[with_refresh_rate(Duration::from_millis(250))]);
//!
//! watch.set_target_text("1:30");
//! watch.start();
//!
//! let snapshot = watch.snapshot().await?;
//! assert!(snapshot.is_running);
//! assert_eq!(snapshot.committed_target, Some(Duration::from_secs(90)));
//! assert_eq!(snapshot.display_text, "1:30");
//!
//! watch.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::device::{DeviceConfig, DeviceFactory, Feed, Reading, TickSource, TimerDeviceFactory};
use crate::device::DEFAULT_REFRESH_RATE;
use crate::duration;
use crate::error::{Result, WatchError};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Identity of a watch. Two handles are equal exactly when their ids are.
pub type WatchId = i64;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Hands out process-unique watch ids, starting at 1.
pub fn next_id() -> WatchId {
    LAST_ID.fetch_add(1, Ordering::SeqCst) + 1
}

/// Everything an observer can see of a watch at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Watch identity.
    pub id: WatchId,
    /// Latest tick of the current run, formatted; empty before any run.
    pub display_text: String,
    /// Raw target input.
    pub target_text: String,
    /// Parse of `target_text`; what the next start will use.
    pub pending_target: Option<Duration>,
    /// Target latched by the current run; `None` counts up.
    pub committed_target: Option<Duration>,
    /// A run has been started.
    pub is_running: bool,
    /// The current run is suspended.
    pub is_suspended: bool,
    /// The current run reached its deadline.
    pub is_finished: bool,
    /// Number of runs started so far.
    pub generation: u64,
}

impl Snapshot {
    fn idle(id: WatchId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Configures a watch at construction.
#[derive(Clone)]
pub enum WatchOption {
    /// Tick period of the stock device. Ignored when a factory is given.
    WithRefreshRate(Duration),
    /// Builds the tick source of every run.
    WithFactory(Arc<dyn DeviceFactory>),
}

impl fmt::Debug for WatchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchOption::WithRefreshRate(rate) => {
                f.debug_tuple("WithRefreshRate").field(rate).finish()
            }
            WatchOption::WithFactory(_) => f.write_str("WithFactory(..)"),
        }
    }
}

/// Sets the tick period of the stock [`TimerDevice`](crate::device::TimerDevice).
pub fn with_refresh_rate(rate: Duration) -> WatchOption {
    WatchOption::WithRefreshRate(rate)
}

/// Replaces the stock device with sources built by `factory`.
pub fn with_factory<F>(factory: F) -> WatchOption
where
    F: DeviceFactory + 'static,
{
    WatchOption::WithFactory(Arc::new(factory))
}

struct Options {
    refresh_rate: Duration,
    factory: Option<Arc<dyn DeviceFactory>>,
}

impl Options {
    fn from_opts(opts: &[WatchOption]) -> Self {
        let mut options = Options {
            refresh_rate: DEFAULT_REFRESH_RATE,
            factory: None,
        };
        for opt in opts {
            match opt {
                WatchOption::WithRefreshRate(rate) => options.refresh_rate = *rate,
                WatchOption::WithFactory(factory) => options.factory = Some(Arc::clone(factory)),
            }
        }
        options
    }

    fn into_factory(self) -> Arc<dyn DeviceFactory> {
        let refresh_rate = self.refresh_rate;
        self.factory
            .unwrap_or_else(|| Arc::new(TimerDeviceFactory::new(refresh_rate)))
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Start,
    Interrupt,
    SetTargetText(String),
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Message in a watch's inbox.
#[derive(Debug)]
pub(crate) enum Inbox {
    Command(Command),
    Reading { generation: u64, reading: Reading },
}

/// Spawns a watch with the given identity on the current tokio runtime.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub fn new(id: WatchId, opts: &[WatchOption]) -> WatchHandle {
    let factory = Options::from_opts(opts).into_factory();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(Snapshot::idle(id));

    let actor = Watch::new(id, factory, inbox_tx.downgrade(), state_tx);
    let task = tokio::spawn(actor.run(inbox_rx));

    WatchHandle {
        id,
        inbox: inbox_tx,
        state: state_rx,
        task: Arc::new(Mutex::new(Some(task))),
    }
}

/// Spawns a watch with a fresh id from [`next_id`].
pub fn new_with_next_id(opts: &[WatchOption]) -> WatchHandle {
    new(next_id(), opts)
}

/// Actor state. Lives inside the spawned task; reached through a
/// [`WatchHandle`].
struct Watch {
    id: WatchId,
    target_text: String,
    pending_target: Option<Duration>,
    committed_target: Option<Duration>,
    active: Option<Box<dyn TickSource>>,
    display_text: String,
    suspended: bool,
    finished: bool,
    generation: u64,
    current: Arc<AtomicU64>,
    factory: Arc<dyn DeviceFactory>,
    inbox: WeakUnboundedSender<Inbox>,
    state: watch::Sender<Snapshot>,
}

impl Watch {
    fn new(
        id: WatchId,
        factory: Arc<dyn DeviceFactory>,
        inbox: WeakUnboundedSender<Inbox>,
        state: watch::Sender<Snapshot>,
    ) -> Self {
        Self {
            id,
            target_text: String::new(),
            pending_target: None,
            committed_target: None,
            active: None,
            display_text: String::new(),
            suspended: false,
            finished: false,
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
            factory,
            inbox,
            state,
        }
    }

    async fn run(mut self, mut inbox: UnboundedReceiver<Inbox>) {
        debug!(id = self.id, "watch started");
        while let Some(message) = inbox.recv().await {
            let mut flow = self.apply(message);
            // Apply everything already queued before anyone gets to look.
            while flow.is_continue() {
                match inbox.try_recv() {
                    Ok(message) => flow = self.apply(message),
                    Err(_) => break,
                }
            }
            self.publish();
            if flow.is_break() {
                break;
            }
        }
        // Detach whatever is still ticking.
        self.current.store(u64::MAX, Ordering::Release);
        debug!(id = self.id, "watch stopped");
    }

    fn apply(&mut self, message: Inbox) -> ControlFlow<()> {
        match message {
            Inbox::Command(Command::Start) => self.start(),
            Inbox::Command(Command::Interrupt) => self.interrupt(),
            Inbox::Command(Command::SetTargetText(text)) => self.set_target_text(text),
            Inbox::Command(Command::Snapshot(reply)) => {
                let _ = reply.send(self.snapshot());
            }
            Inbox::Command(Command::Shutdown) => return ControlFlow::Break(()),
            Inbox::Reading {
                generation,
                reading,
            } => self.observe(generation, reading),
        }
        ControlFlow::Continue(())
    }

    fn start(&mut self) {
        self.committed_target = self.pending_target;
        let config = DeviceConfig::for_target(self.committed_target);

        self.generation += 1;
        self.current.store(self.generation, Ordering::Release);
        debug!(
            id = self.id,
            generation = self.generation,
            direction = ?config.direction,
            target = ?self.committed_target,
            "starting run"
        );

        let mut source = self.factory.build(config);
        source.run(Feed::new(
            self.generation,
            Arc::clone(&self.current),
            self.inbox.clone(),
        ));

        // Derived state switches to the new source in the same step.
        self.display_text = duration::encode(Some(source.value()));
        self.suspended = source.is_suspended();
        self.finished = source.is_finished();
        self.active = Some(source);
    }

    fn interrupt(&mut self) {
        match self.active.as_mut() {
            Some(source) => {
                debug!(id = self.id, generation = self.generation, "interrupting run");
                source.interrupt();
                self.suspended = source.is_suspended();
                self.finished = source.is_finished();
            }
            None => trace!(id = self.id, "interrupt without a run"),
        }
    }

    fn set_target_text(&mut self, text: String) {
        if text == self.target_text {
            trace!(id = self.id, "target text unchanged");
            return;
        }
        self.pending_target = duration::decode(&text);
        debug!(id = self.id, text = %text, pending = ?self.pending_target, "target text edited");
        self.target_text = text;
    }

    fn observe(&mut self, generation: u64, reading: Reading) {
        if generation != self.generation || self.active.is_none() {
            trace!(
                id = self.id,
                generation,
                current = self.generation,
                ?reading,
                "dropping stale reading"
            );
            return;
        }
        match reading {
            Reading::Tick(value) => self.display_text = duration::encode(Some(value)),
            Reading::Suspended(suspended) => self.suspended = suspended,
            Reading::Finished(finished) => self.finished = finished,
        }
    }

    fn snapshot(&self) -> Snapshot {
        let running = self.active.is_some();
        Snapshot {
            id: self.id,
            display_text: self.display_text.clone(),
            target_text: self.target_text.clone(),
            pending_target: self.pending_target,
            committed_target: self.committed_target,
            is_running: running,
            is_suspended: running && self.suspended,
            is_finished: running && self.finished,
            generation: self.generation,
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Handle to a running watch.
///
/// Commands are fire-and-forget: they return as soon as the message is
/// queued and the new state shows up in later snapshots. Clones talk to the
/// same watch. The watch stops when every handle is gone or on
/// [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct WatchHandle {
    id: WatchId,
    inbox: UnboundedSender<Inbox>,
    state: watch::Receiver<Snapshot>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WatchHandle {
    /// Identity of the watch.
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Latches the pending target and begins a new run, replacing any
    /// current one.
    pub fn start(&self) {
        self.report(self.try_start());
    }

    /// Suspends the current run. Does nothing before the first start.
    pub fn interrupt(&self) {
        self.report(self.try_interrupt());
    }

    /// Replaces the target text. Has no effect on a run already going.
    pub fn set_target_text(&self, text: impl Into<String>) {
        self.report(self.try_set_target_text(text));
    }

    /// Like [`start`](Self::start) but reports a stopped watch.
    pub fn try_start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Like [`interrupt`](Self::interrupt) but reports a stopped watch.
    pub fn try_interrupt(&self) -> Result<()> {
        self.send(Command::Interrupt)
    }

    /// Like [`set_target_text`](Self::set_target_text) but reports a stopped
    /// watch.
    pub fn try_set_target_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::SetTargetText(text.into()))
    }

    /// Latest published snapshot. Does not wait for queued commands.
    pub fn current(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Snapshot taken after every command sent so far has been applied.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| WatchError::Dropped(self.id))
    }

    /// Waits for the next published snapshot.
    pub async fn changed(&mut self) -> Result<Snapshot> {
        self.state
            .changed()
            .await
            .map_err(|_| WatchError::Closed(self.id))?;
        Ok(self.state.borrow_and_update().clone())
    }

    /// Receiver of every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.clone()
    }

    /// Stops the watch and waits for its task. The current source is
    /// detached, not interrupted. Later calls return immediately.
    pub async fn shutdown(&self) -> Result<()> {
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(task) = task else {
            return Ok(());
        };
        // Already gone is fine; the join below still reports panics.
        let _ = self.send(Command::Shutdown);
        task.await?;
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.inbox
            .send(Inbox::Command(command))
            .map_err(|_| WatchError::Closed(self.id))
    }

    fn report(&self, result: Result<()>) {
        if let Err(err) = result {
            warn!(id = self.id, "{}", err);
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for WatchHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WatchHandle {}

impl Hash for WatchHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Direction;
    use std::sync::atomic::AtomicUsize;

    /// Records what the watch did with its sources.
    #[derive(Clone, Default)]
    struct Probe {
        configs: Arc<Mutex<Vec<DeviceConfig>>>,
        feeds: Arc<Mutex<Vec<Feed>>>,
        interrupts: Arc<AtomicUsize>,
    }

    impl Probe {
        fn configs(&self) -> Vec<DeviceConfig> {
            self.configs.lock().unwrap().clone()
        }

        fn feed(&self, index: usize) -> Feed {
            self.feeds.lock().unwrap()[index].clone()
        }

        fn factory(&self) -> WatchOption {
            let probe = self.clone();
            with_factory(move |config: DeviceConfig| {
                probe.configs.lock().unwrap().push(config);
                Box::new(FakeSource {
                    probe: probe.clone(),
                    feed: None,
                    suspended: false,
                }) as Box<dyn TickSource>
            })
        }
    }

    /// Source driven by hand through its recorded feed.
    struct FakeSource {
        probe: Probe,
        feed: Option<Feed>,
        suspended: bool,
    }

    impl TickSource for FakeSource {
        fn run(&mut self, feed: Feed) {
            self.probe.feeds.lock().unwrap().push(feed.clone());
            self.feed = Some(feed);
        }

        fn interrupt(&mut self) {
            self.probe.interrupts.fetch_add(1, Ordering::SeqCst);
            self.suspended = true;
            if let Some(feed) = &self.feed {
                feed.send(Reading::Suspended(true));
            }
        }

        fn value(&self) -> Duration {
            Duration::ZERO
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    /// Source ticking on its own task, `offset` plus one second per period.
    struct TickingSource {
        period: Duration,
        offset: Duration,
    }

    impl TickSource for TickingSource {
        fn run(&mut self, feed: Feed) {
            let period = self.period;
            let offset = self.offset;
            tokio::spawn(async move {
                let mut n = 0;
                loop {
                    tokio::time::sleep(period).await;
                    n += 1;
                    if !feed.send(Reading::Tick(offset + Duration::from_secs(n))) {
                        break;
                    }
                }
            });
        }

        fn interrupt(&mut self) {}

        fn value(&self) -> Duration {
            self.offset
        }

        fn is_suspended(&self) -> bool {
            false
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_next_id_is_unique() {
        let a = next_id();
        let b = next_id();
        assert!(a > 0);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_initial_state() {
        let watch = new(42, &[]);
        let snapshot = watch.snapshot().await.unwrap();

        assert_eq!(snapshot, Snapshot::idle(42));
        assert_eq!(snapshot.display_text, "");
        assert!(!snapshot.is_running);
        assert!(!snapshot.is_suspended);
        assert!(!snapshot.is_finished);
        assert_eq!(watch.current(), snapshot);
    }

    #[tokio::test]
    async fn test_equality_is_identity() {
        let probe = Probe::default();
        let a = new(7, &[probe.factory()]);
        let b = new(7, &[]);
        let c = new(8, &[]);

        a.set_target_text("5:00");
        a.start();
        a.snapshot().await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, a.clone());

        let mut set = std::collections::HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[tokio::test]
    async fn test_target_text_parses_into_pending_target() {
        let watch = new_with_next_id(&[]);

        watch.set_target_text("1:30:00");
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.target_text, "1:30:00");
        assert_eq!(snapshot.pending_target, Some(Duration::from_secs(5400)));
        assert_eq!(snapshot.committed_target, None);

        watch.set_target_text("soon");
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.pending_target, None);
    }

    #[tokio::test]
    async fn test_start_counts_up_without_target() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        let snapshot = watch.snapshot().await.unwrap();

        assert!(snapshot.is_running);
        assert_eq!(snapshot.committed_target, None);
        assert_eq!(snapshot.display_text, "0:00");
        assert_eq!(probe.configs(), vec![DeviceConfig::up()]);
    }

    #[tokio::test]
    async fn test_invalid_target_counts_up() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.set_target_text("ten minutes");
        watch.start();
        let snapshot = watch.snapshot().await.unwrap();

        assert!(snapshot.is_running);
        assert_eq!(snapshot.committed_target, None);
        assert_eq!(probe.configs()[0].direction, Direction::Up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_commits_latest_target() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.set_target_text("1");
        watch.set_target_text("1:");
        watch.set_target_text("1:00");
        let before = tokio::time::Instant::now();
        watch.start();
        let snapshot = watch.snapshot().await.unwrap();

        assert_eq!(snapshot.committed_target, Some(Duration::from_secs(60)));
        let config = probe.configs()[0];
        assert_eq!(config.direction, Direction::Down);
        assert_eq!(config.deadline, Some(before + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_ticks_update_display_text() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.snapshot().await.unwrap();
        let feed = probe.feed(0);

        assert!(feed.send(Reading::Tick(Duration::from_secs(61))));
        assert_eq!(watch.snapshot().await.unwrap().display_text, "1:01");

        assert!(feed.send(Reading::Tick(Duration::from_secs(3661))));
        assert_eq!(watch.snapshot().await.unwrap().display_text, "1:01:01");
    }

    #[tokio::test]
    async fn test_flags_mirror_current_source() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.snapshot().await.unwrap();
        let feed = probe.feed(0);

        feed.send(Reading::Finished(true));
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.is_finished);
        assert!(!snapshot.is_suspended);

        feed.send(Reading::Suspended(true));
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.is_suspended);
    }

    #[tokio::test]
    async fn test_restart_resets_flags_to_new_source() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.snapshot().await.unwrap();
        probe.feed(0).send(Reading::Finished(true));
        probe.feed(0).send(Reading::Suspended(true));
        probe.feed(0).send(Reading::Tick(Duration::from_secs(30)));
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.is_finished && snapshot.is_suspended);

        watch.start();
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.is_running);
        assert!(!snapshot.is_finished);
        assert!(!snapshot.is_suspended);
        assert_eq!(snapshot.display_text, "0:00");
        assert_eq!(snapshot.generation, 2);
    }

    #[tokio::test]
    async fn test_replaced_source_is_detached_not_interrupted() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.start();
        watch.snapshot().await.unwrap();

        let old = probe.feed(0);
        let latest = probe.feed(1);
        assert!(!old.is_attached());
        assert!(latest.is_attached());
        assert_eq!(probe.interrupts.load(Ordering::SeqCst), 0);

        assert!(!old.send(Reading::Tick(Duration::from_secs(999))));
        assert!(!old.send(Reading::Finished(true)));
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.display_text, "0:00");
        assert!(!snapshot.is_finished);
    }

    #[tokio::test]
    async fn test_in_flight_reading_from_old_source_is_dropped() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.snapshot().await.unwrap();
        let old = probe.feed(0);

        // The old feed passed its attachment check just before the restart
        // and its reading lands after it.
        watch.start();
        assert!(old.deliver(Reading::Tick(Duration::from_secs(500))));
        assert!(old.deliver(Reading::Suspended(true)));

        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.display_text, "0:00");
        assert!(!snapshot.is_suspended);

        probe.feed(1).send(Reading::Tick(Duration::from_secs(2)));
        assert_eq!(watch.snapshot().await.unwrap().display_text, "0:02");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_source_replaces_slow_source() {
        let slow = Duration::from_millis(500);
        let fast = Duration::from_millis(10);
        let sources = Arc::new(Mutex::new(vec![
            TickingSource {
                period: fast,
                offset: Duration::ZERO,
            },
            TickingSource {
                period: slow,
                offset: Duration::from_secs(3600),
            },
        ]));
        let factory = with_factory(move |_config: DeviceConfig| {
            let source = sources.lock().unwrap().pop().unwrap();
            Box::new(source) as Box<dyn TickSource>
        });
        let watch = new(1, &[factory]);

        watch.start();
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.display_text, "1:00:02");

        watch.start();
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.display_text, "0:00");

        // Crosses several slow ticks; none of them may show up again.
        let mut last = Duration::ZERO;
        for _ in 0..150 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let snapshot = watch.snapshot().await.unwrap();
            let shown = duration::decode(&snapshot.display_text).unwrap();
            assert!(shown < Duration::from_secs(3600), "stale tick {}", snapshot.display_text);
            assert!(shown >= last);
            last = shown;
        }
        assert!(last > Duration::from_secs(100));
    }

    #[tokio::test]
    async fn test_interrupt_before_start_is_noop() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);
        watch.set_target_text("10");
        let before = watch.snapshot().await.unwrap();

        watch.interrupt();
        let after = watch.snapshot().await.unwrap();

        assert_eq!(before, after);
        assert_eq!(probe.interrupts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interrupt_suspends_but_keeps_running() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.start();
        watch.interrupt();
        let snapshot = watch.snapshot().await.unwrap();

        assert_eq!(probe.interrupts.load(Ordering::SeqCst), 1);
        assert!(snapshot.is_running);
        assert!(snapshot.is_suspended);
    }

    #[tokio::test]
    async fn test_editing_target_during_run_leaves_run_alone() {
        let probe = Probe::default();
        let watch = new(1, &[probe.factory()]);

        watch.set_target_text("1:00");
        watch.start();
        let started = watch.snapshot().await.unwrap();

        watch.set_target_text("5:00");
        let edited = watch.snapshot().await.unwrap();

        assert_eq!(edited.committed_target, Some(Duration::from_secs(60)));
        assert_eq!(edited.pending_target, Some(Duration::from_secs(300)));
        assert!(edited.is_running);
        assert_eq!(edited.generation, started.generation);
        assert_eq!(probe.configs().len(), 1);

        watch.start();
        let restarted = watch.snapshot().await.unwrap();
        assert_eq!(restarted.committed_target, Some(Duration::from_secs(300)));
        assert_eq!(probe.configs().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_target_text_is_ignored() {
        let watch = new(1, &[]);
        let mut state = watch.subscribe();

        watch.set_target_text("2:00");
        watch.snapshot().await.unwrap();
        assert!(state.has_changed().unwrap());
        state.borrow_and_update();

        watch.set_target_text("2:00");
        watch.snapshot().await.unwrap();
        assert!(!state.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_changed_delivers_whole_snapshots() {
        let probe = Probe::default();
        let mut watch = new(1, &[probe.factory()]);

        watch.set_target_text("30");
        watch.start();
        let snapshot = watch.changed().await.unwrap();

        // Both commands were queued together and land in one snapshot.
        assert_eq!(snapshot.target_text, "30");
        assert!(snapshot.is_running);
        assert_eq!(snapshot.committed_target, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stock_device_counts_down_to_finished() {
        let watch = new(1, &[with_refresh_rate(Duration::from_millis(100))]);

        watch.set_target_text("3");
        watch.start();
        assert_eq!(watch.snapshot().await.unwrap().display_text, "0:03");

        tokio::time::sleep(Duration::from_millis(1600)).await;
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.display_text == "0:01" || snapshot.display_text == "0:02");
        assert!(!snapshot.is_finished);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let snapshot = watch.snapshot().await.unwrap();
        assert_eq!(snapshot.display_text, "0:00");
        assert!(snapshot.is_finished);
        assert!(snapshot.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stock_device_interrupt() {
        let watch = new(1, &[]);

        watch.start();
        tokio::time::sleep(Duration::from_millis(2050)).await;
        watch.interrupt();
        let snapshot = watch.snapshot().await.unwrap();
        assert!(snapshot.is_suspended);
        assert_eq!(snapshot.display_text, "0:02");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(watch.snapshot().await.unwrap().display_text, "0:02");
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_watch() {
        let watch = new(1, &[]);
        let other = watch.clone();
        watch.start();

        watch.shutdown().await.unwrap();
        other.shutdown().await.unwrap();

        assert!(matches!(other.try_start(), Err(WatchError::Closed(1))));
        assert!(other.snapshot().await.is_err());
        // Fire-and-forget commands only log.
        other.start();
        other.interrupt();
    }
}
