#![warn(missing_docs)]

//! # bubbletea-watch
//!
//! A countdown / stopwatch component for [bubbletea-rs](https://github.com/joshka/bubbletea-rs)
//! terminal applications.
//!
//! A watch counts down from a typed target (`"1:30:00"`) or, without one,
//! counts up from zero. Its state is derived from whichever clock run is
//! current: the display text follows the run's ticks, the suspended and
//! finished flags follow the run's flags, and the target text is parsed into
//! the duration the next run will use. Starting again swaps in a new run and
//! nothing from the old one is observed afterwards.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`duration`] | Parsing and formatting of positional duration text |
//! | [`device`] | The [`TickSource`](device::TickSource) contract and the stock tokio-driven clock |
//! | [`watch`] | The watch actor, its handle and snapshots |
//! | [`widget`] | A bubbletea-rs model rendering a watch |
//! | [`key`] | Key bindings of the widget |
//! | [`error`] | Errors from talking to a stopped watch |
//!
//! ## Quick Start
//!
//! ```rust
//! use bubbletea_watch::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bubbletea_watch::error::Result<()> {
//! let watch = watch_new(1, &[]);
//! watch.set_target_text("10:00");
//! watch.start();
//!
//! // Editing now only affects the next start.
//! watch.set_target_text("5:00");
//!
//! let snapshot = watch.snapshot().await?;
//! assert_eq!(snapshot.committed_target, Some(Duration::from_secs(600)));
//! assert_eq!(snapshot.pending_target, Some(Duration::from_secs(300)));
//! assert!(snapshot.is_running);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod duration;
pub mod error;
pub mod key;
pub mod watch;
pub mod widget;

use bubbletea_rs::Cmd;

/// Focus management shared by interactive components.
///
/// A focused component takes keyboard input; a blurred one ignores it.
///
/// ```rust
/// use bubbletea_watch::{watch, widget, Component};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut model = widget::new(watch::new(1, &[]));
/// assert!(!model.focused());
///
/// model.focus();
/// assert!(model.focused());
///
/// model.blur();
/// assert!(!model.focused());
/// # }
/// ```
pub trait Component {
    /// Sets the component to focused state. May return a command to run on
    /// gaining focus.
    fn focus(&mut self) -> Option<Cmd>;

    /// Sets the component to blurred state.
    fn blur(&mut self);

    /// Returns the current focus state.
    fn focused(&self) -> bool;
}

pub use device::{
    DeviceConfig, DeviceFactory, Direction, Feed, Reading, TickSource, TimerDevice,
    TimerDeviceFactory,
};
pub use error::WatchError;
pub use watch::{Snapshot, WatchHandle, WatchId, WatchOption};
pub use widget::{Model as WatchWidget, RefreshMsg as WatchRefreshMsg};

/// Prelude module for convenient imports.
///
/// ```rust
/// use bubbletea_watch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::device::{
        DeviceConfig, DeviceFactory, Direction, Feed, Reading, TickSource, TimerDevice,
        TimerDeviceFactory, DEFAULT_REFRESH_RATE,
    };
    pub use crate::duration::{decode as decode_duration, encode as encode_duration};
    pub use crate::error::WatchError;
    pub use crate::key::{Binding, KeyMap};
    pub use crate::watch::{
        new as watch_new, new_with_next_id as watch_new_with_next_id, next_id, with_factory,
        with_refresh_rate, Snapshot, WatchHandle, WatchId, WatchOption,
    };
    pub use crate::widget::{
        new as widget_new, Model as WatchWidget, RefreshMsg as WatchRefreshMsg, Styles,
    };
    pub use crate::Component;
}
