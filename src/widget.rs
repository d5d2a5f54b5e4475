//! Terminal widget showing a watch in a bubbletea-rs program.
//!
//! The widget keeps a copy of the watch's latest [`Snapshot`] and refreshes
//! it on a bubbletea tick, so rendering always happens on the program's own
//! update loop. Refresh ticks carry the widget id and a tag; a tick whose tag
//! is not the current one is dropped, which keeps a single refresh loop alive
//! however often [`Model::init`] is called.
//!
//! While focused the widget edits the target text from key input (digits and
//! `:`), starts on `enter` and interrupts on `space`.
//!
//! # bubbletea-rs Integration
//!
//! ```rust
//! use bubbletea_rs::{Cmd, Model as BubbleTeaModel, Msg};
//! use bubbletea_watch::{watch, widget, Component};
//!
//! struct App {
//!     watch: widget::Model,
//! }
//!
//! impl BubbleTeaModel for App {
//!     fn init() -> (Self, Option<Cmd>) {
//!         let mut watch = widget::new(watch::new_with_next_id(&[]));
//!         watch.focus();
//!         let cmd = watch.init();
//!         (Self { watch }, Some(cmd))
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Option<Cmd> {
//!         self.watch.update(msg)
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("{}\n{}", self.watch.view(), self.watch.keymap.help_line())
//!     }
//! }
//! ```

use crate::device::DEFAULT_REFRESH_RATE;
use crate::duration;
use crate::key::KeyMap;
use crate::watch::{self, Snapshot, WatchHandle, WatchId};
use crate::Component;
use bubbletea_rs::{tick as bubbletea_tick, Cmd, KeyMsg, Model as BubbleTeaModel, Msg};
use crossterm::event::KeyCode;
use lipgloss_extras::prelude::*;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

/// Shown while idle with no target typed.
pub const DEFAULT_PLACEHOLDER: &str = "0:00";

/// Message asking the widget to pull the watch's latest state.
#[derive(Debug, Clone)]
pub struct RefreshMsg {
    /// Watch the refresh is meant for.
    pub id: WatchId,
    tag: i64,
}

/// Styles per watch state.
#[derive(Debug, Clone)]
pub struct Styles {
    /// No run yet; the target text is shown.
    pub idle: Style,
    /// Counting.
    pub running: Style,
    /// Interrupted.
    pub suspended: Style,
    /// Countdown reached zero.
    pub finished: Style,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            idle: Style::new().faint(true),
            running: Style::new().bold(true),
            suspended: Style::new().foreground(Color::from("214")),
            finished: Style::new().bold(true).foreground(Color::from("203")),
        }
    }
}

/// The watch widget.
#[derive(Debug)]
pub struct Model {
    /// Key bindings.
    pub keymap: KeyMap,
    /// Styles per state.
    pub styles: Styles,
    /// Shown while idle with no target typed.
    pub placeholder: String,
    watch: WatchHandle,
    snapshot: Snapshot,
    input: String,
    width: usize,
    refresh_rate: Duration,
    tag: i64,
    focus: bool,
}

/// Creates a widget for `watch`. The widget starts unfocused.
pub fn new(watch: WatchHandle) -> Model {
    Model::new(watch)
}

impl Model {
    /// Creates a widget for `watch` with default keys, styles and refresh
    /// rate.
    pub fn new(watch: WatchHandle) -> Self {
        let snapshot = watch.current();
        Self {
            keymap: KeyMap::default(),
            styles: Styles::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            input: snapshot.target_text.clone(),
            snapshot,
            watch,
            width: 0,
            refresh_rate: DEFAULT_REFRESH_RATE,
            tag: 0,
            focus: false,
        }
    }

    /// Sets how often the widget pulls the watch state.
    pub fn with_refresh_rate(mut self, rate: Duration) -> Self {
        self.refresh_rate = rate;
        self
    }

    /// Pads the view to at least `width` columns so it does not jitter as
    /// the text grows and shrinks. Zero disables padding.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Replaces the key bindings.
    pub fn with_keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    /// Replaces the styles.
    pub fn with_styles(mut self, styles: Styles) -> Self {
        self.styles = styles;
        self
    }

    /// Id of the watch shown.
    pub fn id(&self) -> WatchId {
        self.watch.id()
    }

    /// The watch shown.
    pub fn watch(&self) -> &WatchHandle {
        &self.watch
    }

    /// State as of the last refresh.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Target text typed so far.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the typed target text.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.watch.set_target_text(self.input.clone());
    }

    /// Whether the typed text would count down. Empty or unparsable text
    /// counts up.
    pub fn input_is_target(&self) -> bool {
        duration::decode(&self.input).is_some()
    }

    /// Refresh message the current refresh loop expects.
    pub fn refresh_msg(&self) -> RefreshMsg {
        RefreshMsg {
            id: self.watch.id(),
            tag: self.tag,
        }
    }

    /// Starts the refresh loop.
    pub fn init(&self) -> Cmd {
        self.refresh()
    }

    fn refresh(&self) -> Cmd {
        let id = self.watch.id();
        let tag = self.tag;
        bubbletea_tick(self.refresh_rate, move |_| {
            Box::new(RefreshMsg { id, tag }) as Msg
        })
    }

    /// Handles refresh ticks and, while focused, key input.
    pub fn update(&mut self, msg: Msg) -> Option<Cmd> {
        if let Some(refresh) = msg.downcast_ref::<RefreshMsg>() {
            if refresh.id != self.watch.id() || refresh.tag != self.tag {
                return None;
            }
            self.snapshot = self.watch.current();
            self.tag += 1;
            return Some(self.refresh());
        }

        if let Some(key_msg) = msg.downcast_ref::<KeyMsg>() {
            if self.focus {
                self.handle_key(&key_msg.key);
            }
        }

        None
    }

    fn handle_key(&mut self, key: &KeyCode) {
        if self.keymap.start.matches(key) {
            self.watch.start();
        } else if self.keymap.interrupt.matches(key) {
            self.watch.interrupt();
        } else if self.keymap.erase.matches(key) {
            if self.input.pop().is_some() {
                self.watch.set_target_text(self.input.clone());
            }
        } else if let KeyCode::Char(c) = key {
            if c.is_ascii_digit() || *c == duration::SEPARATOR {
                self.input.push(*c);
                self.watch.set_target_text(self.input.clone());
            }
        }
    }

    /// Renders the running time, or the typed target while idle.
    pub fn view(&self) -> String {
        let (text, style) = if !self.snapshot.is_running {
            let text = if self.input.is_empty() {
                self.placeholder.as_str()
            } else {
                self.input.as_str()
            };
            (text, &self.styles.idle)
        } else if self.snapshot.is_finished {
            (self.snapshot.display_text.as_str(), &self.styles.finished)
        } else if self.snapshot.is_suspended {
            (self.snapshot.display_text.as_str(), &self.styles.suspended)
        } else {
            (self.snapshot.display_text.as_str(), &self.styles.running)
        };

        let padding = self.width.saturating_sub(UnicodeWidthStr::width(text));
        let padded = format!("{}{}", " ".repeat(padding), text);
        style.render(&padded)
    }
}

impl Component for Model {
    fn focus(&mut self) -> Option<Cmd> {
        self.focus = true;
        None
    }

    fn blur(&mut self) {
        self.focus = false;
    }

    fn focused(&self) -> bool {
        self.focus
    }
}

impl BubbleTeaModel for Model {
    fn init() -> (Self, Option<Cmd>) {
        let mut model = new(watch::new_with_next_id(&[]));
        model.focus = true;
        let cmd = model.refresh();
        (model, Some(cmd))
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        self.update(msg)
    }

    fn view(&self) -> String {
        self.view()
    }
}
