//! Key bindings for the watch widget.
//!
//! ```rust
//! use bubbletea_watch::key::{Binding, KeyMap};
//! use crossterm::event::KeyCode;
//!
//! let keymap = KeyMap::default().with_start(
//!     Binding::new(vec![KeyCode::Char('g')]).with_help("g", "go"),
//! );
//! assert!(keymap.start.matches(&KeyCode::Char('g')));
//! assert!(!keymap.start.matches(&KeyCode::Enter));
//! ```

use crossterm::event::KeyCode;

/// A set of keys triggering one action, plus its help text.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Keys that trigger the action.
    pub keys: Vec<KeyCode>,
    /// Short key label, e.g. `"enter"`.
    pub help: String,
    /// What the action does.
    pub description: String,
}

impl Binding {
    /// Creates a binding without help text.
    pub fn new(keys: Vec<KeyCode>) -> Self {
        Self {
            keys,
            help: String::new(),
            description: String::new(),
        }
    }

    /// Sets the key label and description shown in help.
    pub fn with_help(mut self, help: impl Into<String>, description: impl Into<String>) -> Self {
        self.help = help.into();
        self.description = description.into();
        self
    }

    /// Whether `key` triggers this binding.
    pub fn matches(&self, key: &KeyCode) -> bool {
        self.keys.contains(key)
    }
}

/// Actions of the watch widget.
#[derive(Debug, Clone)]
pub struct KeyMap {
    /// Starts a new run with the typed target.
    pub start: Binding,
    /// Suspends the current run.
    pub interrupt: Binding,
    /// Deletes the last typed character.
    pub erase: Binding,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            start: Binding::new(vec![KeyCode::Enter, KeyCode::Char('s')])
                .with_help("enter", "start"),
            interrupt: Binding::new(vec![KeyCode::Char(' '), KeyCode::Esc])
                .with_help("space", "stop"),
            erase: Binding::new(vec![KeyCode::Backspace, KeyCode::Delete])
                .with_help("backspace", "erase"),
        }
    }
}

impl KeyMap {
    /// Replaces the start binding.
    pub fn with_start(mut self, binding: Binding) -> Self {
        self.start = binding;
        self
    }

    /// Replaces the interrupt binding.
    pub fn with_interrupt(mut self, binding: Binding) -> Self {
        self.interrupt = binding;
        self
    }

    /// Replaces the erase binding.
    pub fn with_erase(mut self, binding: Binding) -> Self {
        self.erase = binding;
        self
    }

    /// Bindings in help order.
    pub fn short_help(&self) -> Vec<&Binding> {
        vec![&self.start, &self.interrupt, &self.erase]
    }

    /// One line of `key action` pairs, e.g. for a footer.
    pub fn help_line(&self) -> String {
        self.short_help()
            .iter()
            .filter(|b| !b.help.is_empty())
            .map(|b| format!("{} {}", b.help, b.description))
            .collect::<Vec<_>>()
            .join(" • ")
    }
}
