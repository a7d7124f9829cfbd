//! Shared test helpers for logpane tests.
//!
//! This module provides common utilities used across test files to reduce
//! duplication and ensure consistent test behavior.

// Allow dead code since not all test files use all helpers
#![allow(dead_code)]

use logpane::{
    Channels, Console, LogEntry, LogKind, LogValue, Subscriber, ThrottleMode,
    value::join_plain,
};
use std::sync::{Arc, Mutex};

// =============================================================================
// ANSI Stripping
// =============================================================================

/// Strip ANSI escape codes for content verification in tests.
///
/// This allows tests to verify text content without being affected by
/// color codes or other terminal formatting.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip the escape sequence
            if chars.peek() == Some(&'[') {
                chars.next(); // consume '['
                // Skip until we hit a letter (the terminator)
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

// =============================================================================
// RAII Guards
// =============================================================================

/// RAII guard that disables colored output for tests.
///
/// Colors are disabled during the test and restored when the guard is
/// dropped, even if the test panics.
pub struct DisableColors;

impl DisableColors {
    pub fn new() -> Self {
        colored::control::set_override(false);
        Self
    }
}

impl Default for DisableColors {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DisableColors {
    fn drop(&mut self) {
        colored::control::unset_override();
    }
}

// =============================================================================
// Host Channels
// =============================================================================

/// Host output captured by recording channels: `(kind, plain text)`.
pub type HostOutput = Arc<Mutex<Vec<(LogKind, String)>>>;

/// A console whose base channels record every call instead of printing.
pub fn recording_console() -> (Console, HostOutput) {
    let output: HostOutput = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&output);
    let console = Console::with_channels(Channels::from_fn(move |kind, args| {
        sink.lock().unwrap().push((kind, join_plain(args)));
    }));
    (console, output)
}

// =============================================================================
// Collecting Subscriber
// =============================================================================

/// One notification seen by [`CollectingSubscriber`].
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Entry(LogKind, String),
    Mode(ThrottleMode),
    Cleared,
}

/// Subscriber that records every notification in order.
#[derive(Default)]
pub struct CollectingSubscriber {
    pub seen: Mutex<Vec<Seen>>,
}

impl CollectingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Plain text of every entry notification, in order.
    pub fn entry_texts(&self) -> Vec<String> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Entry(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl Subscriber for CollectingSubscriber {
    fn on_entry(&self, entry: &Arc<LogEntry>) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Entry(entry.kind(), entry.plain_text()));
    }

    fn on_state_change(&self, mode: ThrottleMode) {
        self.seen.lock().unwrap().push(Seen::Mode(mode));
    }

    fn on_clear(&self) {
        self.seen.lock().unwrap().push(Seen::Cleared);
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

/// Text arguments as log values.
pub fn texts(items: &[&str]) -> Vec<LogValue> {
    items.iter().map(|s| LogValue::from(*s)).collect()
}
