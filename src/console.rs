//! The host's output channels.
//!
//! A [`Console`] is the explicit context object that owns the process-wide
//! pieces a sink attaches to: the four channel bindings (log/info/warn/error),
//! the early-capture buffer, and the marker naming the sink that is currently
//! live. Create one at startup and hand it to [`crate::Sink::attach`].
//!
//! Bindings are plain values ([`ChannelFn`]). Interception is explicit
//! wrapping: a sink reads the current bindings, installs wrappers that call
//! the saved ones, and swaps the saved ones back on teardown.
//!
//! # Example
//!
//! ```
//! use logpane::{Console, values};
//!
//! let console = Console::new();
//! console.info(&values!["[Boot] starting version", "1.2.0"]);
//! // Nothing is attached yet, so the call was kept for replay.
//! assert_eq!(console.early_entries().len(), 1);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::early::{EarlyBuffer, EarlyEntry};
use crate::entry::LogKind;
use crate::value::{LogValue, join_plain};

/// Implementation of one output channel.
pub type ChannelFn = Arc<dyn Fn(&[LogValue]) + Send + Sync>;

// ============================================================================
// Channels
// ============================================================================

/// The four channel implementations, indexed by [`LogKind`].
#[derive(Clone)]
pub struct Channels {
    fns: [ChannelFn; 4],
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels").finish_non_exhaustive()
    }
}

impl Channels {
    /// Plain terminal output: log/info on stdout, warn/error on stderr.
    pub fn stdio() -> Self {
        Self::from_fn(|kind, args| match kind {
            LogKind::Log | LogKind::Info => println!("{}", join_plain(args)),
            LogKind::Warn | LogKind::Error => eprintln!("{}", join_plain(args)),
        })
    }

    /// Channels that discard everything.
    pub fn silent() -> Self {
        Self::from_fn(|_, _| {})
    }

    /// Build all four channels from one function of the channel kind.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(LogKind, &[LogValue]) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self {
            fns: LogKind::ALL.map(|kind| {
                let f = Arc::clone(&f);
                Arc::new(move |args: &[LogValue]| f(kind, args)) as ChannelFn
            }),
        }
    }

    /// Build channels by wrapping each of `self`'s with `wrap(kind, inner)`.
    pub fn wrapped<F>(&self, mut wrap: F) -> Self
    where
        F: FnMut(LogKind, ChannelFn) -> ChannelFn,
    {
        Self {
            fns: LogKind::ALL.map(|kind| wrap(kind, Arc::clone(self.get(kind)))),
        }
    }

    pub fn get(&self, kind: LogKind) -> &ChannelFn {
        &self.fns[kind.index()]
    }

    /// Replace one channel, returning the previous implementation.
    pub fn set(&mut self, kind: LogKind, f: ChannelFn) -> ChannelFn {
        std::mem::replace(&mut self.fns[kind.index()], f)
    }

    /// Whether both tables hold the very same implementations.
    pub fn same_as(&self, other: &Channels) -> bool {
        self.fns
            .iter()
            .zip(other.fns.iter())
            .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

// ============================================================================
// Live sink marker
// ============================================================================

/// Teardown hook of a live sink, held weakly by the console.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self);
}

pub(crate) struct LiveMarker {
    pub(crate) id: u64,
    pub(crate) sink: Weak<dyn Detach>,
}

// ============================================================================
// Console
// ============================================================================

/// Output-channel context shared by the host and at most one live sink.
///
/// Cheap to clone; clones share the same bindings and buffer.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    bindings: RwLock<Channels>,
    early: Arc<Mutex<EarlyBuffer>>,
    live: Mutex<Option<LiveMarker>>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("early_entries", &self.early_len())
            .field("has_live_sink", &self.has_live_sink())
            .finish()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Console writing to stdout/stderr with the default early buffer.
    pub fn new() -> Self {
        Self::with_channels(Channels::stdio())
    }

    /// Console over custom base channels.
    pub fn with_channels(channels: Channels) -> Self {
        Self::build(channels, EarlyBuffer::default())
    }

    /// Console over custom base channels with a given early-buffer capacity.
    pub fn with_early_capacity(channels: Channels, capacity: usize) -> Self {
        Self::build(channels, EarlyBuffer::with_capacity(capacity))
    }

    fn build(base: Channels, early: EarlyBuffer) -> Self {
        let early = Arc::new(Mutex::new(early));
        // Early capture sits directly over the base channels from the start.
        let bindings = base.wrapped(|kind, inner| {
            let early = Arc::clone(&early);
            Arc::new(move |args: &[LogValue]| {
                inner(args);
                lock(&early).capture(kind, args.to_vec());
            }) as ChannelFn
        });
        Self {
            inner: Arc::new(ConsoleInner {
                bindings: RwLock::new(bindings),
                early,
                live: Mutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Host-facing channel calls
    // ------------------------------------------------------------------------

    /// Invoke the current binding of `kind`.
    ///
    /// The binding is cloned out of the lock before the call so a binding may
    /// log again (or swap bindings) without deadlocking.
    pub fn emit(&self, kind: LogKind, args: &[LogValue]) {
        let f = {
            let bindings = self.inner.bindings.read().unwrap_or_else(|e| e.into_inner());
            Arc::clone(bindings.get(kind))
        };
        f(args);
    }

    pub fn log(&self, args: &[LogValue]) {
        self.emit(LogKind::Log, args);
    }

    pub fn info(&self, args: &[LogValue]) {
        self.emit(LogKind::Info, args);
    }

    pub fn warn(&self, args: &[LogValue]) {
        self.emit(LogKind::Warn, args);
    }

    pub fn error(&self, args: &[LogValue]) {
        self.emit(LogKind::Error, args);
    }

    // ------------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------------

    /// Snapshot of the current bindings.
    pub fn bindings(&self) -> Channels {
        self.inner
            .bindings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Atomically install `channels`, returning what was installed before.
    pub(crate) fn swap_bindings(&self, channels: Channels) -> Channels {
        let mut bindings = self.inner.bindings.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *bindings, channels)
    }

    // ------------------------------------------------------------------------
    // Early buffer
    // ------------------------------------------------------------------------

    /// Copy of every retained early entry, replayed or not.
    pub fn early_entries(&self) -> Vec<EarlyEntry> {
        lock(&self.inner.early).entries().cloned().collect()
    }

    pub fn early_len(&self) -> usize {
        lock(&self.inner.early).len()
    }

    pub(crate) fn with_early<R>(&self, f: impl FnOnce(&mut EarlyBuffer) -> R) -> R {
        f(&mut lock(&self.inner.early))
    }

    // ------------------------------------------------------------------------
    // Live sink marker
    // ------------------------------------------------------------------------

    pub fn has_live_sink(&self) -> bool {
        lock(&self.inner.live)
            .as_ref()
            .is_some_and(|marker| marker.sink.strong_count() > 0)
    }

    /// Record `marker` as the live sink, returning the previous one's
    /// teardown hook if it is still alive.
    pub(crate) fn claim_live(&self, marker: LiveMarker) -> Option<Arc<dyn Detach>> {
        lock(&self.inner.live)
            .replace(marker)
            .and_then(|previous| previous.sink.upgrade())
    }

    /// Clear the marker if it still names sink `id`.
    pub(crate) fn release_live(&self, id: u64) {
        let mut live = lock(&self.inner.live);
        if live.as_ref().is_some_and(|marker| marker.id == id) {
            *live = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    fn recording() -> (Channels, Arc<Mutex<Vec<(LogKind, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channels = Channels::from_fn(move |kind, args| {
            sink.lock().unwrap().push((kind, join_plain(args)));
        });
        (channels, seen)
    }

    #[test]
    fn test_emit_reaches_base_channel() {
        let (channels, seen) = recording();
        let console = Console::with_channels(channels);
        console.warn(&values!["disk", 91]);
        console.error(&values!["boom"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (LogKind::Warn, "disk 91".to_string()),
                (LogKind::Error, "boom".to_string())
            ]
        );
    }

    #[test]
    fn test_calls_before_attach_are_buffered() {
        let console = Console::with_channels(Channels::silent());
        console.log(&values!["a"]);
        console.info(&values!["b"]);
        let early = console.early_entries();
        assert_eq!(early.len(), 2);
        assert_eq!(early[1].kind, LogKind::Info);
    }

    #[test]
    fn test_early_capacity() {
        let console = Console::with_early_capacity(Channels::silent(), 2);
        for i in 0..5 {
            console.log(&values![i]);
        }
        assert_eq!(console.early_len(), 2);
    }

    #[test]
    fn test_swap_bindings_round_trip() {
        let console = Console::with_channels(Channels::silent());
        let original = console.bindings();
        let previous = console.swap_bindings(Channels::silent());
        assert!(previous.same_as(&original));
        assert!(!console.bindings().same_as(&original));
        console.swap_bindings(previous);
        assert!(console.bindings().same_as(&original));
    }

    #[test]
    fn test_binding_may_reenter_console() {
        let console = Console::with_channels(Channels::silent());
        let inner = console.clone();
        let mut channels = console.bindings();
        let log = Arc::clone(channels.get(LogKind::Log));
        channels.set(
            LogKind::Warn,
            Arc::new(move |args: &[LogValue]| {
                log(args);
                inner.log(&values!["nested"]);
            }),
        );
        console.swap_bindings(channels);
        console.warn(&values!["outer"]);
        assert_eq!(console.early_len(), 2);
    }
}
