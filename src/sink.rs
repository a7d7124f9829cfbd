//! The attach point.
//!
//! A [`Sink`] wraps the four channel bindings of a [`Console`]. Every call
//! still reaches the previous binding first; the sink then runs the arguments
//! through the throttle [`Controller`] and, when admitted, stores a
//! [`LogEntry`] and notifies its [`Subscriber`]s in FIFO order.
//!
//! Only one sink is live per console. Attaching a second one tears the first
//! one down before wrapping, so bindings are never wrapped twice.
//!
//! # Example
//!
//! ```
//! use logpane::{Channels, Console, Sink, SinkConfig, values};
//!
//! let console = Console::with_channels(Channels::silent());
//! console.warn(&values!["[Boot] slow start ms", 900]);
//!
//! let sink = Sink::attach(&console, SinkConfig::default());
//! console.info(&values!["[Auth] login userId", 42]);
//!
//! // Early separator, the early warning, closing separator, then the live entry.
//! assert_eq!(sink.entries().len(), 4);
//!
//! sink.destroy();
//! console.info(&values!["not captured"]);
//! assert_eq!(sink.entries().len(), 4);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::SinkConfig;
use crate::console::{ChannelFn, Channels, Console, Detach, LiveMarker};
use crate::early::{EARLY_LOGS_END, EARLY_LOGS_START};
use crate::entry::{LogEntry, LogKind};
use crate::throttle::{Clock, Controller, StatusMessage, SystemClock, ThrottleMode, ThrottleState};
use crate::timer::{ScheduledTask, Scheduler};
use crate::value::LogValue;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Collaborator traits
// ============================================================================

/// Receiver of sink notifications (typically a panel that re-renders).
///
/// Notifications arrive in the order entries were admitted. No sink lock is
/// held during a callback, so a subscriber may log through the sink again.
pub trait Subscriber: Send + Sync {
    /// An entry was admitted (or a separator/status entry was appended).
    fn on_entry(&self, entry: &Arc<LogEntry>);

    /// The throttle mode changed.
    fn on_state_change(&self, _mode: ThrottleMode) {}

    /// All entries were cleared.
    fn on_clear(&self) {}
}

#[derive(Debug, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Destination for [`Sink::copy_to`].
pub trait Clipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

// ============================================================================
// Builder
// ============================================================================

/// Options for attaching a sink. Created by [`Sink::builder`].
pub struct SinkBuilder {
    console: Console,
    config: SinkConfig,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl SinkBuilder {
    #[must_use]
    pub fn config(mut self, config: SinkConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runtime for the status and test-signal timers. Defaults to the
    /// runtime current at [`Sink::builder`], else a private one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Subscribe before attaching, so the early replay is observed too.
    #[must_use]
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn attach(self) -> Sink {
        Sink::install(self)
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Handle to an attached sink. Clones share the same sink.
///
/// Dropping the last handle has the same effect as [`Sink::destroy`].
#[derive(Clone)]
pub struct Sink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    id: u64,
    console: Console,
    config: SinkConfig,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    attached: AtomicBool,
    /// Bindings that were installed before this sink wrapped them.
    saved: Mutex<Option<Channels>>,
    panel: Mutex<Panel>,
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
    outbox: Mutex<Outbox>,
    status_timer: Mutex<Option<ScheduledTask>>,
    signal_timer: Mutex<Option<ScheduledTask>>,
}

/// State mutated by admission, guarded by one lock.
#[derive(Default)]
struct Panel {
    controller: Controller,
    entries: VecDeque<Arc<LogEntry>>,
    admitted: u64,
    query: String,
}

enum Event {
    Entry(Arc<LogEntry>),
    State(ThrottleMode),
    Cleared,
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<Event>,
    delivering: bool,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.inner.id)
            .field("attached", &self.is_attached())
            .field("mode", &self.mode())
            .finish()
    }
}

impl Sink {
    /// Attach with the system clock and no subscribers.
    pub fn attach(console: &Console, config: SinkConfig) -> Sink {
        Self::builder(console).config(config).attach()
    }

    pub fn builder(console: &Console) -> SinkBuilder {
        SinkBuilder {
            console: console.clone(),
            config: SinkConfig::default(),
            clock: Arc::new(SystemClock),
            runtime: Handle::try_current().ok(),
            subscribers: Vec::new(),
        }
    }

    fn install(builder: SinkBuilder) -> Sink {
        let SinkBuilder {
            console,
            config,
            clock,
            runtime,
            subscribers,
        } = builder;

        let inner = Arc::new(SinkInner {
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            console: console.clone(),
            config,
            clock,
            scheduler: Scheduler::new(runtime),
            attached: AtomicBool::new(true),
            saved: Mutex::new(None),
            panel: Mutex::new(Panel::default()),
            subscribers: RwLock::new(subscribers),
            outbox: Mutex::new(Outbox::default()),
            status_timer: Mutex::new(None),
            signal_timer: Mutex::new(None),
        });

        let weak: Weak<SinkInner> = Arc::downgrade(&inner);
        let marker = LiveMarker {
            id: inner.id,
            sink: weak.clone(),
        };
        if let Some(previous) = console.claim_live(marker) {
            tracing::debug!(sink = inner.id, "tearing down previously attached sink");
            previous.detach();
        }

        let wrapped = console.bindings().wrapped(|kind, previous| {
            let weak = weak.clone();
            Arc::new(move |args: &[LogValue]| {
                previous(args);
                if let Some(sink) = weak.upgrade() {
                    sink.capture(kind, args.to_vec());
                }
            }) as ChannelFn
        });
        *lock(&inner.saved) = Some(console.swap_bindings(wrapped));
        console.with_early(|early| early.suspend());

        tracing::debug!(sink = inner.id, "sink attached");
        inner.replay_early();

        Sink { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &SinkConfig {
        &self.inner.config
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Logging entry points
    // ------------------------------------------------------------------------

    pub fn log(&self, args: impl IntoIterator<Item = LogValue>) {
        self.inner.capture(LogKind::Log, args.into_iter().collect());
    }

    pub fn info(&self, args: impl IntoIterator<Item = LogValue>) {
        self.inner.capture(LogKind::Info, args.into_iter().collect());
    }

    pub fn warn(&self, args: impl IntoIterator<Item = LogValue>) {
        self.inner.capture(LogKind::Warn, args.into_iter().collect());
    }

    pub fn error(&self, args: impl IntoIterator<Item = LogValue>) {
        self.inner.capture(LogKind::Error, args.into_iter().collect());
    }

    // ------------------------------------------------------------------------
    // Panel state
    // ------------------------------------------------------------------------

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<Arc<LogEntry>> {
        lock(&self.inner.panel).entries.iter().cloned().collect()
    }

    /// Retained entries matching the current search query.
    pub fn visible_entries(&self) -> Vec<Arc<LogEntry>> {
        let panel = lock(&self.inner.panel);
        panel
            .entries
            .iter()
            .filter(|entry| entry.matches(&panel.query))
            .cloned()
            .collect()
    }

    /// Entries admitted by the controller since attach or the last clear.
    pub fn admitted_count(&self) -> u64 {
        lock(&self.inner.panel).admitted
    }

    /// Discard every retained entry and the admitted count. Throttle state
    /// is left alone.
    pub fn clear(&self) {
        {
            let mut panel = lock(&self.inner.panel);
            panel.entries.clear();
            panel.admitted = 0;
            self.inner.enqueue(Event::Cleared);
        }
        self.inner.deliver();
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscriber);
    }

    // ------------------------------------------------------------------------
    // Throttle / search
    // ------------------------------------------------------------------------

    pub fn mode(&self) -> ThrottleMode {
        lock(&self.inner.panel).controller.mode()
    }

    pub fn throttle_state(&self) -> ThrottleState {
        lock(&self.inner.panel).controller.state().clone()
    }

    /// Advance the manual throttle cycle.
    ///
    /// The returned message is also appended as an `info` entry after the
    /// configured status delay, unless the sink is destroyed or toggled again
    /// first.
    pub fn toggle_throttle(&self) -> StatusMessage {
        let status = {
            let mut panel = lock(&self.inner.panel);
            let status = panel.controller.toggle_throttle();
            self.inner.enqueue(Event::State(status.mode));
            status
        };
        self.inner.deliver();
        self.inner.arm_status(&status);
        status
    }

    /// Drive the auto-pause overlay directly.
    pub fn set_search_active(&self, active: bool) {
        {
            let mut panel = lock(&self.inner.panel);
            self.inner.search_transition(&mut panel, active);
        }
        self.inner.deliver();
    }

    /// Set the search query. A non-empty query auto-pauses; clearing it
    /// restores the previous mode.
    pub fn set_search(&self, query: &str) {
        {
            let mut panel = lock(&self.inner.panel);
            panel.query = query.to_string();
            self.inner
                .search_transition(&mut panel, !query.trim().is_empty());
        }
        self.inner.deliver();
    }

    pub fn search_query(&self) -> String {
        lock(&self.inner.panel).query.clone()
    }

    // ------------------------------------------------------------------------
    // Test signal
    // ------------------------------------------------------------------------

    /// Emit a sample entry through the console every `interval`, rotating
    /// through the four channels. Replaces any running signal.
    pub fn start_test_signal(&self, interval: Duration) {
        if !self.is_attached() {
            return;
        }
        let console = self.inner.console.clone();
        let mut tick = 0u64;
        let task = self.inner.scheduler.repeating(interval, move || {
            tick += 1;
            let (kind, args) = signal_sample(tick);
            console.emit(kind, &args);
            true
        });
        replace_task(&self.inner.signal_timer, task);
        tracing::debug!(sink = self.inner.id, ?interval, "test signal started");
    }

    pub fn stop_test_signal(&self) {
        replace_task(&self.inner.signal_timer, None);
    }

    pub fn is_test_signal_running(&self) -> bool {
        lock(&self.inner.signal_timer)
            .as_ref()
            .is_some_and(ScheduledTask::is_active)
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    /// Retained entries as plain text, one line per entry.
    pub fn export_text(&self) -> String {
        self.entries()
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {}: {}",
                    entry.timestamp().format("%H:%M:%S%.3f"),
                    entry.kind(),
                    entry.plain_text()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Copy [`Sink::export_text`] to `clipboard`. A failure is logged as an
    /// `error` entry through this sink rather than returned.
    pub fn copy_to(&self, clipboard: &dyn Clipboard) {
        let text = self.export_text();
        match clipboard.set_text(&text) {
            Ok(()) => tracing::debug!(sink = self.inner.id, bytes = text.len(), "logs copied"),
            Err(err) => self.error([LogValue::from(format!("Failed to copy logs: {err}"))]),
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Restore the saved bindings, cancel timers and detach. Repeated calls
    /// are no-ops.
    pub fn destroy(&self) {
        self.inner.teardown();
    }
}

impl SinkInner {
    fn capture(&self, kind: LogKind, args: Vec<LogValue>) {
        if !self.attached.load(Ordering::SeqCst) {
            return;
        }
        self.admit(LogEntry::new(kind, args));
    }

    /// Run one entry through the controller and store it when admitted.
    fn admit(&self, entry: LogEntry) {
        let now = self.clock.now();
        {
            let mut panel = lock(&self.panel);
            let outcome = panel.controller.admit(now);
            if !outcome.is_admitted() {
                tracing::trace!(sink = self.id, ?outcome, kind = %entry.kind(), "entry dropped");
                return;
            }
            panel.admitted += 1;
            self.store(&mut panel, entry);
        }
        self.deliver();
    }

    /// Append an entry without consulting the controller.
    fn append(&self, entry: LogEntry) {
        {
            let mut panel = lock(&self.panel);
            self.store(&mut panel, entry);
        }
        self.deliver();
    }

    fn store(&self, panel: &mut Panel, entry: LogEntry) {
        let entry = Arc::new(entry);
        panel.entries.push_back(Arc::clone(&entry));
        while panel.entries.len() > self.config.max_entries {
            panel.entries.pop_front();
        }
        // Enqueued under the panel lock so notification order matches
        // storage order.
        self.enqueue(Event::Entry(entry));
    }

    fn search_transition(&self, panel: &mut Panel, active: bool) {
        let before = panel.controller.mode();
        panel.controller.set_search_active(active);
        let after = panel.controller.mode();
        if before != after {
            self.enqueue(Event::State(after));
        }
    }

    fn replay_early(&self) {
        let early = self
            .console
            .with_early(|buffer| buffer.drain(self.config.early_replay_cap));
        if early.is_empty() {
            return;
        }
        tracing::debug!(sink = self.id, count = early.len(), "replaying early entries");
        self.append(LogEntry::new(LogKind::Log, vec![LogValue::from(EARLY_LOGS_START)]));
        for entry in early {
            self.admit(LogEntry::with_timestamp(entry.kind, entry.args, entry.timestamp));
        }
        self.append(LogEntry::new(LogKind::Log, vec![LogValue::from(EARLY_LOGS_END)]));
    }

    fn arm_status(self: &Arc<Self>, status: &StatusMessage) {
        if !self.attached.load(Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(self);
        let text = status.text.clone();
        let task = self.scheduler.once(self.config.status_delay(), move || {
            if let Some(sink) = weak.upgrade() {
                if sink.attached.load(Ordering::SeqCst) {
                    sink.append(LogEntry::new(LogKind::Info, vec![LogValue::from(text)]));
                }
            }
        });
        replace_task(&self.status_timer, task);
    }

    // ------------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------------

    fn enqueue(&self, event: Event) {
        lock(&self.outbox).queue.push_back(event);
    }

    /// Deliver queued events. Only one caller delivers at a time; a
    /// re-entrant or concurrent caller leaves its events to the active one.
    fn deliver(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }
        let mut guard = DeliveryGuard {
            outbox: &self.outbox,
            armed: true,
        };

        loop {
            let event = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        outbox.delivering = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            for subscriber in &subscribers {
                match &event {
                    Event::Entry(entry) => subscriber.on_entry(entry),
                    Event::State(mode) => subscriber.on_state_change(*mode),
                    Event::Cleared => subscriber.on_clear(),
                }
            }
        }
    }

    fn teardown(&self) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }
        replace_task(&self.status_timer, None);
        replace_task(&self.signal_timer, None);
        if let Some(saved) = lock(&self.saved).take() {
            self.console.swap_bindings(saved);
        }
        self.console.release_live(self.id);
        self.console.with_early(|early| early.resume());
        tracing::debug!(sink = self.id, "sink destroyed");
    }
}

impl Detach for SinkInner {
    fn detach(&self) {
        self.teardown();
    }
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Clears the delivering flag if a subscriber panics mid-delivery.
struct DeliveryGuard<'a> {
    outbox: &'a Mutex<Outbox>,
    armed: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.outbox).delivering = false;
        }
    }
}

/// Swap the task in `slot`, aborting the old one.
fn replace_task(slot: &Mutex<Option<ScheduledTask>>, task: Option<ScheduledTask>) {
    if let Some(previous) = std::mem::replace(&mut *lock(slot), task) {
        previous.cancel();
    }
}

/// Sample entry number `tick` of the test signal.
fn signal_sample(tick: u64) -> (LogKind, Vec<LogValue>) {
    match tick % 4 {
        1 => (
            LogKind::Log,
            vec![LogValue::from(format!("[Signal] tick count {tick}"))],
        ),
        2 => (
            LogKind::Info,
            vec![LogValue::from(format!(
                "[Signal] status level: {tick}, label: nominal"
            ))],
        ),
        3 => (
            LogKind::Warn,
            vec![LogValue::from(format!("[Signal] drift offsetMs {}", tick * 3))],
        ),
        _ => (
            LogKind::Error,
            vec![
                LogValue::from(format!("[Signal] failed attempt: {tick}, reason: null")),
                LogValue::from(json!({"tick": tick, "retry": true})),
            ],
        ),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Tests
// ============================================================================
