//! Throttle/pause state machine.
//!
//! The [`Controller`] decides, entry by entry, whether a captured log call is
//! admitted. A manual toggle walks a fixed cycle:
//!
//! ```text
//! Normal -> Throttled(250) -> Throttled(500) -> Throttled(1000) -> Paused -> Normal
//! ```
//!
//! On top of that cycle sits the auto-pause overlay: while a search query is
//! active the controller is paused, and the previous mode is restored when the
//! query is cleared. A manual pause always wins over the overlay.
//!
//! Throttling drops entries; nothing is queued for later delivery.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for throttle gating.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for deterministic throttle tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// Modes
// ============================================================================

/// Minimum spacing between admitted entries while throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrottleDelay {
    Ms250,
    Ms500,
    Ms1000,
}

impl ThrottleDelay {
    pub fn as_millis(self) -> u64 {
        match self {
            ThrottleDelay::Ms250 => 250,
            ThrottleDelay::Ms500 => 500,
            ThrottleDelay::Ms1000 => 1000,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrottleMode {
    Normal,
    Throttled(ThrottleDelay),
    Paused,
}

impl ThrottleMode {
    /// Next mode in the manual cycle.
    pub fn next(self) -> Self {
        match self {
            ThrottleMode::Normal => ThrottleMode::Throttled(ThrottleDelay::Ms250),
            ThrottleMode::Throttled(ThrottleDelay::Ms250) => {
                ThrottleMode::Throttled(ThrottleDelay::Ms500)
            }
            ThrottleMode::Throttled(ThrottleDelay::Ms500) => {
                ThrottleMode::Throttled(ThrottleDelay::Ms1000)
            }
            ThrottleMode::Throttled(ThrottleDelay::Ms1000) => ThrottleMode::Paused,
            ThrottleMode::Paused => ThrottleMode::Normal,
        }
    }

    pub fn is_paused(self) -> bool {
        self == ThrottleMode::Paused
    }

    /// Short label for status bars.
    pub fn label(self) -> String {
        match self {
            ThrottleMode::Normal => "live".to_string(),
            ThrottleMode::Throttled(delay) => format!("{}ms", delay.as_millis()),
            ThrottleMode::Paused => "paused".to_string(),
        }
    }
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Human-readable description of a mode transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub mode: ThrottleMode,
    pub text: String,
}

impl StatusMessage {
    fn for_mode(mode: ThrottleMode) -> Self {
        let text = match mode {
            ThrottleMode::Normal => "Throttling off: showing every entry".to_string(),
            ThrottleMode::Throttled(delay) => format!(
                "Throttling on: at most one entry every {}ms",
                delay.as_millis()
            ),
            ThrottleMode::Paused => "Logging paused: new entries are discarded".to_string(),
        };
        Self { mode, text }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    DroppedPaused,
    DroppedThrottled,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        self == Admission::Admitted
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Mutable throttle state. Only [`Controller`] writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleState {
    pub mode: ThrottleMode,
    /// Last throttle delay, carried through `Paused`.
    pub delay: ThrottleDelay,
    pub last_admitted_at: Option<Instant>,
    /// Mode to restore when an auto-pause ends. Present iff the current
    /// pause was triggered by search.
    pub saved: Option<ThrottleMode>,
    pub search_active: bool,
}

impl Default for ThrottleState {
    fn default() -> Self {
        Self {
            mode: ThrottleMode::Normal,
            delay: ThrottleDelay::Ms250,
            last_admitted_at: None,
            saved: None,
            search_active: false,
        }
    }
}

/// Admission state machine.
#[derive(Debug, Default)]
pub struct Controller {
    state: ThrottleState,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ThrottleMode {
        self.state.mode
    }

    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    pub fn is_auto_paused(&self) -> bool {
        self.state.saved.is_some()
    }

    /// Advance the manual cycle.
    ///
    /// Resets throttle bookkeeping. A manual toggle during an auto-pause
    /// takes over: the snapshot is discarded so ending the search will not
    /// overwrite the manually chosen mode.
    pub fn toggle_throttle(&mut self) -> StatusMessage {
        let next = self.state.mode.next();
        self.set_mode(next);
        if self.state.saved.take().is_some() {
            tracing::debug!("manual toggle discarded auto-pause snapshot");
        }
        tracing::debug!(mode = %next, "throttle mode toggled");
        StatusMessage::for_mode(next)
    }

    /// Report whether a search query is active.
    ///
    /// Only transitions act; repeating the current value is a no-op.
    pub fn set_search_active(&mut self, active: bool) {
        if active == self.state.search_active {
            return;
        }
        self.state.search_active = active;

        if active {
            if self.state.mode.is_paused() {
                // Manual pause stays manual.
                return;
            }
            self.state.saved = Some(self.state.mode);
            self.set_mode(ThrottleMode::Paused);
            tracing::debug!("search started, auto-paused");
        } else if let Some(saved) = self.state.saved.take() {
            self.set_mode(saved);
            tracing::debug!(mode = %saved, "search ended, restored mode");
        }
    }

    /// Decide whether an entry arriving at `now` is admitted.
    pub fn admit(&mut self, now: Instant) -> Admission {
        match self.state.mode {
            ThrottleMode::Paused => Admission::DroppedPaused,
            ThrottleMode::Normal => {
                self.state.last_admitted_at = Some(now);
                Admission::Admitted
            }
            ThrottleMode::Throttled(delay) => {
                let open = self
                    .state
                    .last_admitted_at
                    .is_none_or(|last| now.saturating_duration_since(last) >= delay.as_duration());
                if open {
                    self.state.last_admitted_at = Some(now);
                    Admission::Admitted
                } else {
                    Admission::DroppedThrottled
                }
            }
        }
    }

    fn set_mode(&mut self, mode: ThrottleMode) {
        self.state.mode = mode;
        if let ThrottleMode::Throttled(delay) = mode {
            self.state.delay = delay;
        }
        self.state.last_admitted_at = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn throttled(ms: u64) -> ThrottleMode {
        match ms {
            250 => ThrottleMode::Throttled(ThrottleDelay::Ms250),
            500 => ThrottleMode::Throttled(ThrottleDelay::Ms500),
            _ => ThrottleMode::Throttled(ThrottleDelay::Ms1000),
        }
    }

    // =========================================
    // Manual cycle
    // =========================================

    #[test]
    fn test_manual_cycle_order() {
        let mut controller = Controller::new();
        let modes: Vec<_> = (0..5).map(|_| controller.toggle_throttle().mode).collect();
        assert_eq!(
            modes,
            vec![
                throttled(250),
                throttled(500),
                throttled(1000),
                ThrottleMode::Paused,
                ThrottleMode::Normal,
            ]
        );
    }

    #[test]
    fn test_cycle_returns_to_normal_and_continues() {
        let mut controller = Controller::new();
        for _ in 0..5 {
            controller.toggle_throttle();
        }
        assert_eq!(controller.mode(), ThrottleMode::Normal);
        // Sixth toggle starts the next lap.
        assert_eq!(controller.toggle_throttle().mode, throttled(250));
    }

    #[test]
    fn test_each_toggle_returns_one_message() {
        let mut controller = Controller::new();
        let msg = controller.toggle_throttle();
        assert!(msg.text.contains("250ms"), "got {}", msg.text);
        for _ in 0..3 {
            controller.toggle_throttle();
        }
        assert!(controller.mode().is_paused());
        let msg = controller.toggle_throttle();
        assert!(msg.text.contains("off"), "got {}", msg.text);
    }

    #[test]
    fn test_paused_carries_last_delay() {
        let mut controller = Controller::new();
        for _ in 0..4 {
            controller.toggle_throttle();
        }
        assert!(controller.mode().is_paused());
        assert_eq!(controller.state().delay, ThrottleDelay::Ms1000);
    }

    // =========================================
    // Admission
    // =========================================

    #[test]
    fn test_paused_admits_nothing() {
        let mut controller = Controller::new();
        for _ in 0..4 {
            controller.toggle_throttle();
        }
        let start = Instant::now();
        for i in 0..20 {
            let outcome = controller.admit(start + Duration::from_secs(i));
            assert_eq!(outcome, Admission::DroppedPaused);
        }
    }

    #[test]
    fn test_throttle_spacing() {
        for (toggles, ms) in [(1, 250u64), (2, 500), (3, 1000)] {
            let mut controller = Controller::new();
            for _ in 0..toggles {
                controller.toggle_throttle();
            }
            let start = Instant::now();
            assert!(controller.admit(start).is_admitted());
            assert_eq!(
                controller.admit(start + Duration::from_millis(ms - 1)),
                Admission::DroppedThrottled
            );
            assert!(controller.admit(start + Duration::from_millis(ms)).is_admitted());
        }
    }

    #[test]
    fn test_dropped_entry_does_not_move_gate() {
        let mut controller = Controller::new();
        controller.toggle_throttle();
        let start = Instant::now();
        assert!(controller.admit(start).is_admitted());
        assert!(!controller.admit(start + Duration::from_millis(200)).is_admitted());
        // Gate measured from the last admission, not the last attempt.
        assert!(controller.admit(start + Duration::from_millis(250)).is_admitted());
    }

    #[test]
    fn test_toggle_resets_gate() {
        let mut controller = Controller::new();
        controller.toggle_throttle();
        let start = Instant::now();
        assert!(controller.admit(start).is_admitted());
        controller.toggle_throttle();
        assert!(controller.admit(start + Duration::from_millis(1)).is_admitted());
    }

    #[test]
    fn test_normal_admits_everything() {
        let mut controller = Controller::new();
        let now = Instant::now();
        assert!((0..100).all(|_| controller.admit(now).is_admitted()));
    }

    // =========================================
    // Auto-pause overlay
    // =========================================

    #[test]
    fn test_search_pauses_and_restores() {
        let mut controller = Controller::new();
        controller.toggle_throttle();
        controller.toggle_throttle();
        controller.set_search_active(true);
        assert!(controller.mode().is_paused());
        assert!(controller.is_auto_paused());
        controller.set_search_active(false);
        assert_eq!(controller.mode(), throttled(500));
        assert!(!controller.is_auto_paused());
    }

    #[test]
    fn test_search_start_is_idempotent() {
        let mut controller = Controller::new();
        controller.set_search_active(true);
        let once = controller.state().clone();
        controller.set_search_active(true);
        assert_eq!(controller.state(), &once);
        controller.set_search_active(false);
        assert_eq!(controller.mode(), ThrottleMode::Normal);
    }

    #[test]
    fn test_search_end_without_snapshot_is_noop() {
        let mut controller = Controller::new();
        controller.toggle_throttle();
        let before = controller.state().clone();
        controller.set_search_active(false);
        assert_eq!(controller.state(), &before);

        controller.set_search_active(true);
        controller.set_search_active(false);
        controller.set_search_active(false);
        assert_eq!(controller.mode(), throttled(250));
    }

    #[test]
    fn test_manual_pause_wins_over_search() {
        let mut controller = Controller::new();
        for _ in 0..4 {
            controller.toggle_throttle();
        }
        controller.set_search_active(true);
        assert!(!controller.is_auto_paused());
        controller.set_search_active(false);
        assert!(controller.mode().is_paused());
    }

    #[test]
    fn test_manual_toggle_during_auto_pause_discards_snapshot() {
        let mut controller = Controller::new();
        controller.toggle_throttle();
        controller.set_search_active(true);
        let msg = controller.toggle_throttle();
        assert_eq!(msg.mode, ThrottleMode::Normal);
        controller.set_search_active(false);
        assert_eq!(controller.mode(), ThrottleMode::Normal);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(300));
        assert_eq!(clock.now() - start, Duration::from_millis(300));
    }
}
