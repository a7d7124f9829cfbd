//! Early-capture ring buffer.
//!
//! Output emitted before a sink attaches is recorded here so it can be
//! replayed once the sink is live. Capture is unconditional; throttling and
//! classification only apply at replay time.
//!
//! Draining never truncates the buffer. A watermark remembers the newest
//! entry already replayed, so a second drain with no new captures is empty
//! and the buffer stays inspectable.

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::entry::LogKind;
use crate::value::LogValue;

/// Separator pushed before replayed early entries.
pub const EARLY_LOGS_START: &str = "EARLY LOGS START";

/// Separator pushed after replayed early entries.
pub const EARLY_LOGS_END: &str = "EARLY LOGS END";

/// Default number of retained early entries.
pub const DEFAULT_EARLY_CAPACITY: usize = 200;

/// A log call recorded before any sink was attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyEntry {
    pub seq: u64,
    pub kind: LogKind,
    pub args: Vec<LogValue>,
    pub timestamp: DateTime<Local>,
}

impl EarlyEntry {
    /// Whether this entry is a stray separator marker rather than data.
    pub fn is_marker(&self) -> bool {
        matches!(
            self.args.as_slice(),
            [only] if matches!(only.as_text(), Some(EARLY_LOGS_START | EARLY_LOGS_END))
        )
    }
}

#[derive(Debug)]
pub struct EarlyBuffer {
    entries: VecDeque<EarlyEntry>,
    capacity: usize,
    next_seq: u64,
    /// Highest sequence number already handed out by [`EarlyBuffer::drain`].
    drained_through: Option<u64>,
    capturing: bool,
}

impl Default for EarlyBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EARLY_CAPACITY)
    }
}

impl EarlyBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
            drained_through: None,
            capturing: true,
        }
    }

    /// Record one call, evicting the oldest entry once over capacity.
    /// Ignored while capture is suspended.
    pub fn capture(&mut self, kind: LogKind, args: Vec<LogValue>) {
        if !self.capturing || self.capacity == 0 {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(EarlyEntry {
            seq,
            kind,
            args,
            timestamp: Local::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Stop recording (a sink is live).
    pub fn suspend(&mut self) {
        self.capturing = false;
    }

    /// Resume recording (the live sink went away).
    pub fn resume(&mut self) {
        self.capturing = true;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Entries not yet replayed, oldest first, limited to the most recent
    /// `limit`, with stray separator markers removed. Marks everything
    /// currently buffered as drained.
    pub fn drain(&mut self, limit: usize) -> Vec<EarlyEntry> {
        let pending: Vec<EarlyEntry> = self
            .entries
            .iter()
            .filter(|e| self.drained_through.is_none_or(|seen| e.seq > seen))
            .filter(|e| !e.is_marker())
            .cloned()
            .collect();

        if let Some(last) = self.entries.back() {
            self.drained_through = Some(last.seq);
        }

        let skip = pending.len().saturating_sub(limit);
        pending.into_iter().skip(skip).collect()
    }

    /// Whether a drain would return anything.
    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|e| self.drained_through.is_none_or(|seen| e.seq > seen) && !e.is_marker())
    }

    /// Everything still retained, drained or not.
    pub fn entries(&self) -> impl Iterator<Item = &EarlyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    fn texts(entries: &[EarlyEntry]) -> Vec<String> {
        entries.iter().map(|e| crate::value::join_plain(&e.args)).collect()
    }

    #[test]
    fn test_drain_returns_capture_order() {
        let mut buffer = EarlyBuffer::default();
        buffer.capture(LogKind::Log, values!["one"]);
        buffer.capture(LogKind::Warn, values!["two"]);
        buffer.capture(LogKind::Error, values!["three"]);

        let drained = buffer.drain(200);
        assert_eq!(texts(&drained), vec!["one", "two", "three"]);
        assert_eq!(drained[1].kind, LogKind::Warn);
    }

    #[test]
    fn test_drain_is_one_shot_but_keeps_entries() {
        let mut buffer = EarlyBuffer::default();
        buffer.capture(LogKind::Log, values!["one"]);
        assert_eq!(buffer.drain(200).len(), 1);
        assert!(buffer.drain(200).is_empty());
        assert!(!buffer.has_pending());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_new_captures_after_drain_are_replayed_alone() {
        let mut buffer = EarlyBuffer::default();
        buffer.capture(LogKind::Log, values!["old"]);
        buffer.drain(200);
        buffer.capture(LogKind::Info, values!["new"]);
        assert!(buffer.has_pending());
        assert_eq!(texts(&buffer.drain(200)), vec!["new"]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut buffer = EarlyBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.capture(LogKind::Log, values![i]);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(texts(&buffer.drain(200)), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_drain_limit_keeps_most_recent() {
        let mut buffer = EarlyBuffer::default();
        for i in 0..10 {
            buffer.capture(LogKind::Log, values![i]);
        }
        assert_eq!(texts(&buffer.drain(2)), vec!["8", "9"]);
        // The rest counts as drained too.
        assert!(buffer.drain(200).is_empty());
    }

    #[test]
    fn test_markers_are_never_replayed() {
        let mut buffer = EarlyBuffer::default();
        buffer.capture(LogKind::Log, values![EARLY_LOGS_START]);
        buffer.capture(LogKind::Log, values!["data"]);
        buffer.capture(LogKind::Log, values![EARLY_LOGS_END]);
        buffer.capture(LogKind::Log, values![EARLY_LOGS_END, "with extra"]);
        assert_eq!(
            texts(&buffer.drain(200)),
            vec!["data".to_string(), format!("{EARLY_LOGS_END} with extra")]
        );
    }

    #[test]
    fn test_suspended_buffer_ignores_captures() {
        let mut buffer = EarlyBuffer::default();
        buffer.suspend();
        buffer.capture(LogKind::Log, values!["ignored"]);
        assert!(buffer.is_empty());
        buffer.resume();
        buffer.capture(LogKind::Log, values!["kept"]);
        assert_eq!(buffer.len(), 1);
    }
}
