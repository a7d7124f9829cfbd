//! Captured log entries.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local};

use crate::classify::{Token, classify_args};
use crate::value::{LogValue, join_plain};

/// The four output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Log,
    Info,
    Warn,
    Error,
}

impl LogKind {
    pub const ALL: [LogKind; 4] = [LogKind::Log, LogKind::Info, LogKind::Warn, LogKind::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Log => "log",
            LogKind::Info => "info",
            LogKind::Warn => "warn",
            LogKind::Error => "error",
        }
    }

    /// Position in [`LogKind::ALL`], used to index per-channel tables.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admitted (or buffered) log call.
///
/// Immutable after construction. The token rendering is computed on the first
/// call to [`LogEntry::rendered`] and reused afterwards.
#[derive(Debug)]
pub struct LogEntry {
    kind: LogKind,
    args: Vec<LogValue>,
    timestamp: DateTime<Local>,
    rendered: OnceLock<Vec<Token>>,
}

impl LogEntry {
    /// Create an entry stamped with the current wall-clock time.
    pub fn new(kind: LogKind, args: Vec<LogValue>) -> Self {
        Self::with_timestamp(kind, args, Local::now())
    }

    /// Create an entry with an explicit capture time (used for replay).
    pub fn with_timestamp(kind: LogKind, args: Vec<LogValue>, timestamp: DateTime<Local>) -> Self {
        Self {
            kind,
            args,
            timestamp,
            rendered: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn args(&self) -> &[LogValue] {
        &self.args
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Classified tokens, computed once.
    pub fn rendered(&self) -> &[Token] {
        self.rendered.get_or_init(|| classify_args(&self.args))
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    /// Arguments joined as plain text.
    pub fn plain_text(&self) -> String {
        join_plain(&self.args)
    }

    /// Case-insensitive substring match against the plain text.
    ///
    /// An empty (or whitespace-only) query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        self.plain_text()
            .to_lowercase()
            .contains(&query.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_rendered_is_memoized() {
        let entry = LogEntry::new(LogKind::Info, values!["[Net] connect host", 8080]);
        assert!(!entry.is_rendered());
        let first = entry.rendered().as_ptr();
        assert!(entry.is_rendered());
        let second = entry.rendered().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let entry = LogEntry::new(LogKind::Warn, values!["Disk usage HIGH", 91]);
        assert!(entry.matches("high"));
        assert!(entry.matches("usage high 91"));
        assert!(entry.matches("   "));
        assert!(!entry.matches("low"));
    }

    #[test]
    fn test_kind_table_order() {
        for (i, kind) in LogKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(LogKind::Error.to_string(), "error");
    }
}
