//! In-process diagnostic log sink.
//!
//! logpane intercepts a host's four output channels (log/info/warn/error),
//! keeps what was printed before anything attached, and exposes the captured
//! entries through a throttled, pausable stream that a panel can render. It
//! handles:
//!
//! - Interception by explicit wrapping of channel bindings ([`Console`], [`Sink`])
//! - Early capture and one-shot replay of pre-attach output
//! - A throttle/pause state machine with a search-driven auto-pause
//! - Classification of logged values into colourable tokens
//!
//! # Modules
//!
//! - [`value`] - The closed set of loggable value shapes
//! - [`entry`] - Captured entries with memoized token rendering
//! - [`mod@classify`] - Pure text/value classification into tokens
//! - [`throttle`] - Admission state machine and clock seam
//! - [`early`] - Early-capture ring buffer
//! - [`console`] - Output-channel context object
//! - [`sink`] - The attach point, subscribers and export
//! - [`mod@format`] - Terminal formatting of tokens, entries and status
//! - [`config`] - Sink configuration
//! - [`timer`] - Cancellable scheduled tasks

pub mod classify;
pub mod config;
pub mod console;
pub mod early;
pub mod entry;
pub mod format;
pub mod sink;
pub mod throttle;
pub mod timer;
pub mod value;

// Re-export commonly used types
pub use classify::{
    Token, TokenKind, classify_args, classify_message, classify_primitive, classify_remainder,
    classify_structured,
};
pub use config::{ChannelColors, ConfigError, SinkConfig};
pub use console::{ChannelFn, Channels, Console};
pub use early::{EARLY_LOGS_END, EARLY_LOGS_START, EarlyBuffer, EarlyEntry};
pub use entry::{LogEntry, LogKind};
pub use format::{
    detect_terminal_width, format_entry, format_entry_expanded, format_expanded,
    format_mode_badge, format_status, format_token, format_tokens,
};
pub use sink::{Clipboard, ClipboardError, Sink, SinkBuilder, Subscriber};
pub use throttle::{
    Admission, Clock, Controller, ManualClock, StatusMessage, SystemClock, ThrottleDelay,
    ThrottleMode, ThrottleState,
};
pub use value::{LogValue, Primitive, Structured};
