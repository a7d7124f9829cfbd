//! Pure formatting functions for terminal output.
//!
//! All coloured output goes through the `format_*` helpers defined here, so
//! the classifier and the sink stay free of presentation concerns.
//!
//! # Categories
//!
//! ## Entry Formatters
//! - [`format_token`] / [`format_tokens`] - Colour classified tokens
//! - [`format_entry`] - One entry line (`time kind tokens`)
//! - [`format_entry_expanded`] - Entry line plus the full serialization of
//!   every structured argument
//!
//! ## Other Formatters
//! - [`format_status`] - Throttle status line
//! - [`format_mode_badge`] - Compact mode indicator for a panel header
//! - [`format_expanded`] - Pretty JSON rendered as a code block

use std::sync::LazyLock;

use colored::{ColoredString, Colorize};
use termimad::MadSkin;

use crate::classify::{Token, TokenKind};
use crate::config::ChannelColors;
use crate::early::{EARLY_LOGS_END, EARLY_LOGS_START};
use crate::entry::LogEntry;
use crate::throttle::{StatusMessage, ThrottleMode};

// ============================================================================
// Constants
// ============================================================================

/// Default width when terminal size cannot be detected (e.g., piped output).
const DEFAULT_WIDTH: usize = 120;

/// Timestamp layout for entry lines.
const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Termimad skin for expanded values. Left-aligns headers.
static SKIN: LazyLock<MadSkin> = LazyLock::new(|| {
    let mut skin = MadSkin::default();
    for h in &mut skin.headers {
        h.align = termimad::Alignment::Left;
    }
    skin
});

/// Detect the current terminal width, falling back to [`DEFAULT_WIDTH`].
pub fn detect_terminal_width() -> usize {
    let (width, _) = termimad::terminal_size();
    let width = width as usize;
    if width == 0 { DEFAULT_WIDTH } else { width }
}

// ============================================================================
// Token Formatting
// ============================================================================

/// Colour one token according to its category.
pub fn format_token(token: &Token) -> String {
    let text = token.text.as_str();
    let styled: ColoredString = match token.kind {
        TokenKind::Module => text.magenta().bold(),
        TokenKind::Action => text.cyan(),
        TokenKind::Param => text.yellow(),
        TokenKind::Property => text.blue(),
        TokenKind::Value => text.green(),
        TokenKind::Identifier => text.bright_cyan(),
        TokenKind::Number => text.bright_yellow(),
        TokenKind::Boolean => text.bright_magenta(),
        TokenKind::Null => text.bright_black(),
        TokenKind::Absent => text.bright_black().italic(),
        TokenKind::Punctuation => text.dimmed(),
        TokenKind::Preview => text.italic(),
        TokenKind::Placeholder => text.red().dimmed(),
        TokenKind::Text | TokenKind::Separator => return text.to_string(),
    };
    styled.to_string()
}

/// Colour and concatenate a token sequence.
///
/// ```
/// use logpane::{classify_message, format_tokens};
///
/// colored::control::set_override(false);
/// let tokens = classify_message("[Auth] login userId 42");
/// assert_eq!(format_tokens(&tokens), "[Auth] login userId 42");
/// colored::control::unset_override();
/// ```
pub fn format_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(format_token).collect()
}

// ============================================================================
// Entry Formatting
// ============================================================================

/// Format one entry as `HH:MM:SS.mmm kind  tokens`.
///
/// The kind label uses the channel colour from `colors`. Early-replay
/// separators are drawn as dimmed rules instead.
pub fn format_entry(entry: &LogEntry, colors: &ChannelColors) -> String {
    let time = entry.timestamp().format(TIME_FORMAT).to_string();

    if let [only] = entry.args() {
        if let Some(marker @ (EARLY_LOGS_START | EARLY_LOGS_END)) = only.as_text() {
            return format!("{} {}", time.dimmed(), format!("──── {marker} ────").dimmed());
        }
    }

    let label = format!("{:<5}", entry.kind().as_str());
    format!(
        "{} {} {}",
        time.dimmed(),
        label.color(colors.color(entry.kind())).bold(),
        format_tokens(entry.rendered())
    )
}

/// [`format_entry`] followed by the pretty serialization of every structured
/// argument, each rendered as a code block wrapped to `width`.
pub fn format_entry_expanded(entry: &LogEntry, colors: &ChannelColors, width: usize) -> String {
    let mut out = format_entry(entry, colors);
    for expanded in entry.rendered().iter().filter_map(|t| t.expanded.as_deref()) {
        out.push('\n');
        out.push_str(format_expanded(expanded, width).trim_end_matches('\n'));
    }
    out
}

/// Render pretty JSON as a code block, wrapped to `width` columns.
pub fn format_expanded(json: &str, width: usize) -> String {
    use termimad::FmtText;
    let markdown = format!("```\n{json}\n```");
    FmtText::from(&SKIN, &markdown, Some(width)).to_string()
}

// ============================================================================
// Status Formatting
// ============================================================================

/// Format a throttle status message for display.
pub fn format_status(status: &StatusMessage) -> String {
    format!("{} {}", format_mode_badge(status.mode), status.text)
}

/// Compact mode indicator: `[live]`, `[250ms]`, `[paused]`.
pub fn format_mode_badge(mode: ThrottleMode) -> String {
    let badge = format!("[{}]", mode.label());
    match mode {
        ThrottleMode::Normal => badge.green().to_string(),
        ThrottleMode::Throttled(_) => badge.yellow().to_string(),
        ThrottleMode::Paused => badge.red().bold().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
