//! Token classification for logged values.
//!
//! [`classify_args`] turns the arguments of one log call into a flat,
//! left-to-right sequence of [`Token`]s that a renderer can colour. It is pure
//! and total: every input produces tokens, unknown shapes fall back to
//! [`TokenKind::Text`], and structured values that cannot be serialized
//! degrade to a [`TokenKind::Placeholder`].
//!
//! # Message shape
//!
//! A first argument of the form `[<module>] <action> [<param>] [<rest>]` is
//! decomposed into module, action and optional parameter tokens. The rest is
//! split into property/value pairs when it contains `key: value` structure,
//! otherwise it is classified word by word.
//!
//! ```
//! use logpane::{LogValue, TokenKind, classify_args};
//!
//! let tokens = classify_args(&[LogValue::from("[Auth] login userId 42")]);
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     [TokenKind::Module, TokenKind::Action, TokenKind::Param, TokenKind::Number]
//! );
//! assert_eq!(tokens[0].text, "[Auth] ");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::value::{LogValue, Primitive, Structured};

// ============================================================================
// Constants
// ============================================================================

/// Fields or elements shown in a collapsed preview.
const PREVIEW_FIELDS: usize = 3;

/// Maximum length of one field/element preview, ellipsis included.
const FIELD_PREVIEW_LEN: usize = 10;

/// Maximum length of a whole collapsed preview, ellipsis included.
const MAX_PREVIEW_LEN: usize = 100;

const ELLIPSIS: char = '…';

/// Text of the token placed between adjacent arguments.
const ARG_SEPARATOR: &str = " ";

/// Placeholder for a structured value whose serialization failed.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[unserializable]";

static STRUCTURED_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?s)(\[[^\]]+\]\s+)(\w+)(?:(\s+)(\w+))?(?:(\s+)(.*))?$")
        .expect("structured message pattern is valid")
});

static BRACKETED_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[A-Za-z_$][\w$.\-]*\]$").expect("bracketed identifier pattern is valid")
});

static PROPERTY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*:$").expect("property name pattern is valid")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*$").expect("identifier pattern is valid")
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?$").expect("number pattern is valid")
});

// ============================================================================
// Tokens
// ============================================================================

/// Category of a rendered token. Each category maps to one colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `[Module] ` prefix of a structured message.
    Module,
    /// Action word following the module.
    Action,
    /// Optional parameter word following the action.
    Param,
    /// `key:` in a property list or a standalone `word:`.
    Property,
    /// Generic value in a property list.
    Value,
    Identifier,
    Text,
    Number,
    Boolean,
    Null,
    Absent,
    /// `, ` between property/value pairs.
    Punctuation,
    /// Collapsed summary of a structured value.
    Preview,
    /// Stand-in for a value that could not be serialized.
    Placeholder,
    /// Gap between adjacent arguments.
    Separator,
}

/// One classified piece of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Full pretty serialization, only set on [`TokenKind::Preview`] tokens.
    pub expanded: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            expanded: None,
        }
    }

    fn preview(text: String, expanded: String) -> Self {
        Self {
            kind: TokenKind::Preview,
            text,
            expanded: Some(expanded),
        }
    }

    fn separator() -> Self {
        Self::new(TokenKind::Separator, ARG_SEPARATOR)
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Classify the arguments of one log call.
///
/// Only the first argument is eligible for message-shape decomposition; later
/// text arguments are classified as single primitives. A separator token is
/// placed between adjacent arguments, never after the last.
pub fn classify_args(args: &[LogValue]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            tokens.push(Token::separator());
        }
        match arg {
            LogValue::Primitive(Primitive::Text(text)) if i == 0 => {
                classify_message_into(text, &mut tokens);
            }
            LogValue::Primitive(primitive) => tokens.push(classify_primitive(primitive)),
            LogValue::Structured(structured) => tokens.push(classify_structured(structured)),
        }
    }
    tokens
}

/// Classify message text as the first argument of a log call.
pub fn classify_message(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    classify_message_into(text, &mut tokens);
    tokens
}

/// Classify the free-form remainder of a structured message.
///
/// ```
/// use logpane::{TokenKind, classify_remainder};
///
/// let tokens = classify_remainder("retries: 3, host: db1");
/// assert_eq!(tokens[0].kind, TokenKind::Property);
/// assert_eq!(tokens[1].kind, TokenKind::Number);
/// ```
pub fn classify_remainder(rest: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    classify_remainder_into(rest, &mut tokens);
    tokens
}

/// Classify a single primitive argument.
pub fn classify_primitive(primitive: &Primitive) -> Token {
    match primitive {
        Primitive::Text(text) => Token::new(text_kind(text), text.as_str()),
        Primitive::Number(n) => Token::new(TokenKind::Number, n.to_string()),
        Primitive::Bool(b) => Token::new(TokenKind::Boolean, b.to_string()),
        Primitive::Null => Token::new(TokenKind::Null, "null"),
        Primitive::Absent => Token::new(TokenKind::Absent, "undefined"),
    }
}

/// Collapse a structured value into a preview token with its full
/// serialization attached.
pub fn classify_structured(structured: &Structured) -> Token {
    let (preview, value) = match structured {
        Structured::Record(map) => (preview_record(map), Value::Object(map.clone())),
        Structured::Sequence(items) => (preview_sequence(items), Value::Array(items.clone())),
        Structured::Opaque { type_name, .. } => {
            return Token::new(
                TokenKind::Placeholder,
                format!("[unserializable {type_name}]"),
            );
        }
    };
    match serde_json::to_string_pretty(&value) {
        Ok(expanded) => Token::preview(truncate(&preview, MAX_PREVIEW_LEN), expanded),
        Err(_) => Token::new(TokenKind::Placeholder, UNSERIALIZABLE_PLACEHOLDER),
    }
}

// ============================================================================
// Message Decomposition
// ============================================================================

fn classify_message_into(text: &str, out: &mut Vec<Token>) {
    let Some(caps) = STRUCTURED_MESSAGE.captures(text) else {
        classify_words_into(text, out);
        return;
    };

    // Each word keeps the whitespace that followed it in the source text.
    let text_of = |i: usize| caps.get(i).map_or("", |m| m.as_str());
    let param = caps.get(4).map(|m| m.as_str());
    let rest = text_of(6);

    out.push(Token::new(TokenKind::Module, &caps[1]));
    match param {
        Some(param) => {
            out.push(Token::new(TokenKind::Action, format!("{}{}", &caps[2], text_of(3))));
            out.push(Token::new(TokenKind::Param, format!("{param}{}", text_of(5))));
        }
        None => {
            out.push(Token::new(TokenKind::Action, format!("{}{}", &caps[2], text_of(5))));
        }
    }

    if !rest.is_empty() {
        classify_remainder_into(rest, out);
    }
}

fn classify_remainder_into(rest: &str, out: &mut Vec<Token>) {
    if rest.contains(':') {
        classify_properties_into(rest, out);
    } else {
        classify_words_into(rest, out);
    }
}

/// Split `key: value, key: value` text into alternating property/value
/// tokens.
///
/// A comma only separates pairs inside a value region (opened by a colon);
/// after it, the next colon closes the following key. Colons inside a value
/// are part of the value.
fn classify_properties_into(rest: &str, out: &mut Vec<Token>) {
    let mut buf = String::new();
    let mut in_value = false;
    let mut chars = rest.chars().peekable();

    while let Some(ch) = chars.next() {
        if !in_value && ch == ':' {
            buf.push(ch);
            while let Some(&next) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                buf.push(next);
                chars.next();
            }
            out.push(Token::new(TokenKind::Property, std::mem::take(&mut buf)));
            in_value = true;
        } else if in_value && ch == ',' {
            push_value(std::mem::take(&mut buf), out);
            let mut punct = String::from(ch);
            while let Some(&next) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                punct.push(next);
                chars.next();
            }
            out.push(Token::new(TokenKind::Punctuation, punct));
            in_value = false;
        } else {
            buf.push(ch);
        }
    }

    if in_value {
        push_value(buf, out);
    } else if !buf.is_empty() {
        // Trailing text after the last comma that never reached a colon.
        classify_words_into(&buf, out);
    }
}

fn push_value(text: String, out: &mut Vec<Token>) {
    if text.is_empty() {
        return;
    }
    let trimmed = text.trim();
    let kind = if trimmed == "null" {
        TokenKind::Null
    } else if NUMBER.is_match(trimmed) {
        TokenKind::Number
    } else {
        TokenKind::Value
    };
    out.push(Token::new(kind, text));
}

/// Word-by-word classification that keeps every whitespace character:
/// leading whitespace becomes its own text token and each word carries its
/// trailing whitespace.
fn classify_words_into(text: &str, out: &mut Vec<Token>) {
    let body = text.trim_start();
    let lead = &text[..text.len() - body.len()];
    if !lead.is_empty() {
        out.push(Token::new(TokenKind::Text, lead));
    }

    for segment in split_words(body) {
        let word = segment.trim_end();
        let kind = if NUMBER.is_match(word) {
            TokenKind::Number
        } else {
            text_kind(word)
        };
        out.push(Token::new(kind, segment));
    }
}

/// Split into `word + trailing whitespace` segments. Input must not start
/// with whitespace.
fn split_words(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut prev_ws = false;
    for (i, ch) in text.char_indices() {
        let ws = ch.is_whitespace();
        if prev_ws && !ws {
            segments.push(&text[start..i]);
            start = i;
        }
        prev_ws = ws;
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }
    segments
}

/// Fixed precedence for a single piece of text.
fn text_kind(text: &str) -> TokenKind {
    if BRACKETED_IDENTIFIER.is_match(text) {
        TokenKind::Identifier
    } else if PROPERTY_NAME.is_match(text) {
        TokenKind::Property
    } else if IDENTIFIER.is_match(text) {
        TokenKind::Identifier
    } else {
        TokenKind::Text
    }
}

// ============================================================================
// Structured Previews
// ============================================================================

fn preview_record(map: &serde_json::Map<String, Value>) -> String {
    let fields: Vec<String> = map
        .iter()
        .take(PREVIEW_FIELDS)
        .map(|(key, value)| format!("{key}: {}", preview_field(value)))
        .collect();
    let more = if map.len() > PREVIEW_FIELDS { ", …" } else { "" };
    format!("Object {{{}{more}}}", fields.join(", "))
}

fn preview_sequence(items: &[Value]) -> String {
    let elements: Vec<String> = items.iter().take(PREVIEW_FIELDS).map(preview_field).collect();
    let more = if items.len() > PREVIEW_FIELDS { ", …" } else { "" };
    format!("Array({}) [{}{more}]", items.len(), elements.join(", "))
}

/// One-level summary of a nested value. Nested structures collapse to their
/// kind name.
fn preview_field(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", truncate(s, FIELD_PREVIEW_LEN)),
        Value::Array(items) => format!("Array({})", items.len()),
        Value::Object(_) => "{…}".to_string(),
        other => truncate(&other.to_string(), FIELD_PREVIEW_LEN),
    }
}

/// Truncate to at most `max` characters, the last being an ellipsis when
/// anything was cut.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

// ============================================================================
// Tests
// ============================================================================
