//! Values handed to an output channel.
//!
//! Every argument is converted into a [`LogValue`] once, at the boundary, so
//! the classifier and the sink only ever match on a closed set of shapes:
//! primitives (text, number, boolean, null, absent) and structured values
//! (records, sequences, or an opaque placeholder for values serde_json could
//! not represent).
//!
//! # Example
//!
//! ```
//! use logpane::{LogValue, values};
//! use serde_json::json;
//!
//! let args = values!["[Auth] login", 42, true, json!({"user": "ada"})];
//! assert_eq!(args.len(), 4);
//! assert!(args[3].is_structured());
//! assert_eq!(LogValue::from(None::<i32>).plain_text(), "undefined");
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A scalar argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
    /// No value at all (an omitted optional argument).
    Absent,
}

/// A composite argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured {
    Record(Map<String, Value>),
    Sequence(Vec<Value>),
    /// A value that could not be represented as JSON. Rendered as a
    /// placeholder, never serialized.
    Opaque { type_name: String, reason: String },
}

/// One argument of a log call.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Primitive(Primitive),
    Structured(Structured),
}

impl LogValue {
    /// Text argument.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Primitive(Primitive::Text(text.into()))
    }

    /// Capture any serializable value.
    ///
    /// Values serde_json cannot represent (maps with non-string keys, failing
    /// `Serialize` impls) become [`Structured::Opaque`] instead of an error.
    pub fn capture<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self::from(value),
            Err(err) => Self::Structured(Structured::Opaque {
                type_name: short_type_name::<T>(),
                reason: err.to_string(),
            }),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// The text content, if this is a text primitive.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Primitive(Primitive::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Uncoloured single-line rendering, as a plain terminal would print it.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Primitive(Primitive::Text(text)) => text.clone(),
            Self::Primitive(Primitive::Number(n)) => n.to_string(),
            Self::Primitive(Primitive::Bool(b)) => b.to_string(),
            Self::Primitive(Primitive::Null) => "null".to_string(),
            Self::Primitive(Primitive::Absent) => "undefined".to_string(),
            Self::Structured(Structured::Record(map)) => Value::Object(map.clone()).to_string(),
            Self::Structured(Structured::Sequence(items)) => Value::Array(items.clone()).to_string(),
            Self::Structured(Structured::Opaque { type_name, .. }) => {
                format!("[unserializable {type_name}]")
            }
        }
    }
}

/// Join arguments the way a plain console prints them: space separated.
pub fn join_plain(args: &[LogValue]) -> String {
    args.iter()
        .map(LogValue::plain_text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    // Keep generics intact, strip the module path of the outer type.
    let outer_end = full.find('<').unwrap_or(full.len());
    let start = full[..outer_end].rfind("::").map_or(0, |i| i + 2);
    full[start..].to_string()
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plain_text())
    }
}

impl From<Value> for LogValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Primitive(Primitive::Null),
            Value::Bool(b) => Self::Primitive(Primitive::Bool(b)),
            Value::Number(n) => Self::Primitive(Primitive::Number(n)),
            Value::String(s) => Self::Primitive(Primitive::Text(s)),
            Value::Array(items) => Self::Structured(Structured::Sequence(items)),
            Value::Object(map) => Self::Structured(Structured::Record(map)),
        }
    }
}

impl From<&str> for LogValue {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for LogValue {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&String> for LogValue {
    fn from(text: &String) -> Self {
        Self::text(text.clone())
    }
}

impl From<bool> for LogValue {
    fn from(b: bool) -> Self {
        Self::Primitive(Primitive::Bool(b))
    }
}

impl From<()> for LogValue {
    fn from(_: ()) -> Self {
        Self::Primitive(Primitive::Null)
    }
}

impl<T: Into<LogValue>> From<Option<T>> for LogValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Primitive(Primitive::Absent), Into::into)
    }
}

impl From<f64> for LogValue {
    fn from(n: f64) -> Self {
        // NaN and infinities have no JSON number form; keep them readable.
        match Number::from_f64(n) {
            Some(n) => Self::Primitive(Primitive::Number(n)),
            None => Self::text(n.to_string()),
        }
    }
}

impl From<f32> for LogValue {
    fn from(n: f32) -> Self {
        Self::from(f64::from(n))
    }
}

macro_rules! int_into_log_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for LogValue {
                fn from(n: $t) -> Self {
                    Self::Primitive(Primitive::Number(Number::from(n)))
                }
            }
        )*
    };
}

int_into_log_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Build a `Vec<LogValue>` from heterogeneous expressions.
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::LogValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::LogValue::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_json_values_map_to_closed_union() {
        assert_eq!(LogValue::from(json!(null)), LogValue::Primitive(Primitive::Null));
        assert_eq!(LogValue::from(json!("x")).as_text(), Some("x"));
        assert!(LogValue::from(json!([1, 2])).is_structured());
        assert!(LogValue::from(json!({"a": 1})).is_structured());
    }

    #[test]
    fn test_capture_unrepresentable_value_is_opaque() {
        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert(vec![1u8], "value");
        match LogValue::capture(&map) {
            LogValue::Structured(Structured::Opaque { type_name, .. }) => {
                assert!(type_name.starts_with("HashMap"), "got {type_name}");
            }
            other => panic!("expected opaque value, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(LogValue::from(42).plain_text(), "42");
        assert_eq!(LogValue::from(1.5).plain_text(), "1.5");
        assert_eq!(LogValue::from(f64::NAN).plain_text(), "NaN");
        assert_eq!(LogValue::from(()).plain_text(), "null");
        assert_eq!(LogValue::from(None::<&str>).plain_text(), "undefined");
        assert_eq!(LogValue::from(json!({"a": [1]})).plain_text(), r#"{"a":[1]}"#);
    }

    #[test]
    fn test_values_macro_and_join() {
        let args = values!["count", 3, false];
        assert_eq!(join_plain(&args), "count 3 false");
        assert!(values![].is_empty());
    }
}
