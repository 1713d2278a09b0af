use miette::Diagnostic;
pub use serde_json::Map as JsonMap;
use serde_json::Value;
pub use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod element;
pub mod writer;

pub fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn json_expected<T>(value: Option<T>, json: &JsonValue, ty: &'static str) -> miette::Result<T> {
    value.ok_or_else(|| {
        JsonFieldError::WrongType {
            key: None,
            expected: ty,
            actual: json_kind(json),
        }
        .into()
    })
}

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum JsonFieldError {
    #[error("invalid data type{}. Expected {expected} but got {actual}", key_suffix(.key))]
    WrongType {
        key: Option<String>,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("field `{key}` must have exactly {expected} elements, but got {actual}")]
    #[diagnostic(help("vector fields are written as flat arrays of numbers"))]
    WrongLength {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("field `{key}` has unknown value `{value}`")]
    #[diagnostic(help("expected one of: {expected}"))]
    UnknownVariant {
        key: String,
        value: String,
        expected: String,
    },
    #[error("field `{key}` can't be written: {value} is not a finite number")]
    NonFinite { key: String, value: f64 },
    #[error("field `{key}` is degenerate: {reason}")]
    Degenerate { key: String, reason: &'static str },
    #[error("field `{key}` must be positive, but got {value}")]
    NotPositive { key: String, value: f64 },
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        None => String::new(),
        Some(key) => format!(" in field `{key}`"),
    }
}
