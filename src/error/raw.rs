//! Raw failure values as they are raised, before normalization.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

use super::classification::{ErrorCategory, ErrorRecord};

/// Boxed error accepted from application code.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure that carries its own registry code and, optionally, its category.
///
/// Application error types that already know how they should be classified
/// convert into this shape (or return it directly) so the normalizer can use
/// their code instead of guessing.
#[derive(Debug)]
pub struct CodedFailure {
    code: String,
    category: Option<ErrorCategory>,
    message: String,
    source: Option<BoxError>,
}

impl CodedFailure {
    /// Creates a coded failure.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            category: None,
            message: message.into(),
            source: None,
        }
    }

    /// Sets the category, overriding the one of the registry entry.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the registry code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the explicit category, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.category
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CodedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for CodedFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Code and category extracted from a failure that exposes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredShape {
    pub code: String,
    pub category: Option<ErrorCategory>,
}

/// Every kind of value the engine can be handed as a failure.
#[derive(Debug)]
pub enum RawFailure {
    /// An already normalized record.
    Record(Box<ErrorRecord>),
    /// A failure carrying its own code.
    Coded(CodedFailure),
    /// Any other Rust error.
    Error(BoxError),
    /// The payload of a panic, rendered to text.
    Panic(String),
    /// A bare message.
    Message(String),
    /// An arbitrary value (number, object, ...).
    Value(serde_json::Value),
    /// Nothing was provided.
    Absent,
}

impl RawFailure {
    /// Wraps any error, recognizing records and coded failures.
    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from(Box::new(error) as BoxError)
    }

    /// Converts a panic payload into a failure.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Self::Panic((*message).to_string())
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::Panic(message.clone())
        } else {
            Self::Panic("panic with a non-string payload".to_string())
        }
    }

    /// Returns the record if this failure is already canonical.
    pub fn as_record(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Record(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Returns the code and category when the failure exposes them itself.
    ///
    /// Coded failures, errors whose source chain contains a coded failure, and
    /// JSON objects with a string `code` field qualify.
    pub fn structured(&self) -> Option<StructuredShape> {
        match self {
            Self::Coded(coded) => Some(StructuredShape {
                code: coded.code.clone(),
                category: coded.category,
            }),
            Self::Error(error) => {
                let root: &(dyn StdError + 'static) = &**error;
                let mut current = Some(root);
                while let Some(err) = current {
                    if let Some(coded) = err.downcast_ref::<CodedFailure>() {
                        return Some(StructuredShape {
                            code: coded.code.clone(),
                            category: coded.category,
                        });
                    }
                    current = err.source();
                }
                None
            }
            Self::Value(serde_json::Value::Object(map)) => {
                let code = map.get("code")?.as_str()?.trim();
                if code.is_empty() {
                    return None;
                }
                Some(StructuredShape {
                    code: code.to_string(),
                    category: map
                        .get("category")
                        .and_then(|c| c.as_str())
                        .and_then(ErrorCategory::parse),
                })
            }
            _ => None,
        }
    }

    /// Developer-facing description of the failure.
    pub fn describe(&self) -> String {
        match self {
            Self::Record(record) => record.message.clone(),
            Self::Coded(coded) => coded.message.clone(),
            Self::Error(error) => error.to_string(),
            Self::Panic(message) => format!("panic: {}", message),
            Self::Message(message) => message.clone(),
            Self::Value(serde_json::Value::Object(map)) => match map.get("message") {
                Some(serde_json::Value::String(message)) => message.clone(),
                _ => serde_json::Value::Object(map.clone()).to_string(),
            },
            Self::Value(serde_json::Value::String(message)) => message.clone(),
            Self::Value(value) => format!("non-error value thrown: {}", value),
            Self::Absent => "no failure value was provided".to_string(),
        }
    }

    /// Every piece of text the failure carries, outermost first.
    ///
    /// Used by heuristics that look for connectivity wording in nested causes.
    pub fn texts(&self) -> Vec<String> {
        let mut texts = vec![self.describe()];
        let mut current: Option<&(dyn StdError + 'static)> = match self {
            Self::Error(error) => error.source(),
            Self::Coded(coded) => coded.source(),
            _ => None,
        };
        while let Some(err) = current {
            texts.push(err.to_string());
            current = err.source();
        }
        texts
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<BoxError> for RawFailure {
    fn from(error: BoxError) -> Self {
        let error = match error.downcast::<ErrorRecord>() {
            Ok(record) => return Self::Record(record),
            Err(error) => error,
        };
        match error.downcast::<CodedFailure>() {
            Ok(coded) => Self::Coded(*coded),
            Err(error) => Self::Error(error),
        }
    }
}

impl From<ErrorRecord> for RawFailure {
    fn from(record: ErrorRecord) -> Self {
        Self::Record(Box::new(record))
    }
}

impl From<CodedFailure> for RawFailure {
    fn from(coded: CodedFailure) -> Self {
        Self::Coded(coded)
    }
}

impl From<std::io::Error> for RawFailure {
    fn from(error: std::io::Error) -> Self {
        Self::Error(Box::new(error))
    }
}

impl From<tokio::time::error::Elapsed> for RawFailure {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::Error(Box::new(error))
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<serde_json::Value> for RawFailure {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Absent,
            other => Self::Value(other),
        }
    }
}

impl From<i64> for RawFailure {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for RawFailure {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl<T: Into<RawFailure>> From<Option<T>> for RawFailure {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Wrapper(CodedFailure);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped: {}", self.0)
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_constructor_recognizes_coded_failure() {
        let raw = RawFailure::error(CodedFailure::new("AUTH_UNAUTHORIZED", "nope"));
        assert!(matches!(raw, RawFailure::Coded(_)));
    }

    #[test]
    fn test_structured_walks_source_chain() {
        let raw = RawFailure::error(Wrapper(
            CodedFailure::new("STREAM_DISCONNECTED", "socket closed")
                .with_category(ErrorCategory::Stream),
        ));

        let shape = raw.structured().expect("coded failure in chain");
        assert_eq!(shape.code, "STREAM_DISCONNECTED");
        assert_eq!(shape.category, Some(ErrorCategory::Stream));
    }

    #[test]
    fn test_structured_json_object() {
        let raw = RawFailure::from(json!({
            "code": "VALIDATION_FAILED",
            "category": "validation",
            "message": "email is invalid",
        }));

        let shape = raw.structured().unwrap();
        assert_eq!(shape.code, "VALIDATION_FAILED");
        assert_eq!(shape.category, Some(ErrorCategory::Validation));
        assert_eq!(raw.describe(), "email is invalid");
    }

    #[test]
    fn test_structured_ignores_blank_code() {
        let raw = RawFailure::from(json!({ "code": "  " }));
        assert!(raw.structured().is_none());
    }

    #[test]
    fn test_non_object_values() {
        assert!(RawFailure::from("plain").structured().is_none());
        assert!(RawFailure::from(42_i64).structured().is_none());
        assert!(matches!(RawFailure::from(json!(null)), RawFailure::Absent));
        assert!(matches!(RawFailure::from(None::<String>), RawFailure::Absent));
        assert_eq!(
            RawFailure::from(42_i64).describe(),
            "non-error value thrown: 42"
        );
    }

    #[test]
    fn test_from_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(
            RawFailure::from_panic(payload.as_ref()).describe(),
            "panic: static message"
        );

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(
            RawFailure::from_panic(payload.as_ref()).describe(),
            "panic: owned message"
        );

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert!(matches!(
            RawFailure::from_panic(payload.as_ref()),
            RawFailure::Panic(_)
        ));
    }

    #[test]
    fn test_texts_include_nested_causes() {
        let raw = RawFailure::error(Wrapper(CodedFailure::new("X", "inner cause")));
        let texts = raw.texts();
        assert_eq!(texts[0], "wrapped: inner cause");
        assert!(texts.contains(&"inner cause".to_string()));
    }
}
