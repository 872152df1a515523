use thiserror::Error;

/// A single date field could not be parsed.
///
/// Field-level: the parser recovers from it and never hands it to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed date value: {raw}.")]
pub struct MalformedDate {
    /// The offending value, as JSON text.
    pub raw: String,
}

impl MalformedDate {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// The raw record lacks the minimum container structure, or states something
/// contradictory about a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed purchaser record: {reason}")]
pub struct MalformedRecord {
    pub reason: String,
}

impl MalformedRecord {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub(crate) fn with_debug(reason: &str, debug: &impl std::fmt::Display) -> Self {
        Self {
            reason: format!("{reason} ({debug})"),
        }
    }
}
