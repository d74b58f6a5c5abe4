//! Shared error types for the agency client
//!
//! Design Philosophy:
//! - Input problems (`BetParseError`) are recoverable: the offending line is
//!   skipped and the stream continues
//! - Wire problems (`ProtocolError`) are fatal for the current run
use thiserror::Error;

/// Reasons a CSV line cannot become a `Bet`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BetParseError {
    #[error("Invalid number of fields: {found} (expected 5 or 6)")]
    FieldCount { found: usize },

    #[error("Empty field: {field}")]
    EmptyField { field: &'static str },

    #[error("Invalid {field}: {value}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("Field {field} contains a reserved character")]
    ReservedCharacter { field: &'static str },
}

impl BetParseError {
    /// Short label used for metrics and log fields
    pub fn reason(&self) -> &'static str {
        match self {
            BetParseError::FieldCount { .. } => "field_count",
            BetParseError::EmptyField { .. } => "empty_field",
            BetParseError::NotAnInteger { .. } => "not_an_integer",
            BetParseError::ReservedCharacter { .. } => "reserved_character",
        }
    }
}

/// Malformed or unexpected messages on the wire
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Message has no header separator: {0:?}")]
    MissingSeparator(String),

    #[error("Unknown message header: {0:?}")]
    UnknownHeader(String),
}
