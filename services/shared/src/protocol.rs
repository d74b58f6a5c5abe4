//! Line protocol spoken between an agency and the lottery aggregator
//!
//! Every message is `<header>:<payload>` followed by a line terminator. The
//! terminator is handled by the transport; this module only deals with the
//! text between terminators.

use std::fmt;
use std::str::FromStr;

use crate::constants::{BATCH_SEPARATOR, HEADER_SEPARATOR, WINNERS_SEPARATOR};
use crate::errors::ProtocolError;
use crate::types::AgencyId;

/// Message type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Header {
    // Agency -> aggregator
    Identification,
    BetBatch,
    Finish,
    RequestResults,
    // Aggregator -> agency
    Success,
    Failure,
    NotReady,
    Winners,
}

impl Header {
    pub const ALL: [Header; 8] = [
        Header::Identification,
        Header::BetBatch,
        Header::Finish,
        Header::RequestResults,
        Header::Success,
        Header::Failure,
        Header::NotReady,
        Header::Winners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Header::Identification => "agency",
            Header::BetBatch => "bet_batch",
            Header::Finish => "finish",
            Header::RequestResults => "request_results",
            Header::Success => "success",
            Header::Failure => "failure",
            Header::NotReady => "not_ready",
            Header::Winners => "winners",
        }
    }
}

impl FromStr for Header {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Header::ALL
            .into_iter()
            .find(|header| header.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownHeader(s.to_string()))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: String,
}

impl Message {
    pub fn new(header: Header, payload: impl Into<String>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// First message on every connection
    pub fn identification(agency: AgencyId) -> Self {
        Self::new(Header::Identification, agency.to_string())
    }

    /// Batch of already encoded bets
    pub fn bet_batch<S: AsRef<str>>(bets: &[S]) -> Self {
        let payload = bets
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(BATCH_SEPARATOR.to_string().as_str());
        Self::new(Header::BetBatch, payload)
    }

    pub fn finish() -> Self {
        Self::new(Header::Finish, "")
    }

    pub fn request_results() -> Self {
        Self::new(Header::RequestResults, "")
    }

    pub fn success() -> Self {
        Self::new(Header::Success, "")
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::new(Header::Failure, reason)
    }

    pub fn not_ready() -> Self {
        Self::new(Header::NotReady, "")
    }

    pub fn winners<S: AsRef<str>>(documents: &[S]) -> Self {
        let payload = documents
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(WINNERS_SEPARATOR.to_string().as_str());
        Self::new(Header::Winners, payload)
    }

    /// `header:payload`, without the line terminator
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.header, HEADER_SEPARATOR, self.payload)
    }

    /// Split on the first header separator; the payload may contain more.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let (header, payload) = raw
            .split_once(HEADER_SEPARATOR)
            .ok_or_else(|| ProtocolError::MissingSeparator(raw.to_string()))?;

        Ok(Self {
            header: header.parse()?,
            payload: payload.to_string(),
        })
    }
}

/// Encoded bets carried by a `bet_batch` payload
pub fn decode_bet_batch(payload: &str) -> Vec<&str> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload.split(BATCH_SEPARATOR).collect()
}

/// Winning document ids carried by a `winners` payload
///
/// An empty payload means no winners, not a single empty id.
pub fn decode_winners(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload.split(WINNERS_SEPARATOR).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_header() {
        for header in Header::ALL {
            for payload in ["", "42", "a+b+c*d+e+f", "reason: with colon"] {
                let message = Message::new(header, payload);
                assert_eq!(Message::decode(&message.encode()).unwrap(), message);
            }
        }
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(Message::identification(AgencyId::new(3)).encode(), "agency:3");
        assert_eq!(Message::finish().encode(), "finish:");
        assert_eq!(Message::request_results().encode(), "request_results:");
        assert_eq!(
            Message::bet_batch(&["1+a+b+1+2000-01-01+2", "1+c+d+3+2000-01-01+4"]).encode(),
            "bet_batch:1+a+b+1+2000-01-01+2*1+c+d+3+2000-01-01+4"
        );
        assert_eq!(Message::winners(&["123", "456"]).encode(), "winners:123,456");
    }

    #[test]
    fn test_decode_rejects_unknown_header() {
        assert_eq!(
            Message::decode("shutdown:").unwrap_err(),
            ProtocolError::UnknownHeader("shutdown".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        assert!(matches!(
            Message::decode("success"),
            Err(ProtocolError::MissingSeparator(_))
        ));
    }

    #[test]
    fn test_decode_winners() {
        assert_eq!(decode_winners("123,456"), vec!["123", "456"]);
        assert!(decode_winners("").is_empty());
    }

    #[test]
    fn test_decode_winners_keeps_inner_empty_entries() {
        assert_eq!(decode_winners("123,,456"), vec!["123", "", "456"]);
        assert_eq!(decode_winners(","), vec!["", ""]);
    }

    #[test]
    fn test_decode_bet_batch() {
        assert_eq!(decode_bet_batch("a*b*c"), vec!["a", "b", "c"]);
        assert!(decode_bet_batch("").is_empty());
    }
}
