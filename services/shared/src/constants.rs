//! Wire constants shared by the agency client and its tests

/// Line terminator framing every message on the wire
pub const MESSAGE_DELIMITER: char = '\n';

/// Separates a message header from its payload (`header:payload`)
pub const HEADER_SEPARATOR: char = ':';

/// Separates encoded bets inside a `bet_batch` payload
pub const BATCH_SEPARATOR: char = '*';

/// Separates the fields of a single encoded bet
pub const BET_FIELD_SEPARATOR: char = '+';

/// Separates winning document ids inside a `winners` payload
pub const WINNERS_SEPARATOR: char = ',';

/// Separates the columns of an input CSV line
pub const CSV_SEPARATOR: char = ',';

/// Maximum size of a `bet_batch` body in bytes
///
/// 8 KiB minus the byte taken by the line terminator.
pub const MAX_BATCH_BYTES: usize = 8 * 1024 - 1;

/// Longest line the agency will buffer from the aggregator, terminator included
///
/// Responses are short except `winners`, which grows with the number of
/// winning documents.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// CSV line without the agency column: name, surname, document, birthdate, number
pub const CSV_FIELDS: usize = 5;

/// CSV line with the agency id as first column
pub const CSV_FIELDS_WITH_AGENCY: usize = 6;

/// Default initial delay between result polls, in seconds
pub const POLL_INITIAL_DELAY_SECS: u64 = 1;

/// Default upper bound for the result polling delay, in seconds
///
/// Polling fails once the next delay would exceed this value.
pub const POLL_MAX_DELAY_SECS: u64 = 64;

/// Multiplier applied to the polling delay after each `not_ready`
pub const POLL_DELAY_MULTIPLIER: f64 = 2.0;
