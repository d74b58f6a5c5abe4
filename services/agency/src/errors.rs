use shared::errors::ProtocolError;
use shared::protocol::Header;
use std::fmt;
use std::time::Duration;

/// Stage of a client run, used to report where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Sending,
    AwaitingFinishAck,
    Polling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::Sending => "sending",
            Phase::AwaitingFinishAck => "awaiting_finish_ack",
            Phase::Polling => "polling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Message from aggregator exceeds {limit} bytes without a line terminator")]
    MessageTooLong { limit: usize },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Batch rejected by aggregator: {reason}")]
    BatchRejected { reason: String },

    #[error("Unexpected response: {header}")]
    UnexpectedResponse { header: Header },

    #[error("Results not ready after backing off up to {max_delay:?}")]
    BackoffExhausted { max_delay: Duration },

    #[error("Stopped by shutdown signal")]
    Stopped,
}

impl ClientError {
    /// Connection-level failures, as opposed to protocol violations
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::ConnectionClosed)
    }
}

/// A failed run with the phase it failed in
#[derive(Debug, thiserror::Error)]
#[error("Client run failed while {phase} after {batches_sent} batches: {source}")]
pub struct RunError {
    pub phase: Phase,
    pub batches_sent: usize,
    #[source]
    pub source: ClientError,
}

pub type Result<T> = std::result::Result<T, ClientError>;
