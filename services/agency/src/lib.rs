// Library interface for the agency client - exposes modules for testing

pub mod batch;
pub mod client;
pub mod config;
pub mod errors;
pub mod queue;
pub mod retry_strategy;
pub mod source;
pub mod transport;

pub use client::{Client, RunSummary};
pub use config::Config;
pub use errors::{ClientError, Phase, RunError};
pub use transport::{Connector, TcpConnector, Transport};
