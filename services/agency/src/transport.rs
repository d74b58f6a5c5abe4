//! Line framed connection to the aggregator

use async_trait::async_trait;
use shared::protocol::Message;
use shared::{AgencyId, MAX_RESPONSE_BYTES, MESSAGE_DELIMITER};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::errors::{ClientError, Result};

/// A connected session. Sends and receives strictly alternate.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: &Message) -> Result<()>;

    /// Wait for the next complete line and decode it
    async fn receive(&mut self) -> Result<Message>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self);
}

/// Opens identified sessions to the aggregator
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Transport;

    async fn connect(&self) -> Result<Self::Session>;
}

pub struct TcpConnector {
    address: String,
    agency: AgencyId,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, agency: AgencyId) -> Self {
        Self {
            address: address.into(),
            agency,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Session = TcpSession;

    async fn connect(&self) -> Result<TcpSession> {
        let stream = TcpStream::connect(&self.address).await?;
        let mut session = TcpSession::new(stream);

        // The aggregator ties everything on this connection to the agency id
        if let Err(e) = session.send(&Message::identification(self.agency)).await {
            session.close().await;
            return Err(e);
        }

        debug!(address = %self.address, agency = %self.agency, "Connected to aggregator");
        Ok(session)
    }
}

pub struct TcpSession {
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Some(BufReader::new(reader)),
            writer: Some(writer),
        }
    }
}

#[async_trait]
impl Transport for TcpSession {
    async fn send(&mut self, message: &Message) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let mut frame = message.encode();
        frame.push(MESSAGE_DELIMITER);
        let bytes = frame.as_bytes();

        // A single write may be partial
        let mut written = 0;
        while written < bytes.len() {
            let n = writer.write(&bytes[written..]).await?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            written += n;
        }
        writer.flush().await?;

        trace!(header = %message.header, bytes = bytes.len(), "Message sent");
        Ok(())
    }

    async fn receive(&mut self) -> Result<Message> {
        let reader = self.reader.as_mut().ok_or(ClientError::ConnectionClosed)?;

        let mut line = String::new();
        let n = (&mut *reader)
            .take(MAX_RESPONSE_BYTES as u64)
            .read_line(&mut line)
            .await?;

        if !line.ends_with(MESSAGE_DELIMITER) {
            if n == MAX_RESPONSE_BYTES {
                return Err(ClientError::MessageTooLong {
                    limit: MAX_RESPONSE_BYTES,
                });
            }
            // EOF, or EOF in the middle of a line
            return Err(ClientError::ConnectionClosed);
        }

        let raw = line.trim_end_matches(MESSAGE_DELIMITER).trim_end_matches('\r');
        let message = Message::decode(raw)?;

        trace!(header = %message.header, "Message received");
        Ok(message)
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
    }
}
