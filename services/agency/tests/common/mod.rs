/// Common test utilities and fixtures for integration tests
use agency::config::{BatchConfig, PollingConfig};
use agency::Config;
use shared::protocol::{decode_bet_batch, Header, Message};
use shared::AgencyId;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the fake aggregator answers
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Polls answered `not_ready` before the winners are released
    pub not_ready_polls: usize,
    pub winners: Vec<String>,
    /// Held before acknowledging each batch
    pub ack_delay: Duration,
}

/// Everything the fake aggregator received
#[derive(Debug, Default)]
pub struct Received {
    pub identifications: Vec<String>,
    pub batches: Vec<String>,
    pub finished: bool,
    pub polls: usize,
    pub connections: usize,
}

/// In-process aggregator speaking the line protocol on a loopback port
pub struct TestAggregator {
    pub address: String,
    received: Arc<Mutex<Received>>,
    handle: JoinHandle<()>,
}

impl TestAggregator {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test aggregator");
        let address = listener.local_addr().unwrap().to_string();
        let received = Arc::new(Mutex::new(Received::default()));

        let state = received.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                state.lock().unwrap().connections += 1;
                tokio::spawn(serve(stream, behavior.clone(), state.clone()));
            }
        });

        Self {
            address,
            received,
            handle,
        }
    }

    pub fn received<T>(&self, f: impl FnOnce(&Received) -> T) -> T {
        f(&self.received.lock().unwrap())
    }

    /// Every bet received, in arrival order, still encoded
    pub fn bets(&self) -> Vec<String> {
        self.received(|r| {
            r.batches
                .iter()
                .flat_map(|payload| decode_bet_batch(payload))
                .map(str::to_string)
                .collect()
        })
    }

    /// Wait until at least `count` batches arrived
    pub async fn wait_for_batches(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.received(|r| r.batches.len()) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for batches");
    }
}

impl Drop for TestAggregator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, state: Arc<Mutex<Received>>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let message = Message::decode(&line).expect("Client sent an undecodable message");

        let response = match message.header {
            Header::Identification => {
                state.lock().unwrap().identifications.push(message.payload);
                None
            }
            Header::BetBatch => {
                tokio::time::sleep(behavior.ack_delay).await;
                state.lock().unwrap().batches.push(message.payload);
                Some(Message::success())
            }
            Header::Finish => {
                state.lock().unwrap().finished = true;
                None
            }
            Header::RequestResults => {
                let mut state = state.lock().unwrap();
                state.polls += 1;
                if state.polls > behavior.not_ready_polls {
                    Some(Message::winners(&behavior.winners))
                } else {
                    Some(Message::not_ready())
                }
            }
            header => panic!("Client sent a server-only header: {header}"),
        };

        if let Some(response) = response {
            let frame = format!("{}\n", response.encode());
            if writer.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}

/// Write `lines` to a temporary bets file
pub fn bets_file(lines: &[String]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create bets file");
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

/// A well formed CSV line for bet number `n`
pub fn csv_line(n: u64) -> String {
    format!("Name{n},Surname{n},{},1990-01-{:02},{}", 20_000_000 + n, n % 28 + 1, 1000 + n)
}

pub fn test_config(address: &str, data: &tempfile::NamedTempFile, max_amount: usize) -> Config {
    Config {
        agency_id: AgencyId::new(3),
        server_address: address.to_string(),
        batch: BatchConfig {
            max_amount,
            data_path: data.path().display().to_string(),
        },
        polling: PollingConfig::default(),
        metrics_port: None,
    }
}
