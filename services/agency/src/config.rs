use anyhow::{ensure, Context};
use serde::Deserialize;
use shared::{AgencyId, POLL_INITIAL_DELAY_SECS, POLL_MAX_DELAY_SECS};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub agency_id: AgencyId,
    pub server_address: String,
    pub batch: BatchConfig,
    pub polling: PollingConfig,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Maximum bets per batch, also the depth of the bet queue
    pub max_amount: usize,
    pub data_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub initial_delay_seconds: u64,
    pub max_delay_seconds: u64,
}

impl PollingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_seconds)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_seconds: POLL_INITIAL_DELAY_SECS,
            max_delay_seconds: POLL_MAX_DELAY_SECS,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let agency_id = env::var("CLI_ID").context("CLI_ID must be set")?;

        let config = Config {
            agency_id: agency_id
                .parse()
                .with_context(|| format!("CLI_ID is not a valid agency id: {agency_id}"))?,
            server_address: env::var("CLI_SERVER_ADDRESS")
                .unwrap_or_else(|_| "server:12345".to_string()),
            batch: BatchConfig {
                max_amount: parse_var("CLI_BATCH_MAXAMOUNT", "100")?,
                data_path: env::var("CLI_DATA_PATH")
                    .unwrap_or_else(|_| "./agency.csv".to_string()),
            },
            polling: PollingConfig {
                initial_delay_seconds: parse_var(
                    "CLI_POLL_INITIAL_DELAY_SECS",
                    &POLL_INITIAL_DELAY_SECS.to_string(),
                )?,
                max_delay_seconds: parse_var(
                    "CLI_POLL_MAX_DELAY_SECS",
                    &POLL_MAX_DELAY_SECS.to_string(),
                )?,
            },
            metrics_port: match env::var("CLI_METRICS_PORT") {
                Ok(port) => Some(
                    port.parse()
                        .with_context(|| format!("CLI_METRICS_PORT is not a port: {port}"))?,
                ),
                Err(_) => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.batch.max_amount >= 1, "CLI_BATCH_MAXAMOUNT must be at least 1");
        ensure!(
            self.polling.initial_delay_seconds >= 1,
            "CLI_POLL_INITIAL_DELAY_SECS must be at least 1"
        );
        ensure!(
            self.polling.initial_delay_seconds <= self.polling.max_delay_seconds,
            "CLI_POLL_INITIAL_DELAY_SECS must not exceed CLI_POLL_MAX_DELAY_SECS"
        );
        Ok(())
    }
}

fn parse_var<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .with_context(|| format!("{key} has an invalid value: {value}"))
}
