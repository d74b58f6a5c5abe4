//! Agency client
//!
//! Sends every bet in the data file to the aggregator in acknowledged
//! batches, announces the end of the bets and then polls for the winners,
//! backing off while the aggregator is still waiting on other agencies.

use shared::protocol::{decode_winners, Header, Message};
use std::future::Future;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::BatchBuilder;
use crate::config::Config;
use crate::errors::{ClientError, Phase, Result, RunError};
use crate::queue::bet_queue;
use crate::retry_strategy::{Backoff, BackoffStep};
use crate::source::read_bets;
use crate::transport::{Connector, Transport};

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_sent: usize,
    pub bets_sent: usize,
    pub winners: Vec<String>,
}

/// Where the run is. `Failed` is an `Err` out of the loop.
#[derive(Debug)]
enum State {
    Sending,
    AwaitingFinishAck,
    Polling { backoff: Backoff },
    Done { winners: Vec<String> },
}

enum PollOutcome {
    Winners(Vec<String>),
    NotReady,
}

pub struct Client<C: Connector> {
    config: Config,
    connector: C,
    shutdown: CancellationToken,
}

impl<C: Connector> Client<C> {
    pub fn new(config: Config, connector: C, shutdown: CancellationToken) -> Self {
        Self {
            config,
            connector,
            shutdown,
        }
    }

    /// Run the whole exchange.
    ///
    /// The bets file is read on its own task; this task builds and sends
    /// batches. Both are torn down before returning, on every path.
    pub async fn run(&self) -> std::result::Result<RunSummary, RunError> {
        let max_amount = self.config.batch.max_amount;
        let (producer, consumer) = bet_queue(max_amount);

        let reader_shutdown = self.shutdown.child_token();
        let reader = tokio::spawn(read_bets(
            PathBuf::from(&self.config.batch.data_path),
            self.config.agency_id,
            producer,
            reader_shutdown.clone(),
        ));

        let mut batches = BatchBuilder::new(consumer, max_amount);
        let mut summary = RunSummary::default();
        let result = self.connect_and_exchange(&mut batches, &mut summary).await;

        // The reader sees the cancellation before its next push
        reader_shutdown.cancel();
        batches.close();
        drop(batches);

        match reader.await {
            Ok(read) => debug!(
                queued = read.queued,
                rejected = read.rejected,
                stopped = read.stopped,
                "Bet reader joined"
            ),
            Err(e) => warn!(error = %e, "Bet reader task failed"),
        }

        result.map(|winners| RunSummary { winners, ..summary })
    }

    async fn connect_and_exchange(
        &self,
        batches: &mut BatchBuilder,
        summary: &mut RunSummary,
    ) -> std::result::Result<Vec<String>, RunError> {
        let mut session = self
            .until_stopped(self.connector.connect())
            .await
            .and_then(|connected| connected)
            .map_err(|e| fail(Phase::Connecting, summary, e))?;

        info!(
            agency = %self.config.agency_id,
            server = %self.config.server_address,
            "Connected to aggregator"
        );

        let result = self.exchange(&mut session, batches, summary).await;
        session.close().await;
        result
    }

    async fn exchange(
        &self,
        session: &mut C::Session,
        batches: &mut BatchBuilder,
        summary: &mut RunSummary,
    ) -> std::result::Result<Vec<String>, RunError> {
        let mut state = State::Sending;

        loop {
            state = match state {
                State::Sending => {
                    let sent = self
                        .send_next_batch(session, batches, summary)
                        .await
                        .map_err(|e| fail(Phase::Sending, summary, e))?;

                    if sent {
                        State::Sending
                    } else {
                        info!(
                            batches_sent = summary.batches_sent,
                            bets_sent = summary.bets_sent,
                            "All bets sent"
                        );
                        State::AwaitingFinishAck
                    }
                }
                State::AwaitingFinishAck => {
                    self.until_stopped(session.send(&Message::finish()))
                        .await
                        .and_then(|sent| sent)
                        .map_err(|e| fail(Phase::AwaitingFinishAck, summary, e))?;

                    debug!("Finish message sent");
                    State::Polling {
                        backoff: Backoff::from_config(&self.config.polling),
                    }
                }
                State::Polling { mut backoff } => {
                    let poll = self
                        .poll_results(session, &mut backoff)
                        .await
                        .map_err(|e| fail(Phase::Polling, summary, e))?;

                    match poll {
                        PollOutcome::Winners(winners) => State::Done { winners },
                        PollOutcome::NotReady => State::Polling { backoff },
                    }
                }
                State::Done { winners } => return Ok(winners),
            };
        }
    }

    /// Build and send one batch. `false` once there is nothing left to send.
    async fn send_next_batch(
        &self,
        session: &mut C::Session,
        batches: &mut BatchBuilder,
        summary: &mut RunSummary,
    ) -> Result<bool> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Stopped);
        }

        let batch = batches.next_batch().await;
        if batch.is_empty() {
            // The reader may have stopped early; do not report a complete upload
            if self.shutdown.is_cancelled() {
                return Err(ClientError::Stopped);
            }
            return Ok(false);
        }

        // The batch always goes out whole; only the wait for its ack is cancellable
        session.send(&batch.to_message()).await?;
        let response = self.until_stopped(session.receive()).await??;

        match response.header {
            Header::Success => {
                summary.batches_sent += 1;
                summary.bets_sent += batch.len();
                metrics::counter!("batches_sent_total").increment(1);
                metrics::counter!("bets_sent_total").increment(batch.len() as u64);
                debug!(
                    bet_count = batch.len(),
                    encoded_len = batch.encoded_len(),
                    "Batch acknowledged"
                );
                Ok(true)
            }
            Header::Failure => Err(ClientError::BatchRejected {
                reason: response.payload,
            }),
            header => Err(ClientError::UnexpectedResponse { header }),
        }
    }

    async fn poll_results(&self, session: &mut C::Session, backoff: &mut Backoff) -> Result<PollOutcome> {
        metrics::counter!("results_polls_total").increment(1);

        self.until_stopped(session.send(&Message::request_results()))
            .await??;
        let response = self.until_stopped(session.receive()).await??;

        match response.header {
            Header::Winners => Ok(PollOutcome::Winners(decode_winners(&response.payload))),
            Header::NotReady => {
                metrics::counter!("results_not_ready_total").increment(1);

                let delay = match backoff.next_step() {
                    BackoffStep::Wait(delay) => delay,
                    BackoffStep::Exhausted => {
                        return Err(ClientError::BackoffExhausted {
                            max_delay: backoff.max(),
                        })
                    }
                };

                info!(delay_secs = delay.as_secs(), "Results not ready, backing off");

                session.close().await;
                self.until_stopped(tokio::time::sleep(delay)).await?;
                *session = self.until_stopped(self.connector.connect()).await??;

                Ok(PollOutcome::NotReady)
            }
            header => Err(ClientError::UnexpectedResponse { header }),
        }
    }

    /// Race `future` against the shutdown signal
    async fn until_stopped<F: Future>(&self, future: F) -> Result<F::Output> {
        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Err(ClientError::Stopped),
            output = future => Ok(output),
        }
    }
}

fn fail(phase: Phase, summary: &RunSummary, source: ClientError) -> RunError {
    if matches!(source, ClientError::Stopped) {
        info!(%phase, batches_sent = summary.batches_sent, "Client stopped");
    } else {
        error!(
            %phase,
            batches_sent = summary.batches_sent,
            bets_sent = summary.bets_sent,
            error = %source,
            "Client run failed"
        );
    }

    RunError {
        phase,
        batches_sent: summary.batches_sent,
        source,
    }
}
