//! Reads bets from the agency data file into the bet queue

use shared::{AgencyId, Bet};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue::{BetProducer, PushError};

/// What the reader did before it stopped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadSummary {
    pub queued: usize,
    pub rejected: usize,
    pub stopped: bool,
}

/// Parse `path` line by line and push every valid bet into the queue.
///
/// Malformed lines are logged and skipped. The queue is closed when this
/// returns, because `producer` is dropped here on every path.
pub async fn read_bets(
    path: PathBuf,
    agency: AgencyId,
    producer: BetProducer,
    shutdown: CancellationToken,
) -> ReadSummary {
    let mut summary = ReadSummary::default();

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not open bets file");
            return summary;
        }
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed reading bets file");
                break;
            }
        }

        // A line that is not UTF-8 is one bad record, not the end of the file
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches('\n'),
            Err(e) => {
                warn!(
                    line = %String::from_utf8_lossy(&buf).trim_end(),
                    error = %e,
                    "Skipping bet line that is not UTF-8"
                );
                metrics::counter!("bets_rejected_total", "reason" => "invalid_utf8").increment(1);
                summary.rejected += 1;
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let bet = match Bet::from_csv_line(line, agency) {
            Ok(bet) => bet,
            Err(e) => {
                warn!(line = %line, error = %e, "Skipping malformed bet line");
                metrics::counter!("bets_rejected_total", "reason" => e.reason()).increment(1);
                summary.rejected += 1;
                continue;
            }
        };

        match producer.push(bet, &shutdown).await {
            Ok(()) => {
                summary.queued += 1;
                metrics::counter!("bets_read_total").increment(1);
            }
            Err(PushError::Stopped) => {
                info!(queued = summary.queued, "Bet reader stopped by shutdown signal");
                summary.stopped = true;
                break;
            }
            Err(PushError::Closed) => {
                debug!(queued = summary.queued, "Bet queue closed by consumer");
                summary.stopped = true;
                break;
            }
        }
    }

    debug!(
        queued = summary.queued,
        rejected = summary.rejected,
        "Bet reader finished"
    );

    summary
}
