//! Participant barrier before aggregation

use crate::error::{FedError, Result};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wait until every intended ciphertext file exists.
///
/// Polls every `poll` until `timeout` elapses; on expiry fails with
/// `IncompleteParticipantSet` naming how many files arrived.
pub fn await_participants(paths: &[PathBuf], timeout: Duration, poll: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        let received = paths.iter().filter(|p| p.is_file()).count();
        if received == paths.len() {
            info!(participants = received, "all participants present");
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(FedError::IncompleteParticipantSet {
                expected: paths.len(),
                received,
            });
        }
        debug!(received, expected = paths.len(), "waiting for participants");
        let remaining = timeout.saturating_sub(start.elapsed());
        thread::sleep(poll.min(remaining).max(Duration::from_millis(1)));
    }
}
