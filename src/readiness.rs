use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::cluster::{ClusterStatus, MemberState};
use crate::error::Error;

/// Terminal outcome of an exhausted readiness budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no primary observed after {attempts_used} attempts")]
pub struct NotReadyError {
    pub attempts_used: u32,
}

/// One readiness check. Probe errors are recorded here rather than
/// surfaced; they count as "not ready yet".
#[derive(Debug, Clone)]
pub struct PollAttempt {
    pub attempt: u32,
    pub observed: Option<MemberState>,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Source of replica-set status snapshots. `ListingStore` implements this
/// over `replSetGetStatus`; tests substitute scripted fakes.
pub trait StatusProbe {
    fn cluster_status(&self) -> Result<ClusterStatus, Error>;
}

/// Bounded retry loop that gates the report on the connected node becoming
/// the write-capable primary. Fixed delay, no backoff.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    max_attempts: u32,
    interval: Duration,
}

impl ReadinessPoller {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        ReadinessPoller {
            max_attempts,
            interval,
        }
    }

    /// Probes until the self member reports PRIMARY or the budget runs out.
    /// Attempts are strictly sequential; there is no sleep after the final
    /// attempt, successful or not.
    pub fn poll(&self, probe: &impl StatusProbe) -> Result<(), NotReadyError> {
        for attempt in 1..=self.max_attempts {
            let record = self.check(attempt, probe);
            self.log(&record);

            if record.succeeded {
                return Ok(());
            }
            if attempt < self.max_attempts {
                thread::sleep(self.interval);
            }
        }

        Err(NotReadyError {
            attempts_used: self.max_attempts,
        })
    }

    fn check(&self, attempt: u32, probe: &impl StatusProbe) -> PollAttempt {
        match probe.cluster_status() {
            Ok(status) => {
                let observed = status.self_member().map(|m| m.state);
                PollAttempt {
                    attempt,
                    observed,
                    succeeded: observed == Some(MemberState::Primary),
                    error: None,
                }
            }
            // Probe failures are indistinguishable from "not primary yet":
            // the node may still be starting up or electing.
            Err(err) => PollAttempt {
                attempt,
                observed: None,
                succeeded: false,
                error: Some(err.to_string()),
            },
        }
    }

    fn log(&self, record: &PollAttempt) {
        match (&record.error, record.observed) {
            (Some(err), _) => warn!(
                "readiness attempt {}/{}: unknown ({err})",
                record.attempt, self.max_attempts
            ),
            (None, Some(state)) => info!(
                "readiness attempt {}/{}: {state}",
                record.attempt, self.max_attempts
            ),
            (None, None) => info!(
                "readiness attempt {}/{}: no self member in status",
                record.attempt, self.max_attempts
            ),
        }
    }
}
