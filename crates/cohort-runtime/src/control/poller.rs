use cohort_core::control::{ConvergenceTarget, ProbeResult};
use cohort_core::error::Result;

use super::probe::MembershipProbe;

/// Terminal state of a poll sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The target was observed on attempt `attempts`.
    Converged { attempts: u32, last: ProbeResult },
    /// The attempt budget ran out. `last` is the final observation.
    TimedOut { attempts: u32, last: ProbeResult },
}

impl PollOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn last(&self) -> ProbeResult {
        match self {
            Self::Converged { last, .. } | Self::TimedOut { last, .. } => *last,
        }
    }
}

#[derive(Debug)]
enum PollState {
    Polling { attempt: u32 },
    Done(PollOutcome),
}

/// Samples the cluster until it matches a [`ConvergenceTarget`] or the
/// attempt budget is spent.
pub struct ConvergencePoller {
    probe: MembershipProbe,
    target: ConvergenceTarget,
}

impl ConvergencePoller {
    pub fn new(probe: MembershipProbe, target: ConvergenceTarget) -> Self {
        Self { probe, target }
    }

    /// Poll to completion. A provider fault aborts immediately.
    pub async fn run(&self) -> Result<PollOutcome> {
        let mut state = PollState::Polling { attempt: 1 };

        loop {
            state = match state {
                PollState::Polling { attempt } => self.step(attempt).await?,
                PollState::Done(outcome) => {
                    self.log_outcome(&outcome);
                    return Ok(outcome);
                }
            };
        }
    }

    async fn step(&self, attempt: u32) -> Result<PollState> {
        let last = self.probe.probe(&self.target.required_service).await?;

        tracing::debug!(
            attempt,
            max_attempts = self.target.max_attempts,
            members = last.member_count,
            expected = self.target.expected_members,
            service_found = last.service_found,
            "Sampled cluster"
        );

        if self.target.is_met_by(&last) {
            return Ok(PollState::Done(PollOutcome::Converged {
                attempts: attempt,
                last,
            }));
        }

        if attempt >= self.target.max_attempts {
            return Ok(PollState::Done(PollOutcome::TimedOut {
                attempts: attempt,
                last,
            }));
        }

        tokio::time::sleep(self.target.poll_interval).await;
        Ok(PollState::Polling {
            attempt: attempt + 1,
        })
    }

    fn log_outcome(&self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Converged { attempts, last } => {
                tracing::info!(
                    "Cluster converged with {} members after {} attempts",
                    last.member_count,
                    attempts
                );
            }
            PollOutcome::TimedOut { attempts, last } => {
                tracing::warn!(
                    "Cluster did not converge after {} attempts: {} of {} members, service '{}' {}",
                    attempts,
                    last.member_count,
                    self.target.expected_members,
                    self.target.required_service,
                    if last.service_found { "found" } else { "not found" }
                );
            }
        }
    }
}
