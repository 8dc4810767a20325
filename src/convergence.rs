//! Bounded-time convergence polling.
//!
//! This module decides when an eventually consistent system has reached a
//! stable state worth asserting against: an attempt function is invoked
//! repeatedly until it reports success a configured number of consecutive
//! times, or a wall-clock budget runs out. All I/O and comparison live in
//! the caller's attempt function; this loop is pure control logic.

use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;
use tokio::time::{self, Instant};

/// Timing parameters for [`await_convergence`].
///
/// The defaults mirror the values used for ingress conformance checks:
/// three consecutive stable observations within a thirty second budget,
/// with a one second pause after each unstable observation.
///
/// # Invariants
/// - `threshold` must be at least 1
/// - `delay` must be at least 1 millisecond
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvergenceConfig {
    /// Number of consecutive successful attempts required to converge.
    pub threshold: u32,
    /// Overall wall-clock budget for the whole loop.
    pub max_time_to_consistency: Duration,
    /// Pause after a failed attempt. Successful attempts are polled
    /// back to back with no pause.
    pub delay: Duration,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            max_time_to_consistency: Duration::from_secs(30),
            delay: Duration::from_secs(1),
        }
    }
}

impl ConvergenceConfig {
    /// Clamp the configuration to sane bounds.
    ///
    /// A zero `threshold` would declare convergence without a single
    /// observation, and a zero `delay` would busy-spin against a failing
    /// backend, so both are raised to their minimum useful values.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.threshold = self.threshold.max(1);
        self.delay = self.delay.max(Duration::from_millis(1));
        self
    }
}

/// Error returned when convergence was not observed within budget.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error(
    "timed out waiting for convergence after {attempts} attempts with \
     {successes}/{threshold} consecutive successes"
)]
pub struct ConvergenceTimeout {
    /// Total attempts performed before the budget ran out.
    pub attempts: u32,
    /// Consecutive successes at the moment the budget ran out.
    pub successes: u32,
    /// Consecutive successes that would have been required.
    pub threshold: u32,
}

/// Run `attempt` until it succeeds `config.threshold` times in a row.
///
/// The attempt function receives the time elapsed since the loop started
/// and reports whether this observation was stable. One failure resets the
/// consecutive-success counter to zero and is followed by a fixed pause;
/// the pause races the overall deadline, which is also checked before each
/// new attempt. An attempt already in flight is allowed to finish even if
/// the deadline passes meanwhile; the timeout is observed on the next
/// loop iteration.
///
/// # Errors
///
/// Returns a [`ConvergenceTimeout`] carrying the attempt counters if the
/// overall budget is exhausted before `threshold` consecutive successes
/// are observed.
pub async fn await_convergence<F>(
    config: ConvergenceConfig,
    mut attempt: F,
) -> Result<(), ConvergenceTimeout>
where
    F: AsyncFnMut(Duration) -> bool,
{
    let config = config.normalized();
    let start = Instant::now();
    let deadline = start + config.max_time_to_consistency;
    let mut attempts = 0u32;
    let mut successes = 0u32;

    loop {
        if Instant::now() >= deadline {
            return Err(ConvergenceTimeout {
                attempts,
                successes,
                threshold: config.threshold,
            });
        }

        let stable = attempt(start.elapsed()).await;
        attempts += 1;
        if stable {
            successes += 1;
            trace!(
                "attempt {attempts} stable ({successes}/{threshold} consecutive)",
                threshold = config.threshold
            );
            if successes >= config.threshold {
                debug!("converged after {attempts} attempts");
                return Ok(());
            }
            // Successes are polled back to back.
            continue;
        }

        trace!("attempt {attempts} unstable, counter reset");
        successes = 0;
        // The inter-attempt pause races the overall deadline.
        if time::timeout_at(deadline, time::sleep(config.delay))
            .await
            .is_err()
        {
            return Err(ConvergenceTimeout {
                attempts,
                successes,
                threshold: config.threshold,
            });
        }
    }
}
