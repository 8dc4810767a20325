//! Scenario state: round-trip capture with convergence detection.
//!
//! A [`Scenario`] owns the latest captured request/response pair for one
//! test flow. [`Scenario::capture_round_trip`] drives the convergence
//! poller: every attempt performs one exchange through the executor,
//! compares the fresh response against the previously stored one, and
//! stores the fresh pair regardless of the verdict so the next attempt
//! compares against the most recent observation. Assertion helpers over
//! the stored capture live in [`assertions`](self).
//!
//! A scenario serves a single logical test flow at a time; it is not
//! meant for concurrent capture calls.

mod assertions;

use std::sync::Arc;

use log::warn;
use thiserror::Error;

pub use self::assertions::{AssertionError, HeaderScope};
use crate::{
    capture::{CapturedRequest, CapturedResponse},
    convergence::{self, ConvergenceConfig, ConvergenceTimeout},
    executor::{RoundTrip, RoundTripError, RoundTripRequest},
};

/// Errors raised by [`Scenario::capture_round_trip`].
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The observed responses failed to stabilize within budget.
    ///
    /// The timeout always takes precedence in the message, even when every
    /// attempt failed on transport; the last executor error, if any, is
    /// attached as the source for diagnosis.
    #[error("{timeout}")]
    Timeout {
        /// Counters from the convergence loop.
        timeout: ConvergenceTimeout,
        /// Last executor failure seen before the budget ran out.
        #[source]
        last_error: Option<RoundTripError>,
    },
}

/// State for one conformance test scenario.
#[derive(Debug)]
pub struct Scenario {
    /// Namespace the ingress under test lives in.
    pub namespace: String,
    /// Name of the ingress under test.
    pub ingress_name: String,
    /// Name of the TLS secret backing the ingress, when any.
    pub secret_name: String,
    /// Connection target for round trips; the request hostname only
    /// drives virtual-host routing.
    pub ip_or_fqdn: String,
    /// Request snapshot from the most recent successful round trip.
    pub captured_request: Option<CapturedRequest>,
    /// Response snapshot from the most recent successful round trip.
    pub captured_response: Option<CapturedResponse>,
    executor: Arc<dyn RoundTrip>,
    convergence: ConvergenceConfig,
}

impl Scenario {
    /// Create an empty scenario driving the given executor.
    ///
    /// Identity fields start empty and are filled in by the caller before
    /// the first capture; both captures start as `None`.
    #[must_use]
    pub fn new(executor: Arc<dyn RoundTrip>) -> Self {
        Self {
            namespace: String::new(),
            ingress_name: String::new(),
            secret_name: String::new(),
            ip_or_fqdn: String::new(),
            captured_request: None,
            captured_response: None,
            executor,
            convergence: ConvergenceConfig::default(),
        }
    }

    /// Override the convergence timing, primarily so tests can shrink the
    /// budget or run under a paused clock.
    #[must_use]
    pub fn with_convergence(mut self, config: ConvergenceConfig) -> Self {
        self.convergence = config;
        self
    }

    /// Perform round trips until the observed response stabilizes, then
    /// keep the final request/response pair as the scenario's capture.
    ///
    /// Every attempt that completes an exchange replaces the stored pair,
    /// stable or not, so a later attempt always compares against the most
    /// recent observation. Executor errors fail the attempt without
    /// surfacing immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Timeout`] if the configured number of
    /// consecutive stable responses was not observed within the budget.
    pub async fn capture_round_trip(
        &mut self,
        method: &str,
        scheme: &str,
        hostname: &str,
        path: &str,
    ) -> Result<(), CaptureError> {
        let request = RoundTripRequest {
            method: method.to_owned(),
            scheme: scheme.to_owned(),
            hostname: hostname.to_owned(),
            path: path.to_owned(),
            target: self.ip_or_fqdn.clone(),
        };
        let executor = Arc::clone(&self.executor);
        let mut last_error = None;

        let outcome = convergence::await_convergence(self.convergence, async |elapsed| {
            match executor.round_trip(&request).await {
                Err(error) => {
                    warn!("round trip failed after {elapsed:?}: {error}");
                    last_error = Some(error);
                    false
                }
                Ok((captured_request, captured_response)) => {
                    let stable =
                        responses_stable(self.captured_response.as_ref(), Some(&captured_response));
                    self.captured_request = Some(captured_request);
                    self.captured_response = Some(captured_response);
                    stable
                }
            }
        })
        .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(timeout) => Err(CaptureError::Timeout {
                timeout,
                last_error,
            }),
        }
    }
}

/// Two consecutive responses represent the same stable state when both
/// exist and their status codes match. Nothing else is compared: status is
/// treated as the cheap, sufficient signal that a routing change has
/// finished propagating. A fresh scenario has no previous response, so its
/// first attempt is always unstable.
fn responses_stable(prev: Option<&CapturedResponse>, curr: Option<&CapturedResponse>) -> bool {
    match (prev, curr) {
        (Some(prev), Some(curr)) => prev.status_code == curr.status_code,
        _ => false,
    }
}
