//! Public API for the `steadystate` library.
//!
//! This crate provides the scenario-state core of an HTTP conformance test
//! suite: a bounded-time convergence poller, a [`Scenario`] holding the
//! latest captured request/response pair, and assertion helpers comparing
//! captured fields against expectations. It targets eventually consistent
//! backends, such as a routing layer being reconfigured, where a response
//! is only worth asserting against once repeated observations stop
//! changing.

pub mod capture;
pub mod convergence;
pub mod executor;
pub mod scenario;

pub use capture::{CapturedRequest, CapturedResponse, Certificate, CertificateError, Headers};
pub use convergence::{ConvergenceConfig, ConvergenceTimeout, await_convergence};
pub use executor::{EchoRoundTripper, RoundTrip, RoundTripError, RoundTripRequest};
pub use scenario::{AssertionError, CaptureError, HeaderScope, Scenario};
