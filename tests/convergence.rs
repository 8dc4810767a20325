//! End-to-end convergence behaviour through the public API.
//!
//! These tests run under a paused tokio clock, so the thirty second
//! convergence budget elapses without real delay.

mod common;

use std::sync::Arc;

use common::CyclingBackend;
use steadystate::{CaptureError, ConvergenceConfig, RoundTrip, Scenario};
use tokio::time::{Duration, Instant};

#[tokio::test(start_paused = true)]
async fn steady_responses_converge() {
    let backend = CyclingBackend::new([200]);
    let mut scenario = Scenario::new(Arc::clone(&backend) as Arc<dyn RoundTrip>);
    scenario.ip_or_fqdn = "203.0.113.7".to_owned();

    scenario
        .capture_round_trip("GET", "http", "echo.conformance.test", "/foo")
        .await
        .expect("steady responses must converge");

    // A fresh scenario has nothing to compare against on the first
    // attempt, so three consecutive stable comparisons take four trips.
    assert_eq!(backend.calls(), 4);
    scenario.assert_status_code(200).expect("status captured");
    scenario
        .assert_request_path("/foo")
        .expect("path captured from the final trip");
}

#[tokio::test(start_paused = true)]
async fn alternating_responses_time_out_after_thirty_seconds() {
    let backend = CyclingBackend::new([200, 404]);
    let mut scenario = Scenario::new(Arc::clone(&backend) as Arc<dyn RoundTrip>);
    let start = Instant::now();

    let err = scenario
        .capture_round_trip("GET", "http", "echo.conformance.test", "/")
        .await
        .expect_err("alternating statuses must never converge");

    assert!(start.elapsed() >= Duration::from_secs(30));
    let CaptureError::Timeout { timeout, .. } = err;
    assert_eq!(timeout.threshold, 3);
    let message = timeout.to_string();
    assert!(
        message.contains("timed out waiting for convergence"),
        "unexpected message: {message}"
    );
}

#[tokio::test(start_paused = true)]
async fn convergence_budget_is_injectable() {
    let backend = CyclingBackend::new([200, 404]);
    let mut scenario = Scenario::new(Arc::clone(&backend) as Arc<dyn RoundTrip>)
        .with_convergence(ConvergenceConfig {
            max_time_to_consistency: Duration::from_secs(5),
            ..ConvergenceConfig::default()
        });
    let start = Instant::now();

    scenario
        .capture_round_trip("GET", "http", "echo.conformance.test", "/")
        .await
        .expect_err("alternating statuses must never converge");

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(30), "shrunk budget must apply");
}

#[tokio::test(start_paused = true)]
async fn capture_replaces_previous_state_wholesale() {
    let backend = CyclingBackend::new([200]);
    let mut scenario = Scenario::new(Arc::clone(&backend) as Arc<dyn RoundTrip>);

    scenario
        .capture_round_trip("GET", "http", "first.conformance.test", "/first")
        .await
        .expect("first capture converges");
    scenario
        .capture_round_trip("POST", "http", "second.conformance.test", "/second")
        .await
        .expect("second capture converges");

    scenario.assert_method("POST").expect("method replaced");
    scenario
        .assert_request_host("second.conformance.test")
        .expect("host replaced");
    scenario
        .assert_request_path("/second")
        .expect("path replaced");
}
