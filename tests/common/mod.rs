//! Shared utilities for integration tests.
//!
//! Provides a scriptable round-trip backend and builders for captured
//! snapshots so individual test modules stay focused on behaviour.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use steadystate::{
    CapturedRequest,
    CapturedResponse,
    Headers,
    RoundTrip,
    RoundTripError,
    RoundTripRequest,
    Scenario,
};

/// Backend whose responses cycle through a fixed status sequence.
#[derive(Debug)]
pub struct CyclingBackend {
    statuses: Vec<u16>,
    calls: AtomicUsize,
}

impl CyclingBackend {
    pub fn new(statuses: impl Into<Vec<u16>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: statuses.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoundTrip for CyclingBackend {
    async fn round_trip(
        &self,
        request: &RoundTripRequest,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self.statuses[call % self.statuses.len()];
        let captured_request = CapturedRequest {
            host: request.hostname.clone(),
            path: request.path.clone(),
            method: request.method.clone(),
            proto: "HTTP/1.1".to_owned(),
            service: "echo-backend".to_owned(),
            headers: Headers::new(),
        };
        let captured_response = CapturedResponse {
            status_code: status,
            proto: "HTTP/1.1".to_owned(),
            ..CapturedResponse::default()
        };
        Ok((captured_request, captured_response))
    }
}

/// A scenario that never performs a round trip; its executor panics if
/// reached. Useful for assertion tests that seed captures directly.
pub fn offline_scenario() -> Scenario {
    #[derive(Debug)]
    struct Unused;

    #[async_trait]
    impl RoundTrip for Unused {
        async fn round_trip(
            &self,
            _request: &RoundTripRequest,
        ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError> {
            unreachable!("assertion tests never execute round trips")
        }
    }

    Scenario::new(Arc::new(Unused))
}

/// Captured request with representative echo-backend fields.
pub fn sample_request() -> CapturedRequest {
    let mut headers = Headers::new();
    headers.insert("X-Forwarded-For".to_owned(), vec!["192.0.2.1".to_owned()]);
    headers.insert(
        "Accept".to_owned(),
        vec!["text/html".to_owned(), "application/json".to_owned()],
    );
    CapturedRequest {
        host: "echo.conformance.test".to_owned(),
        path: "/foo".to_owned(),
        method: "GET".to_owned(),
        proto: "HTTP/1.1".to_owned(),
        service: "echo-backend-v1".to_owned(),
        headers,
    }
}

/// Captured response with representative fields and no certificate.
pub fn sample_response() -> CapturedResponse {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_owned(), vec!["application/json".to_owned()]);
    headers.insert("X-Values".to_owned(), vec!["a".to_owned(), "b".to_owned()]);
    CapturedResponse {
        status_code: 200,
        proto: "HTTP/1.1".to_owned(),
        tls_hostname: "echo.conformance.test".to_owned(),
        headers,
        certificate: None,
    }
}

/// Scenario seeded with [`sample_request`] and [`sample_response`].
pub fn captured_scenario() -> Scenario {
    let mut scenario = offline_scenario();
    scenario.captured_request = Some(sample_request());
    scenario.captured_response = Some(sample_response());
    scenario
}
