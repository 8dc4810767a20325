//! Round-trip execution seam.
//!
//! A [`Scenario`](crate::scenario::Scenario) never talks to the network
//! itself; it delegates each exchange to a [`RoundTrip`] executor and only
//! consumes the captured snapshots. [`EchoRoundTripper`] is the stock
//! implementation for echo backends; tests and exotic deployments supply
//! their own.

use std::fmt;

use async_trait::async_trait;
use log::debug;
use reqwest::{Method, Version, header};
use thiserror::Error;

use crate::capture::{CapturedRequest, CapturedResponse, Headers};

/// Descriptors for one round trip against the system under test.
///
/// The connection is made to `target`; `hostname` travels in the `Host`
/// header and only drives virtual-host routing.
#[derive(Clone, Debug)]
pub struct RoundTripRequest {
    /// Request method, for example `GET`.
    pub method: String,
    /// URL scheme, `http` or `https`.
    pub scheme: String,
    /// Virtual host the request is addressed to.
    pub hostname: String,
    /// Request path.
    pub path: String,
    /// IP or FQDN the connection is actually made to.
    pub target: String,
}

/// Errors raised while executing a round trip.
#[derive(Debug, Error)]
pub enum RoundTripError {
    /// The request method is not a valid HTTP token.
    #[error("invalid request method {0:?}")]
    Method(String),
    /// The request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The echo payload describing the delivered request was malformed.
    #[error("echo payload decode error: {0}")]
    EchoBody(#[from] serde_json::Error),
    /// Failure reported by a custom executor.
    #[error("{0}")]
    Executor(String),
}

/// One full request/response exchange against the system under test.
#[async_trait]
pub trait RoundTrip: fmt::Debug + Send + Sync {
    /// Perform the exchange and return the captured snapshots.
    ///
    /// # Errors
    ///
    /// Returns a [`RoundTripError`] if the exchange could not be completed
    /// or its observable fields could not be captured.
    async fn round_trip(
        &self,
        request: &RoundTripRequest,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError>;
}

/// Executor for echo backends.
///
/// The echo backend answers with a JSON body describing the request it
/// received; that body becomes the [`CapturedRequest`], while status,
/// protocol version, and headers of the raw response become the
/// [`CapturedResponse`]. Conformance deployments use throwaway
/// certificates, so TLS verification is disabled. The underlying client
/// does not expose the peer certificate, so `certificate` is always
/// `None` here; executors built on a lower-level client can populate it.
#[derive(Debug)]
pub struct EchoRoundTripper {
    client: reqwest::Client,
}

impl EchoRoundTripper {
    /// Build an executor with its own HTTP client.
    ///
    /// Redirects are not followed: the suite asserts on what the routing
    /// layer itself returns, including redirect responses.
    ///
    /// # Errors
    ///
    /// Returns a [`RoundTripError::Transport`] if the client cannot be
    /// constructed.
    pub fn new() -> Result<Self, RoundTripError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RoundTrip for EchoRoundTripper {
    async fn round_trip(
        &self,
        request: &RoundTripRequest,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError> {
        let url = format!(
            "{scheme}://{target}{path}",
            scheme = request.scheme,
            target = request.target,
            path = request.path
        );
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| RoundTripError::Method(request.method.clone()))?;
        debug!(
            "sending {method} {url} for virtual host {hostname}",
            hostname = request.hostname
        );

        let response = self
            .client
            .request(method, &url)
            .header(header::HOST, request.hostname.as_str())
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let proto = proto_string(response.version());
        let headers = collect_headers(response.headers());
        let tls_hostname = if request.scheme == "https" {
            request.hostname.clone()
        } else {
            String::new()
        };

        let body = response.bytes().await?;
        let captured_request: CapturedRequest = serde_json::from_slice(&body)?;
        let captured_response = CapturedResponse {
            status_code,
            proto,
            tls_hostname,
            headers,
            certificate: None,
        };
        Ok((captured_request, captured_response))
    }
}

fn proto_string(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
    .to_owned()
}

fn collect_headers(map: &header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    // Values with opaque bytes are skipped.
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_owned())
                .or_default()
                .push(value.to_owned());
        }
    }
    headers
}
