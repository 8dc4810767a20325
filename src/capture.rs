//! Captured round-trip data model.
//!
//! Structured snapshots of one HTTP exchange's observable fields, produced
//! by a [`RoundTrip`](crate::executor::RoundTrip) executor and stored on a
//! [`Scenario`](crate::scenario::Scenario). Both snapshot types are
//! replaced wholesale on each round trip and never mutated in place.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Header name to ordered value sequence.
///
/// Key lookup is case sensitive and preserves whatever casing the executor
/// provided; header assertions depend on this shape exactly.
pub type Headers = HashMap<String, Vec<String>>;

/// The request as observed by the backend that served it.
///
/// An echo backend reports these fields back in its response body, which
/// is how the suite learns what the routing layer actually delivered.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CapturedRequest {
    /// Host the backend saw, after any rewriting by the routing layer.
    pub host: String,
    /// Path the backend saw.
    pub path: String,
    /// Request method.
    pub method: String,
    /// Protocol version string, for example `HTTP/1.1`.
    pub proto: String,
    /// Identifier of the backend instance that served the request.
    pub service: String,
    /// Request headers as delivered to the backend.
    pub headers: Headers,
}

/// The response as observed by the test client.
#[derive(Clone, Debug, Default)]
pub struct CapturedResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Protocol version string, for example `HTTP/1.1`.
    pub proto: String,
    /// Server name the TLS session was negotiated for; empty for plain
    /// HTTP responses.
    pub tls_hostname: String,
    /// Response headers.
    pub headers: Headers,
    /// Peer certificate, present only for TLS responses captured by an
    /// executor that exposes it.
    pub certificate: Option<Certificate>,
}

/// Identity presented by a TLS peer, reduced to the DNS names the
/// certificate is valid for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Certificate {
    dns_names: Vec<String>,
}

impl Certificate {
    /// Build a certificate identity from its DNS subject alternative names.
    #[must_use]
    pub fn new<I, S>(dns_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dns_names: dns_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Verify that `hostname` is covered by one of the certificate's DNS
    /// names.
    ///
    /// Matching is ASCII case insensitive. A wildcard name covers exactly
    /// one leftmost label: `*.example.com` matches `a.example.com` but
    /// neither `example.com` nor `a.b.example.com`.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::HostnameMismatch`] when no name covers
    /// the hostname.
    pub fn verify_hostname(&self, hostname: &str) -> Result<(), CertificateError> {
        if self
            .dns_names
            .iter()
            .any(|name| dns_name_matches(name, hostname))
        {
            Ok(())
        } else {
            Err(CertificateError::HostnameMismatch {
                hostname: hostname.to_owned(),
                dns_names: self.dns_names.clone(),
            })
        }
    }
}

/// Errors raised while verifying a peer certificate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CertificateError {
    /// The certificate covers none of the names the caller expected.
    #[error("certificate is valid for {dns_names:?}, not {hostname}")]
    HostnameMismatch {
        /// Hostname that verification was requested for.
        hostname: String,
        /// DNS names the certificate actually covers.
        dns_names: Vec<String>,
    },
}

fn dns_name_matches(pattern: &str, hostname: &str) -> bool {
    // Trailing dots denote fully qualified names and carry no identity.
    let pattern = pattern.strip_suffix('.').unwrap_or(pattern);
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);

    if let Some(suffix) = pattern.strip_prefix("*.") {
        match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
            None => false,
        }
    } else {
        pattern.eq_ignore_ascii_case(hostname)
    }
}
