//! Assertion helpers over the stored capture.
//!
//! Each helper checks one field of the scenario's captured request or
//! response against an expectation and returns a descriptive error on
//! mismatch. Assertions never retry; convergence has already happened by
//! the time they run. Asserting before any successful capture is a
//! caller bug and fails fast with [`AssertionError::MissingCapture`]
//! rather than panicking.

use std::fmt;

use thiserror::Error;

use super::Scenario;
use crate::capture::{CapturedRequest, CapturedResponse, CertificateError, Headers};

/// Whether a header assertion ran against the request or the response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderScope {
    /// Headers as delivered to the backend.
    Request,
    /// Headers of the response returned to the client.
    Response,
}

impl fmt::Display for HeaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// A failed assertion over the stored capture.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// Asserting before any successful capture.
    #[error("no captured request or response; perform a round trip before asserting")]
    MissingCapture,
    /// Status code mismatch.
    #[error("expected status code {expected} but {actual} was returned")]
    StatusCode { expected: u16, actual: u16 },
    /// The request was served by a different backend.
    #[error("expected the request to be served by {expected} but it was served by {actual}")]
    ServedBy { expected: String, actual: String },
    /// Host seen by the backend did not match.
    #[error("expected the request host to be {expected} but it was {actual}")]
    RequestHost { expected: String, actual: String },
    /// Negotiated TLS server name did not match.
    #[error("expected the response TLS hostname to be {expected} but it was {actual}")]
    TlsHostname { expected: String, actual: String },
    /// Response protocol version did not match.
    #[error("expected the response protocol to be {expected} but it was {actual}")]
    ResponseProto { expected: String, actual: String },
    /// Request protocol version did not match.
    #[error("expected the request protocol to be {expected} but it was {actual}")]
    RequestProto { expected: String, actual: String },
    /// Request method did not match.
    #[error("expected the request method to be {expected} but it was {actual}")]
    Method { expected: String, actual: String },
    /// Path seen by the backend did not match.
    #[error("expected the request path to be {expected} but it was {actual}")]
    RequestPath { expected: String, actual: String },
    /// A header key was absent.
    #[error("expected {scope} headers to contain {key} but they only contained {present:?}")]
    HeaderMissing {
        scope: HeaderScope,
        key: String,
        present: Vec<String>,
    },
    /// A header was present without the expected value.
    #[error("expected {scope} header {key} to contain a {expected} value but it contained {actual:?}")]
    HeaderValue {
        scope: HeaderScope,
        key: String,
        expected: String,
        actual: Vec<String>,
    },
    /// Certificate verification was requested for a capture without one.
    #[error("hostname verification requires a round trip against an https URL")]
    MissingCertificate,
    /// The captured certificate failed hostname verification.
    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

impl Scenario {
    fn request(&self) -> Result<&CapturedRequest, AssertionError> {
        self.captured_request
            .as_ref()
            .ok_or(AssertionError::MissingCapture)
    }

    fn response(&self) -> Result<&CapturedResponse, AssertionError> {
        self.captured_response
            .as_ref()
            .ok_or(AssertionError::MissingCapture)
    }

    /// Check the captured response status code.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_status_code(&self, expected: u16) -> Result<(), AssertionError> {
        let actual = self.response()?.status_code;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::StatusCode { expected, actual })
        }
    }

    /// Check which backend instance served the captured request.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_served_by(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.request()?.service;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::ServedBy {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the host the backend saw.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_request_host(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.request()?.host;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::RequestHost {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the server name the TLS session was negotiated for.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_tls_hostname(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.response()?.tls_hostname;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::TlsHostname {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the captured response protocol version.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_response_proto(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.response()?.proto;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::ResponseProto {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the protocol version the backend saw.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_request_proto(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.request()?.proto;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::RequestProto {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the request method the backend saw.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_method(&self, expected: &str) -> Result<(), AssertionError> {
        let actual = &self.request()?.method;
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::Method {
                expected: expected.to_owned(),
                actual: actual.clone(),
            })
        }
    }

    /// Check the path the backend saw. A missing leading `/` on the
    /// expectation is prepended before comparing, so `"foo"` and `"/foo"`
    /// assert the same path.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] on mismatch or when nothing has been
    /// captured yet.
    pub fn assert_request_path(&self, expected: &str) -> Result<(), AssertionError> {
        let expected = if expected.starts_with('/') {
            expected.to_owned()
        } else {
            format!("/{expected}")
        };
        let actual = &self.request()?.path;
        if *actual == expected {
            Ok(())
        } else {
            Err(AssertionError::RequestPath {
                expected,
                actual: actual.clone(),
            })
        }
    }

    /// Check that a response header is present and, unless `expected` is
    /// the wildcard `"*"`, that one of its values matches exactly.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] when the key is absent, no value
    /// matches, or nothing has been captured yet.
    pub fn assert_response_header(&self, key: &str, expected: &str) -> Result<(), AssertionError> {
        assert_header(HeaderScope::Response, &self.response()?.headers, key, expected)
    }

    /// Check that a request header reached the backend, with the same
    /// wildcard rule as [`Scenario::assert_response_header`].
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] when the key is absent, no value
    /// matches, or nothing has been captured yet.
    pub fn assert_request_header(&self, key: &str, expected: &str) -> Result<(), AssertionError> {
        assert_header(HeaderScope::Request, &self.request()?.headers, key, expected)
    }

    /// Verify the captured peer certificate against a hostname.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::MissingCertificate`] when no response or
    /// no certificate was captured, for example after a plain HTTP round
    /// trip; otherwise surfaces the verification result.
    pub fn assert_response_certificate(&self, hostname: &str) -> Result<(), AssertionError> {
        let certificate = self
            .captured_response
            .as_ref()
            .and_then(|response| response.certificate.as_ref())
            .ok_or(AssertionError::MissingCertificate)?;
        certificate.verify_hostname(hostname)?;
        Ok(())
    }
}

fn assert_header(
    scope: HeaderScope,
    headers: &Headers,
    key: &str,
    expected: &str,
) -> Result<(), AssertionError> {
    let values = headers
        .get(key)
        .filter(|values| !values.is_empty())
        .ok_or_else(|| AssertionError::HeaderMissing {
            scope,
            key: key.to_owned(),
            present: headers.keys().cloned().collect(),
        })?;

    // The literal "*" asserts presence alone.
    if expected == "*" || values.iter().any(|value| value == expected) {
        Ok(())
    } else {
        Err(AssertionError::HeaderValue {
            scope,
            key: key.to_owned(),
            expected: expected.to_owned(),
            actual: values.clone(),
        })
    }
}
