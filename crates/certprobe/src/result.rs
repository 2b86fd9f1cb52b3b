//! Result and error types for Certprobe.

use crate::report::FieldMismatch;
use thiserror::Error;

/// Result type for Certprobe operations
pub type CertProbeResult<T> = Result<T, CertProbeError>;

/// Errors that can occur while driving browser chrome
#[derive(Debug, Error)]
pub enum CertProbeError {
    /// One or more displayed values did not match the certificate
    #[error("{} check(s) failed for {url}: {}", .failures.len(), describe(.failures))]
    AssertionFailed {
        /// URL the checks ran against
        url: String,
        /// Every mismatch recorded for that URL
        failures: Vec<FieldMismatch>,
    },

    /// An awaited UI transition never completed
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Description of the awaited condition
        waited_for: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation succeeded where it was required to fail
    #[error("Navigation to {url} succeeded but was expected to fail")]
    ExpectedNavigationFailure {
        /// URL that loaded
        url: String,
    },

    /// Navigation error reported by the remote browser
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element lookup found nothing
    #[error("No element found for {selector}")]
    ElementNotFound {
        /// Selector that was looked up
        selector: String,
    },

    /// Script execution error
    #[error("Script execution failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Remote driver error
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Suite configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CertProbeError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an element-not-found error
    #[must_use]
    pub fn element_not_found(selector: impl std::fmt::Display) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    /// Whether this error is a failed element lookup
    #[must_use]
    pub const fn is_element_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }

    /// Whether this error aborts the running check outright
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::AssertionFailed { .. })
    }
}

/// Swallow a missing-element error from a cleanup step.
///
/// Only teardown code calls this; every other error is passed through.
pub fn tolerate_missing(result: CertProbeResult<()>, step: &str) -> CertProbeResult<()> {
    match result {
        Err(err) if err.is_element_not_found() => {
            tracing::debug!(step, %err, "cleanup skipped: element already gone");
            Ok(())
        }
        other => other,
    }
}

/// Runs every cleanup step of a teardown and keeps the first failure.
///
/// A failing step never skips the steps after it. Missing elements are
/// swallowed through [`tolerate_missing`].
#[derive(Debug, Default)]
pub struct Teardown {
    first_error: Option<CertProbeError>,
}

impl Teardown {
    /// Start an empty teardown
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one cleanup step
    pub fn step(&mut self, step: &str, result: CertProbeResult<()>) {
        if let Err(err) = tolerate_missing(result, step) {
            tracing::warn!(step, %err, "teardown step failed");
            if self.first_error.is_none() {
                self.first_error = Some(err);
            }
        }
    }

    /// First error recorded, if any
    pub fn finish(self) -> CertProbeResult<()> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn describe(failures: &[FieldMismatch]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::Expectation;

    #[test]
    fn test_assertion_failed_lists_fields() {
        let err = CertProbeError::AssertionFailed {
            url: "https://ssl-ev.mozqa.com/".to_string(),
            failures: vec![FieldMismatch::new(
                "https://ssl-ev.mozqa.com/",
                "identity popup class",
                Expectation::Equals,
                "verifiedIdentity",
                "verifiedDomain",
            )],
        };
        let message = err.to_string();
        assert!(message.starts_with("1 check(s) failed for https://ssl-ev.mozqa.com/"));
        assert!(message.contains("identity popup class"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_timeout_is_fatal() {
        let err = CertProbeError::Timeout {
            waited_for: "identity popup to open".to_string(),
            ms: 500,
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Timed out after 500ms waiting for identity popup to open"
        );
    }

    #[test]
    fn test_tolerate_missing_swallows_only_lookup_failures() {
        let missing = Err(CertProbeError::element_not_found("#identity-popup"));
        assert!(tolerate_missing(missing, "close popup").is_ok());

        let broken = Err(CertProbeError::driver("connection reset"));
        assert!(tolerate_missing(broken, "close popup").is_err());
    }

    #[test]
    fn test_teardown_keeps_first_error_and_runs_every_step() {
        let mut teardown = Teardown::new();
        for (name, result) in [
            ("close windows", Err(CertProbeError::driver("no such window: main-0"))),
            ("close popup", Err(CertProbeError::element_not_found("#identity-popup"))),
            ("focus", Err(CertProbeError::driver("connection reset"))),
            ("reset pref", Ok(())),
        ] {
            teardown.step(name, result);
        }

        match teardown.finish() {
            Err(CertProbeError::Driver { message }) => assert_eq!(message, "no such window: main-0"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_teardown_tolerates_missing_elements() {
        let mut teardown = Teardown::new();
        teardown.step("close popup", Err(CertProbeError::element_not_found("#identity-popup")));
        teardown.step("reset pref", Ok(()));
        assert!(teardown.finish().is_ok());
    }
}
