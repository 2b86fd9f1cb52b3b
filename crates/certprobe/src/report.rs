//! Verification Reports
//!
//! Collects every field mismatch observed for one site instead of stopping
//! at the first, so a single run shows the whole picture of what the chrome
//! got wrong. Fatal conditions (timeouts, driver failures) never land here;
//! they travel as `Err` values.

use crate::result::{CertProbeError, CertProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How an observed value was compared against the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    /// Values must be identical
    Equals,
    /// Values must differ
    NotEquals,
    /// Observed value must contain the expected substring
    Contains,
    /// Observed condition must hold
    Holds,
}

impl Expectation {
    const fn verb(self) -> &'static str {
        match self {
            Self::Equals => "expected",
            Self::NotEquals => "expected anything but",
            Self::Contains => "expected to contain",
            Self::Holds => "expected",
        }
    }
}

/// A single displayed value that did not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// URL the page was showing
    pub url: String,
    /// Which piece of chrome was read
    pub field: String,
    /// Comparison that failed
    pub expectation: Expectation,
    /// Expected value (or substring)
    pub expected: String,
    /// Value read from the browser
    pub actual: String,
}

impl FieldMismatch {
    /// Create a new mismatch record
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        field: impl Into<String>,
        expectation: Expectation,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            field: field.into(),
            expectation,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {} {:?}, got {:?}",
            self.field,
            self.url,
            self.expectation.verb(),
            self.expected,
            self.actual
        )
    }
}

/// Outcome of verifying one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// URL that was verified
    pub url: String,
    checks: usize,
    failures: Vec<FieldMismatch>,
}

impl VerificationReport {
    /// Create an empty report for a URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            checks: 0,
            failures: Vec::new(),
        }
    }

    /// Record an equality check
    pub fn expect_eq(&mut self, field: &str, actual: &str, expected: &str) {
        self.checks += 1;
        if actual != expected {
            self.record(field, Expectation::Equals, expected, actual);
        }
    }

    /// Record an inequality check
    pub fn expect_ne(&mut self, field: &str, actual: &str, unexpected: &str) {
        self.checks += 1;
        if actual == unexpected {
            self.record(field, Expectation::NotEquals, unexpected, actual);
        }
    }

    /// Record a substring containment check
    pub fn expect_contains(&mut self, field: &str, haystack: &str, needle: &str) {
        self.checks += 1;
        if !haystack.contains(needle) {
            self.record(field, Expectation::Contains, needle, haystack);
        }
    }

    /// Record a boolean condition
    pub fn expect_true(&mut self, field: &str, condition: bool) {
        self.checks += 1;
        if !condition {
            self.record(field, Expectation::Holds, "true", "false");
        }
    }

    /// Record a check whose outcome was computed by the caller
    pub fn expect(
        &mut self,
        field: &str,
        expectation: Expectation,
        expected: &str,
        actual: &str,
        holds: bool,
    ) {
        self.checks += 1;
        if !holds {
            self.record(field, expectation, expected, actual);
        }
    }

    fn record(&mut self, field: &str, expectation: Expectation, expected: &str, actual: &str) {
        let mismatch = FieldMismatch::new(&self.url, field, expectation, expected, actual);
        tracing::warn!(url = %self.url, field, %mismatch, "chrome check failed");
        self.failures.push(mismatch);
    }

    /// Number of checks performed
    #[must_use]
    pub const fn check_count(&self) -> usize {
        self.checks
    }

    /// Recorded mismatches, in the order they were observed
    #[must_use]
    pub fn failures(&self) -> &[FieldMismatch] {
        &self.failures
    }

    /// Whether every check passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert into `Ok(self)` when clean, `AssertionFailed` otherwise
    pub fn into_result(self) -> CertProbeResult<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(CertProbeError::AssertionFailed {
                url: self.url,
                failures: self.failures,
            })
        }
    }
}

/// Result of running one named check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Check name
    pub name: String,
    /// Per-site reports produced before the check ended
    pub reports: Vec<VerificationReport>,
    /// Fatal error that aborted the check, if any
    pub error: Option<String>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl CheckOutcome {
    /// Create a finished outcome from its reports
    #[must_use]
    pub fn completed(name: impl Into<String>, reports: Vec<VerificationReport>) -> Self {
        Self {
            name: name.into(),
            reports,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create an aborted outcome
    #[must_use]
    pub fn aborted(name: impl Into<String>, error: &CertProbeError) -> Self {
        Self {
            name: name.into(),
            reports: Vec::new(),
            error: Some(error.to_string()),
            duration: Duration::ZERO,
        }
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the check ran to completion without mismatches
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.reports.iter().all(VerificationReport::passed)
    }

    /// All mismatches across this check's reports
    pub fn failures(&self) -> impl Iterator<Item = &FieldMismatch> {
        self.reports.iter().flat_map(|r| r.failures.iter())
    }
}

/// Results from a full suite run
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    /// Outcomes in execution order
    pub outcomes: Vec<CheckOutcome>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteReport {
    /// Check if all checks passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }

    /// Number of passed checks
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of failed checks
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Look up an outcome by check name
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}
