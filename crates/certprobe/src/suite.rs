//! Suite configuration and runner.
//!
//! A [`SuiteConfig`] is the declarative fixture table: which sites to visit,
//! what the identity box should say for each, plus wait policy and chrome
//! locators. [`SecuritySuite`] runs the three checks against one browser and
//! records a [`CheckOutcome`] per check. A fatal error aborts only the check
//! it happened in.

use crate::browser::Browser;
use crate::certificate::IdentityClass;
use crate::checker::CertificateStatusChecker;
use crate::chrome::ChromeSelectors;
use crate::driver::RemoteDriver;
use crate::interstitial::UnknownIssuerCheck;
use crate::logging::{self, LogFormat};
use crate::report::{CheckOutcome, SuiteReport, VerificationReport};
use crate::result::{CertProbeError, CertProbeResult};
use crate::session_restore::SessionRestoreCheck;
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Name of the per-site certificate status check
pub const CERTIFICATE_STATUS_CHECK: &str = "certificate_status";

/// Name of the restart-persistence check
pub const SESSION_RESTORE_CHECK: &str = "ssl_status_after_restart";

/// Name of the unknown-issuer interstitial check
pub const UNKNOWN_ISSUER_CHECK: &str = "unknown_issuer";

// =============================================================================
// FIXTURES
// =============================================================================

/// One site to visit and the identity state it should produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Page to load
    pub url: String,
    /// Organization label in the identity box; empty unless EV
    #[serde(default)]
    pub expected_identity: String,
    /// Expected identity popup class
    pub expected_class: IdentityClass,
}

impl TestCase {
    /// Create a case from its URL, organization label and popup class
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        expected_identity: impl Into<String>,
        expected_class: IdentityClass,
    ) -> Self {
        Self {
            url: url.into(),
            expected_identity: expected_identity.into(),
            expected_class,
        }
    }

    /// Extended validation site labelled with `organization`
    #[must_use]
    pub fn extended(url: impl Into<String>, organization: impl Into<String>) -> Self {
        Self::new(url, organization, IdentityClass::VerifiedIdentity)
    }

    /// Domain or organization validated site: no label
    #[must_use]
    pub fn domain_validated(url: impl Into<String>) -> Self {
        Self::new(url, "", IdentityClass::VerifiedDomain)
    }
}

/// Site served with a certificate from an untrusted issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownIssuerCase {
    /// Page to load
    pub url: String,
    /// Hostname the error page's domain link should show
    pub expected_domain: String,
}

impl UnknownIssuerCase {
    /// Create an untrusted-issuer case
    #[must_use]
    pub fn new(url: impl Into<String>, expected_domain: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected_domain: expected_domain.into(),
        }
    }
}

impl Default for UnknownIssuerCase {
    fn default() -> Self {
        Self::new(
            "https://ssl-unknownissuer.mozqa.com",
            "ssl-selfsigned-unknownissuer.mozqa.com",
        )
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Suite configuration, loadable from YAML
///
/// ```yaml
/// cases:
///   - url: https://ssl-ev.mozqa.com/
///     expected_identity: Mozilla Corporation
///     expected_class: verifiedIdentity
/// wait:
///   timeout_ms: 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Sites for the status and restart checks, in tab order
    pub cases: Vec<TestCase>,
    /// Untrusted-issuer fixture
    pub unknown_issuer: UnknownIssuerCase,
    /// Polling policy for every UI transition
    pub wait: WaitOptions,
    /// Chrome locators
    pub selectors: ChromeSelectors,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            cases: vec![
                TestCase::domain_validated("https://ssl-dv.mozqa.com"),
                TestCase::extended("https://ssl-ev.mozqa.com/", "Mozilla Corporation"),
                TestCase::domain_validated("https://ssl-ov.mozqa.com/"),
            ],
            unknown_issuer: UnknownIssuerCase::default(),
            wait: WaitOptions::default(),
            selectors: ChromeSelectors::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl SuiteConfig {
    /// Parse and validate YAML. Omitted sections keep their defaults.
    pub fn from_yaml(yaml: &str) -> CertProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> CertProbeResult<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> CertProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Replace the fixture table
    #[must_use]
    pub fn with_cases(mut self, cases: Vec<TestCase>) -> Self {
        self.cases = cases;
        self
    }

    /// Replace the untrusted-issuer fixture
    #[must_use]
    pub fn with_unknown_issuer(mut self, case: UnknownIssuerCase) -> Self {
        self.unknown_issuer = case;
        self
    }

    /// Set wait policy
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set chrome locators
    #[must_use]
    pub fn with_selectors(mut self, selectors: ChromeSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> CertProbeResult<()> {
        if self.cases.is_empty() {
            return Err(CertProbeError::config("at least one test case is required"));
        }
        for case in &self.cases {
            require_https(&case.url)?;
            if !matches!(
                case.expected_class,
                IdentityClass::VerifiedIdentity | IdentityClass::VerifiedDomain
            ) {
                return Err(CertProbeError::config(format!(
                    "test case {} must expect {} or {}, not {}",
                    case.url,
                    IdentityClass::VerifiedIdentity,
                    IdentityClass::VerifiedDomain,
                    case.expected_class
                )));
            }
        }
        require_https(&self.unknown_issuer.url)?;
        if self.unknown_issuer.expected_domain.is_empty() {
            return Err(CertProbeError::config(
                "unknown issuer case needs an expected domain",
            ));
        }
        if self.wait.timeout_ms == 0 {
            return Err(CertProbeError::config("wait timeout cannot be zero"));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(CertProbeError::config("poll interval cannot be zero"));
        }
        Ok(())
    }
}

fn require_https(url: &str) -> CertProbeResult<()> {
    match url.strip_prefix("https://") {
        Some(rest) if !rest.is_empty() => Ok(()),
        _ => Err(CertProbeError::config(format!(
            "test case url must be https: {url:?}"
        ))),
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs every check in a [`SuiteConfig`] against one browser
#[derive(Debug, Clone)]
pub struct SecuritySuite {
    config: SuiteConfig,
}

impl SecuritySuite {
    /// Create a suite from its configuration
    #[must_use]
    pub const fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    /// Configuration in effect
    #[must_use]
    pub const fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Install the configured log format as the global subscriber.
    ///
    /// Returns `false` when a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        logging::init(self.config.log_format)
    }

    /// Attach to `driver` with this suite's locators and wait policy,
    /// installing the configured log format first
    pub async fn attach<D: RemoteDriver>(&self, driver: D) -> CertProbeResult<Browser<D>> {
        if !self.init_logging() {
            debug!(format = ?self.config.log_format, "subscriber already installed");
        }
        Browser::attach(driver, self.config.selectors.clone(), self.config.wait).await
    }

    /// Run the status, restart and interstitial checks in that order
    pub async fn run<D: RemoteDriver>(&self, browser: &mut Browser<D>) -> SuiteReport {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(3);

        let check = Instant::now();
        let result = self.certificate_status(browser).await;
        outcomes.push(outcome(CERTIFICATE_STATUS_CHECK, result, check));

        let check = Instant::now();
        let result = self.session_restore(browser).await;
        outcomes.push(outcome(SESSION_RESTORE_CHECK, result, check));

        let check = Instant::now();
        let result = self.unknown_issuer(browser).await;
        outcomes.push(outcome(UNKNOWN_ISSUER_CHECK, result, check));

        let report = SuiteReport {
            outcomes,
            duration: start.elapsed(),
        };
        info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            "suite finished"
        );
        report
    }

    /// Visit every case in the selected tab and walk the full chrome
    pub async fn certificate_status<D: RemoteDriver>(
        &self,
        browser: &mut Browser<D>,
    ) -> CertProbeResult<Vec<VerificationReport>> {
        let mut reports = Vec::with_capacity(self.config.cases.len());
        for case in &self.config.cases {
            browser.navigate_content(&case.url).await?;
            let report = CertificateStatusChecker::new(browser)
                .verify_case(case)
                .await?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Restart with session restore and compare every restored tab
    pub async fn session_restore<D: RemoteDriver>(
        &self,
        browser: &mut Browser<D>,
    ) -> CertProbeResult<Vec<VerificationReport>> {
        let report = SessionRestoreCheck::new(browser, &self.config.cases)
            .run()
            .await?;
        Ok(report.into_reports())
    }

    /// Load the untrusted-issuer site and inspect the error page
    pub async fn unknown_issuer<D: RemoteDriver>(
        &self,
        browser: &mut Browser<D>,
    ) -> CertProbeResult<Vec<VerificationReport>> {
        let report = UnknownIssuerCheck::new(browser, &self.config.unknown_issuer)
            .run()
            .await?;
        Ok(vec![report])
    }
}

fn outcome(
    name: &str,
    result: CertProbeResult<Vec<VerificationReport>>,
    started: Instant,
) -> CheckOutcome {
    let outcome = match result {
        Ok(reports) => CheckOutcome::completed(name, reports),
        Err(err) => {
            error!(check = name, %err, "check aborted");
            CheckOutcome::aborted(name, &err)
        }
    };
    outcome.with_duration(started.elapsed())
}
