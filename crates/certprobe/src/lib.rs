//! Certprobe: Browser-Chrome Verification of Certificate Identity
//!
//! Drives a browser through a remote-control protocol and checks that the
//! chrome tells the user the truth about a site's certificate:
//!
//! - **Certificate status**: the identity box, identity popup and page info
//!   security panel reflect the validation class, organization, location
//!   and issuer of the served certificate.
//! - **Session restore**: the same indicators come back for every tab after
//!   a restart that restores the previous session.
//! - **Unknown issuer**: loading a site signed by an unknown issuer fails
//!   and shows the certificate error page.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SuiteConfig (YAML) ──► SecuritySuite ──► SuiteReport           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CertificateStatusChecker   SessionRestoreCheck                 │
//! │  UnknownIssuerCheck                                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Browser: page objects (identity popup, page info, tab bar,     │
//! │           location bar, cert error page) + Wait                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RemoteDriver (async trait)  ◄── MockBrowser                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use certprobe::{MockBrowser, SecuritySuite, SuiteConfig};
//!
//! let suite = SecuritySuite::new(SuiteConfig::default());
//! let mut browser = suite.attach(MockBrowser::mozqa()).await?;
//! let report = suite.run(&mut browser).await;
//! assert!(report.all_passed());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod browser;
mod certificate;
mod checker;
mod driver;
mod interstitial;
mod report;
mod result;
mod session_restore;
mod suite;
mod wait;

/// Page objects for browser chrome
pub mod chrome;

/// Localized string templates and substitution
pub mod l10n;

/// Tracing subscriber setup
pub mod logging;

/// Scripted in-memory browser for tests
#[cfg(feature = "mock")]
pub mod mock;

pub use browser::{Browser, RESTORE_PREVIOUS_SESSION, STARTUP_PAGE_PREF};
pub use certificate::{
    domain_from_common_name, matches_common_name, AddressInfo, Certificate, IdentityClass,
    ValidationLevel,
};
pub use checker::{CertificateStatusChecker, CheckDepth};
pub use chrome::{ChromeSelectors, ChromeSurface, IdentityPopupState};
pub use driver::{By, Context, ElementHandle, PrefValue, RemoteDriver, WindowHandle};
pub use interstitial::UnknownIssuerCheck;
pub use logging::LogFormat;
#[cfg(feature = "mock")]
pub use mock::{MockBrowser, MockFaults, MockSite};
pub use report::{CheckOutcome, Expectation, FieldMismatch, SuiteReport, VerificationReport};
pub use result::{tolerate_missing, CertProbeError, CertProbeResult, Teardown};
pub use session_restore::{SessionRestoreCheck, SessionRestoreReport};
pub use suite::{
    SecuritySuite, SuiteConfig, TestCase, UnknownIssuerCase, CERTIFICATE_STATUS_CHECK,
    SESSION_RESTORE_CHECK, UNKNOWN_ISSUER_CHECK,
};
pub use wait::{
    Wait, WaitOptions, WaitResult, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    #[cfg(feature = "mock")]
    pub use super::{MockBrowser, MockFaults, MockSite};
    pub use super::{
        Browser, CertProbeError, CertProbeResult, CertificateStatusChecker, CheckDepth,
        IdentityClass, RemoteDriver, SecuritySuite, SuiteConfig, TestCase, UnknownIssuerCase,
        VerificationReport, WaitOptions,
    };
}
