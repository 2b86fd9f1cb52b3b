//! Untrusted-issuer interstitial.
//!
//! Navigating to a site whose certificate chains to an unknown issuer must
//! fail, and the content area must show the certificate error page with
//! the domain link, both action buttons and the issuer error code.

use crate::browser::Browser;
use crate::chrome::UNKNOWN_ISSUER_ERROR_CODE;
use crate::driver::{Context, RemoteDriver};
use crate::report::VerificationReport;
use crate::result::{CertProbeError, CertProbeResult};
use crate::suite::UnknownIssuerCase;
use tracing::{debug, info, warn};

/// Checks the certificate error page for an unknown issuer
#[derive(Debug)]
pub struct UnknownIssuerCheck<'a, D: RemoteDriver> {
    browser: &'a mut Browser<D>,
    case: &'a UnknownIssuerCase,
}

impl<'a, D: RemoteDriver> UnknownIssuerCheck<'a, D> {
    /// Check `case` in `browser`
    pub fn new(browser: &'a mut Browser<D>, case: &'a UnknownIssuerCase) -> Self {
        Self { browser, case }
    }

    /// Run the check. The chrome context is restored on every exit path.
    pub async fn run(self) -> CertProbeResult<VerificationReport> {
        let Self { browser, case } = self;
        info!(url = %case.url, "checking unknown issuer interstitial");
        browser.set_context(Context::Content).await?;
        let outcome = Self::inspect(browser, case).await;
        let restored = browser.set_context(Context::Chrome).await;
        if let Err(err) = &restored {
            warn!(%err, "could not return to chrome context");
        }

        let report = outcome?;
        restored?;
        Ok(report)
    }

    async fn inspect(
        browser: &mut Browser<D>,
        case: &UnknownIssuerCase,
    ) -> CertProbeResult<VerificationReport> {
        match browser.driver_mut().navigate(&case.url).await {
            Ok(()) => {
                return Err(CertProbeError::ExpectedNavigationFailure {
                    url: case.url.clone(),
                })
            }
            Err(CertProbeError::Navigation { message, .. }) => {
                debug!(url = %case.url, reason = %message, "navigation failed as expected");
            }
            Err(err) => return Err(err),
        }

        let page = browser.cert_error_page();
        browser.wait_for_surface(&page).await?;
        let driver = browser.driver();

        let mut report = VerificationReport::new(&case.url);
        report.expect_eq(
            "certificate domain link",
            &page.domain_link_text(driver).await?,
            &case.expected_domain,
        );
        report.expect_true(
            "\"Get me out of here\" button present",
            page.has_get_me_out_button(driver).await?,
        );
        report.expect_true(
            "\"Add exception\" button present",
            page.has_exception_button(driver).await?,
        );
        report.expect_contains(
            "technical details",
            &page.technical_text(driver).await?,
            UNKNOWN_ISSUER_ERROR_CODE,
        );
        Ok(report)
    }
}
