//! Certificate Status Verification
//!
//! Walks the chrome a user would look at to judge a site's identity and
//! compares every displayed value against the certificate:
//!
//! ```text
//! favicon visible ─► open identity popup ─► popup class ─► organization label
//!        │                                                        │
//!        │                      (EV only) country, host, secure/insecure
//!        │                      labels, owner, owner location, verifier
//!        ▼                                                        ▼
//!  page info window ─► security panel: domain, owner, verifier ─► close
//! ```
//!
//! Mismatches are collected in a [`VerificationReport`]. Timeouts and driver
//! failures abort with `Err`. Whatever happens, opened windows and the popup
//! are closed before returning.

use crate::browser::Browser;
use crate::certificate::{
    domain_from_common_name, matches_common_name, AddressInfo, Certificate, IdentityClass,
};
use crate::chrome::SECURITY_PANEL;
use crate::driver::RemoteDriver;
use crate::l10n;
use crate::report::{Expectation, VerificationReport};
use crate::result::{CertProbeResult, Teardown};
use crate::suite::TestCase;
use tracing::{debug, info, warn};

/// How much of the chrome to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckDepth {
    /// Favicon, popup, identity popup details and the page info panel
    #[default]
    Full,
    /// Favicon, popup class and organization label only
    Summary,
}

/// Verifies that browser chrome reflects a page's certificate
#[derive(Debug)]
pub struct CertificateStatusChecker<'a, D: RemoteDriver> {
    browser: &'a mut Browser<D>,
    depth: CheckDepth,
}

impl<'a, D: RemoteDriver> CertificateStatusChecker<'a, D> {
    /// Create a checker that walks the full chrome
    pub fn new(browser: &'a mut Browser<D>) -> Self {
        Self {
            browser,
            depth: CheckDepth::Full,
        }
    }

    /// Set the check depth
    #[must_use]
    pub fn with_depth(mut self, depth: CheckDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Verify the page currently shown against a fixture, reading the
    /// certificate and address from the selected tab.
    ///
    /// [`CheckDepth::Summary`] never touches the certificate, so it can run
    /// against restored tabs that have not reconnected.
    pub async fn verify_case(&mut self, case: &TestCase) -> CertProbeResult<VerificationReport> {
        let certificate = match self.depth {
            CheckDepth::Full => self.browser.selected_certificate().await?,
            CheckDepth::Summary => Certificate::default(),
        };
        let address = certificate.address();
        self.verify(
            &case.url,
            &certificate,
            &address,
            &case.expected_identity,
            case.expected_class,
        )
        .await
    }

    /// Verify the page currently shown.
    ///
    /// `expected_identity` is the organization label the identity box should
    /// show: the organization for EV, empty otherwise.
    pub async fn verify(
        &mut self,
        url: &str,
        certificate: &Certificate,
        address: &AddressInfo,
        expected_identity: &str,
        expected_class: IdentityClass,
    ) -> CertProbeResult<VerificationReport> {
        info!(url, class = %expected_class, depth = ?self.depth, "verifying certificate status");
        let mut report = VerificationReport::new(url);

        let outcome = self
            .run(&mut report, certificate, address, expected_identity, expected_class)
            .await;
        let cleanup = self.cleanup().await;
        if let Err(err) = &cleanup {
            warn!(url, %err, "cleanup after verification failed");
        }

        outcome?;
        cleanup?;
        debug!(url, checks = report.check_count(), failures = report.failures().len(), "verification finished");
        Ok(report)
    }

    async fn run(
        &mut self,
        report: &mut VerificationReport,
        certificate: &Certificate,
        address: &AddressInfo,
        expected_identity: &str,
        expected_class: IdentityClass,
    ) -> CertProbeResult<()> {
        self.wait_for_favicon().await?;
        self.open_identity_popup().await?;

        let driver = self.browser.driver();
        let popup = self.browser.identity_popup();
        report.expect_eq(
            "identity popup class",
            &popup.popup_class(driver).await?,
            expected_class.class_name(),
        );
        report.expect_eq(
            "organization label",
            &popup.organization_label(driver).await?,
            expected_identity,
        );

        if self.depth == CheckDepth::Summary {
            return Ok(());
        }

        if expected_class.shows_organization() {
            self.check_extended_validation(report, certificate, address, expected_class)
                .await?;
        }
        self.check_page_info(report, certificate, expected_identity).await
    }

    async fn wait_for_favicon(&self) -> CertProbeResult<()> {
        let driver = self.browser.driver();
        let location_bar = self.browser.location_bar();
        let location_bar = &location_bar;
        self.browser
            .wait()
            .until("security favicon to be visible", || {
                location_bar.is_favicon_visible(driver)
            })
            .await?;
        Ok(())
    }

    async fn open_identity_popup(&self) -> CertProbeResult<()> {
        let driver = self.browser.driver();
        let popup = self.browser.identity_popup();
        popup.click_box(driver).await?;

        let popup = &popup;
        self.browser
            .wait()
            .until("identity popup to open", || popup.is_open(driver))
            .await?;
        Ok(())
    }

    async fn check_extended_validation(
        &self,
        report: &mut VerificationReport,
        certificate: &Certificate,
        address: &AddressInfo,
        expected_class: IdentityClass,
    ) -> CertProbeResult<()> {
        let state = self
            .browser
            .identity_popup()
            .state(self.browser.driver())
            .await?;

        report.expect_eq("identity box class", &state.box_class, expected_class.class_name());
        report.expect_eq("country label", &state.country_label, &l10n::country_label(address));
        report.expect_ne("lock icon image", &state.icon_image, "none");
        // EV shows the organization where DV shows the hostname
        report.expect_eq("host", &state.host, &certificate.organization);
        report.expect_true("secure connection label visible", state.secure_label_visible);
        report.expect_true("insecure connection label hidden", !state.insecure_label_visible);
        report.expect_eq("owner", &state.owner, &certificate.organization);

        let location_template = self
            .browser
            .localized(l10n::BROWSER_BUNDLE, l10n::STATE_AND_COUNTRY_KEY)
            .await?;
        report.expect_eq(
            "owner location",
            &state.owner_location,
            &l10n::owner_location(&location_template, address),
        );

        let verifier_template = self
            .browser
            .localized(l10n::BROWSER_BUNDLE, l10n::VERIFIER_KEY)
            .await?;
        report.expect_eq(
            "verifier",
            &state.verifier,
            &l10n::verifier(&verifier_template, &certificate.issuer_organization),
        );
        Ok(())
    }

    async fn check_page_info(
        &mut self,
        report: &mut VerificationReport,
        certificate: &Certificate,
        expected_identity: &str,
    ) -> CertProbeResult<()> {
        let page_info = self.browser.open_page_info_window().await?;
        let driver = self.browser.driver();

        report.expect_eq(
            "page info selected panel",
            &page_info.selected_panel(driver).await?,
            SECURITY_PANEL,
        );

        // Wildcard certificates may be shown with an expanded host
        let domain = page_info.domain(driver).await?;
        let expectation = if certificate.is_wildcard() {
            Expectation::Contains
        } else {
            Expectation::Equals
        };
        report.expect(
            "page info domain",
            expectation,
            domain_from_common_name(&certificate.common_name),
            &domain,
            matches_common_name(&domain, &certificate.common_name),
        );

        let expected_owner = if expected_identity.is_empty() {
            self.browser
                .localized(l10n::PAGE_INFO_BUNDLE, l10n::SECURITY_NO_OWNER_KEY)
                .await?
        } else {
            certificate.organization.clone()
        };
        report.expect_eq("page info owner", &page_info.owner(driver).await?, &expected_owner);
        report.expect_eq(
            "page info verifier",
            &page_info.verifier(driver).await?,
            &certificate.issuer_organization,
        );
        Ok(())
    }

    /// Close page info and any other extra window, focus the main window,
    /// then force the identity popup shut.
    async fn cleanup(&mut self) -> CertProbeResult<()> {
        let mut teardown = Teardown::new();
        teardown.step("close other windows", self.browser.close_other_windows().await);
        let popup = self.browser.identity_popup();
        teardown.step("close identity popup", popup.close(self.browser.driver(), true).await);
        teardown.finish()
    }
}
