//! End-to-end security checks against the scripted browser.
//!
//! Every check runs through the real page objects and waits; only the
//! browser on the other side of [`RemoteDriver`] is simulated.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use certprobe::l10n::STATE_AND_COUNTRY_KEY;
use certprobe::prelude::*;
use certprobe::{
    AddressInfo, By, Certificate, ChromeSelectors, Context, ElementHandle, Expectation, PrefValue,
    SessionRestoreCheck, UnknownIssuerCheck, WindowHandle, CERTIFICATE_STATUS_CHECK,
    SESSION_RESTORE_CHECK, STARTUP_PAGE_PREF, UNKNOWN_ISSUER_CHECK,
};

const EV_URL: &str = "https://ssl-ev.mozqa.com/";
const DV_URL: &str = "https://ssl-dv.mozqa.com";
const OV_URL: &str = "https://ssl-ov.mozqa.com/";

fn fast_wait() -> WaitOptions {
    WaitOptions::new().with_timeout(300).with_poll_interval(5)
}

async fn attach(mock: MockBrowser) -> Browser<MockBrowser> {
    Browser::attach(mock, ChromeSelectors::firefox(), fast_wait())
        .await
        .unwrap()
}

async fn check(browser: &mut Browser<MockBrowser>, case: &TestCase) -> CertProbeResult<VerificationReport> {
    browser.navigate_content(&case.url).await?;
    CertificateStatusChecker::new(browser).verify_case(case).await
}

fn mozqa_cases() -> Vec<TestCase> {
    SuiteConfig::default().cases
}

fn failed_fields(report: &VerificationReport) -> Vec<&str> {
    report.failures().iter().map(|f| f.field.as_str()).collect()
}

/// Scripted browser whose driver calls can be made to fail
#[derive(Debug, Default)]
struct FailingDriver {
    inner: MockBrowser,
    /// Relaunch the browser, then report the restart as failed
    restart_errors_after_relaunch: bool,
    /// Every `close_window` fails at the driver level
    close_window_errors: bool,
}

#[async_trait]
impl RemoteDriver for FailingDriver {
    async fn set_context(&mut self, context: Context) -> CertProbeResult<()> {
        self.inner.set_context(context).await
    }

    async fn navigate(&mut self, url: &str) -> CertProbeResult<()> {
        self.inner.navigate(url).await
    }

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> CertProbeResult<serde_json::Value> {
        self.inner.execute_script(script, args).await
    }

    async fn find_element(&self, by: &By) -> CertProbeResult<ElementHandle> {
        self.inner.find_element(by).await
    }

    async fn find_elements(&self, by: &By) -> CertProbeResult<Vec<ElementHandle>> {
        self.inner.find_elements(by).await
    }

    async fn get_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> CertProbeResult<Option<String>> {
        self.inner.get_attribute(element, name).await
    }

    async fn css_property(&self, element: &ElementHandle, name: &str) -> CertProbeResult<String> {
        self.inner.css_property(element, name).await
    }

    async fn click(&self, element: &ElementHandle) -> CertProbeResult<()> {
        self.inner.click(element).await
    }

    async fn window_handles(&self) -> CertProbeResult<Vec<WindowHandle>> {
        self.inner.window_handles().await
    }

    async fn current_window(&self) -> CertProbeResult<WindowHandle> {
        self.inner.current_window().await
    }

    async fn switch_to_window(&mut self, handle: &WindowHandle) -> CertProbeResult<()> {
        self.inner.switch_to_window(handle).await
    }

    async fn close_window(&mut self) -> CertProbeResult<()> {
        if self.close_window_errors {
            return Err(CertProbeError::driver("window close was vetoed"));
        }
        self.inner.close_window().await
    }

    async fn set_pref(&mut self, name: &str, value: PrefValue) -> CertProbeResult<()> {
        self.inner.set_pref(name, value).await
    }

    async fn reset_pref(&mut self, name: &str) -> CertProbeResult<()> {
        self.inner.reset_pref(name).await
    }

    async fn localized_string(&self, bundle: &str, key: &str) -> CertProbeResult<String> {
        self.inner.localized_string(bundle, key).await
    }

    async fn restart(&mut self) -> CertProbeResult<()> {
        self.inner.restart().await?;
        if self.restart_errors_after_relaunch {
            return Err(CertProbeError::driver("lost connection during restart"));
        }
        Ok(())
    }
}

// =============================================================================
// CERTIFICATE STATUS
// =============================================================================

#[tokio::test]
async fn test_ev_site_passes_every_check() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();

    assert!(report.passed(), "unexpected failures: {:?}", report.failures());
    // popup + label + 9 EV fields + 4 page info fields
    assert_eq!(report.check_count(), 15);
    assert!(!browser.driver().popup_open());
    assert_eq!(browser.driver().window_count(), 1);
    assert_eq!(browser.driver().context(), Context::Chrome);
}

#[tokio::test]
async fn test_domain_and_organization_sites_show_no_label() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    for case in [TestCase::domain_validated(DV_URL), TestCase::domain_validated(OV_URL)] {
        let report = check(&mut browser, &case).await.unwrap();
        assert!(report.passed(), "{}: {:?}", case.url, report.failures());
        assert_eq!(report.check_count(), 6);
    }
}

#[tokio::test]
async fn test_explicit_ev_fixture() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    browser.navigate_content(EV_URL).await.unwrap();

    let certificate = Certificate::new("Mozilla Corporation", "DigiCert Inc", "ssl-ev.mozqa.com");
    let address = AddressInfo::new("US", "CA", "Mountain View");
    let report = CertificateStatusChecker::new(&mut browser)
        .verify(
            EV_URL,
            &certificate,
            &address,
            "Mozilla Corporation",
            IdentityClass::VerifiedIdentity,
        )
        .await
        .unwrap();
    assert!(report.passed(), "{:?}", report.failures());

    let state = browser
        .identity_popup()
        .state(browser.driver())
        .await
        .unwrap();
    assert_eq!(state.host, "Mozilla Corporation");
    assert_eq!(state.country_label, "(US)");
    assert_eq!(state.owner_location, "Mountain View\nCA, US");
    assert_eq!(state.verifier, "Verified by: DigiCert Inc");
}

#[tokio::test]
async fn test_location_template_fills_state_before_country() {
    let mock = MockBrowser::mozqa().with_string(STATE_AND_COUNTRY_KEY, "%S / %S");
    let mut browser = attach(mock).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();
    assert!(report.passed());

    let state = browser
        .identity_popup()
        .state(browser.driver())
        .await
        .unwrap();
    assert_eq!(state.owner_location, "Mountain View\nCA / US");
}

#[tokio::test]
async fn test_mismatches_are_enumerated() {
    let mock = MockBrowser::mozqa()
        .with_override("identity-popup", "className", "verifiedDomain")
        .with_override("identity-icon-label", "value", "");
    let mut browser = attach(mock).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();

    let fields: Vec<_> = report.failures().iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, ["identity popup class", "organization label"]);
    assert_eq!(report.failures()[0].actual, "verifiedDomain");
    assert_eq!(report.failures()[0].expected, "verifiedIdentity");

    let err = report.into_result().unwrap_err();
    assert!(matches!(&err, CertProbeError::AssertionFailed { failures, .. } if failures.len() == 2));
    assert!(err.to_string().contains(EV_URL));
}

#[tokio::test]
async fn test_wrong_expected_class_is_reported() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    let report = check(&mut browser, &TestCase::domain_validated(EV_URL))
        .await
        .unwrap();

    let fields: Vec<_> = report.failures().iter().map(|f| f.field.as_str()).collect();
    assert!(fields.contains(&"identity popup class"));
    assert!(fields.contains(&"organization label"));
    assert!(fields.contains(&"page info owner"));
}

#[tokio::test]
async fn test_insecure_label_and_verifier_mismatch() {
    let mock = MockBrowser::mozqa()
        .with_override("identity-popup-insecure-connection", "display", "block")
        .with_override("identity-popup-content-verifier", "textContent", "Verified by: Someone");
    let mut browser = attach(mock).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();

    let fields: Vec<_> = report.failures().iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, ["insecure connection label hidden", "verifier"]);
}

#[tokio::test]
async fn test_slow_popup_is_awaited() {
    let mut browser = attach(MockBrowser::mozqa().with_transition_polls(5)).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();
    assert!(report.passed());
}

#[tokio::test]
async fn test_popup_timeout_is_fatal() {
    let faults = MockFaults {
        popup_never_opens: true,
        ..MockFaults::default()
    };
    let mut browser = attach(MockBrowser::mozqa().with_faults(faults)).await;
    let err = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        CertProbeError::Timeout { waited_for, ms: 300 } if waited_for == "identity popup to open"
    ));
    assert_eq!(browser.driver().window_count(), 1);
}

#[tokio::test]
async fn test_page_info_timeout_still_cleans_up() {
    let faults = MockFaults {
        page_info_never_opens: true,
        ..MockFaults::default()
    };
    let mut browser = attach(MockBrowser::mozqa().with_faults(faults)).await;
    let err = check(&mut browser, &TestCase::domain_validated(DV_URL))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        CertProbeError::Timeout { waited_for, .. } if waited_for == "page info window to open"
    ));
    assert!(browser.driver().was_called("execute_script:hide_popup"));
    assert!(!browser.driver().popup_open());
}

#[tokio::test]
async fn test_hidden_favicon_times_out_and_cleans_up() {
    // Nothing loaded: the blank tab never shows a security favicon
    let mut browser = attach(MockBrowser::mozqa()).await;
    let certificate = Certificate::new("Mozilla Corporation", "DigiCert Inc", "ssl-ev.mozqa.com");
    let address = AddressInfo::new("US", "CA", "Mountain View");
    let err = CertificateStatusChecker::new(&mut browser)
        .verify(
            EV_URL,
            &certificate,
            &address,
            "Mozilla Corporation",
            IdentityClass::VerifiedIdentity,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        CertProbeError::Timeout { waited_for, ms: 300 } if waited_for == "security favicon to be visible"
    ));
    let mock = browser.driver();
    assert!(!mock.was_called("click:identity-box"));
    assert!(mock.was_called("switch_to_window:main-0"));
    assert!(!mock.popup_open());
    assert_eq!(mock.window_count(), 1);
}

#[tokio::test]
async fn test_ev_host_showing_hostname_is_reported() {
    let mock = MockBrowser::mozqa().with_override(
        "identity-popup-content-host",
        "value",
        "ssl-ev.mozqa.com",
    );
    let mut browser = attach(mock).await;
    let report = check(&mut browser, &TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();

    assert_eq!(failed_fields(&report), ["host"]);
    assert_eq!(report.failures()[0].expected, "Mozilla Corporation");
    assert_eq!(report.failures()[0].actual, "ssl-ev.mozqa.com");
}

#[tokio::test]
async fn test_wildcard_domain_outside_certificate_is_reported() {
    let mock = MockBrowser::mozqa().with_override(
        "security-identity-domain-value",
        "value",
        "ssl-ov.example.com",
    );
    let mut browser = attach(mock).await;
    let report = check(&mut browser, &TestCase::domain_validated(OV_URL))
        .await
        .unwrap();

    assert_eq!(failed_fields(&report), ["page info domain"]);
    let mismatch = &report.failures()[0];
    assert_eq!(mismatch.expectation, Expectation::Contains);
    assert_eq!(mismatch.expected, "mozqa.com");
}

#[tokio::test]
async fn test_failed_window_close_still_hides_popup() {
    let driver = FailingDriver {
        inner: MockBrowser::mozqa(),
        close_window_errors: true,
        ..FailingDriver::default()
    };
    let mut browser = Browser::attach(driver, ChromeSelectors::firefox(), fast_wait())
        .await
        .unwrap();
    browser.navigate_content(DV_URL).await.unwrap();
    let err = CertificateStatusChecker::new(&mut browser)
        .verify_case(&TestCase::domain_validated(DV_URL))
        .await
        .unwrap_err();

    assert!(matches!(&err, CertProbeError::Driver { message } if message == "window close was vetoed"));
    let mock = &browser.driver().inner;
    assert!(mock.was_called("execute_script:hide_popup"));
    assert!(!mock.popup_open());
    let history = mock.history();
    assert_eq!(
        history[history.len() - 2..],
        ["switch_to_window:main-0", "execute_script:hide_popup"]
    );
}

#[tokio::test]
async fn test_summary_depth_skips_page_info() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    browser.navigate_content(EV_URL).await.unwrap();
    let report = CertificateStatusChecker::new(&mut browser)
        .with_depth(CheckDepth::Summary)
        .verify_case(&TestCase::extended(EV_URL, "Mozilla Corporation"))
        .await
        .unwrap();

    assert!(report.passed());
    assert_eq!(report.check_count(), 2);
    assert!(!browser.driver().was_called("execute_script:certificate"));
    assert!(!browser.driver().was_called("switch_to_window:page-info"));
}

// =============================================================================
// SESSION RESTORE
// =============================================================================

#[tokio::test]
async fn test_restored_tabs_keep_their_identity() {
    let cases = mozqa_cases();
    let mut browser = attach(MockBrowser::mozqa().with_transition_polls(3)).await;
    let report = SessionRestoreCheck::new(&mut browser, &cases).run().await.unwrap();

    assert!(report.passed());
    assert_eq!(report.before_restart.len(), 3);
    let restored: Vec<_> = report.after_restart.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(restored, [DV_URL, EV_URL, OV_URL]);

    let mock = browser.driver();
    assert_eq!(mock.restarts(), 1);
    assert_eq!(mock.pref(STARTUP_PAGE_PREF), None);
    assert_eq!(mock.tab_urls(), vec![Some(DV_URL.to_string())]);
    assert_eq!(browser.main_window().0, "main-1");
}

#[tokio::test]
async fn test_lost_session_times_out_and_tears_down() {
    let faults = MockFaults {
        lose_session_on_restart: true,
        ..MockFaults::default()
    };
    let cases = mozqa_cases();
    let mut browser = attach(MockBrowser::mozqa().with_faults(faults)).await;
    let err = SessionRestoreCheck::new(&mut browser, &cases)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        CertProbeError::Timeout { waited_for, .. } if waited_for == "3 tabs to be restored"
    ));
    let mock = browser.driver();
    assert!(mock.was_called("reset_pref:browser.startup.page"));
    assert_eq!(mock.pref(STARTUP_PAGE_PREF), None);
}

#[tokio::test]
async fn test_changed_identity_after_restart_is_reported() {
    let faults = MockFaults {
        downgrade_on_restart: true,
        ..MockFaults::default()
    };
    let cases = mozqa_cases();
    let mut browser = attach(MockBrowser::mozqa().with_faults(faults)).await;
    let report = SessionRestoreCheck::new(&mut browser, &cases).run().await.unwrap();

    assert!(!report.passed());
    assert!(report.before_restart.iter().all(VerificationReport::passed));
    let after: Vec<_> = report.after_restart.iter().map(failed_fields).collect();
    assert_eq!(after[0], Vec::<&str>::new());
    assert_eq!(after[1], ["identity popup class", "organization label"]);
    assert_eq!(after[2], Vec::<&str>::new());
    assert_eq!(report.after_restart[1].failures()[0].actual, "verifiedDomain");
    assert_eq!(browser.driver().pref(STARTUP_PAGE_PREF), None);
}

#[tokio::test]
async fn test_failed_restart_keeps_relaunched_window_and_resets_pref() {
    let driver = FailingDriver {
        inner: MockBrowser::mozqa(),
        restart_errors_after_relaunch: true,
        ..FailingDriver::default()
    };
    let cases = mozqa_cases();
    let mut browser = Browser::attach(driver, ChromeSelectors::firefox(), fast_wait())
        .await
        .unwrap();
    let err = SessionRestoreCheck::new(&mut browser, &cases)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(&err, CertProbeError::Driver { message } if message == "lost connection during restart"));
    assert_eq!(browser.main_window().0, "main-1");
    let mock = &browser.driver().inner;
    assert!(!mock.was_called("close_window:main-1"));
    assert!(mock.was_called("reset_pref:browser.startup.page"));
    assert_eq!(mock.pref(STARTUP_PAGE_PREF), None);
    assert_eq!(mock.tab_urls(), vec![Some(DV_URL.to_string())]);
}

// =============================================================================
// UNKNOWN ISSUER
// =============================================================================

#[tokio::test]
async fn test_unknown_issuer_shows_error_page() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    let case = UnknownIssuerCase::default();
    let report = UnknownIssuerCheck::new(&mut browser, &case).run().await.unwrap();

    assert!(report.passed(), "{:?}", report.failures());
    assert_eq!(report.check_count(), 4);
    assert_eq!(browser.driver().context(), Context::Chrome);
}

#[tokio::test]
async fn test_trusted_unknown_issuer_is_a_failure() {
    let faults = MockFaults {
        trust_unknown_issuers: true,
        ..MockFaults::default()
    };
    let mut browser = attach(MockBrowser::mozqa().with_faults(faults)).await;
    let case = UnknownIssuerCase::default();
    let err = UnknownIssuerCheck::new(&mut browser, &case)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CertProbeError::ExpectedNavigationFailure { ref url } if *url == case.url));
    assert_eq!(browser.driver().context(), Context::Chrome);
}

#[tokio::test]
async fn test_unexpected_domain_link_is_reported() {
    let mut browser = attach(MockBrowser::mozqa()).await;
    let case = UnknownIssuerCase::new("https://ssl-unknownissuer.mozqa.com", "ssl-unknownissuer.mozqa.com");
    let report = UnknownIssuerCheck::new(&mut browser, &case).run().await.unwrap();

    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].field, "certificate domain link");
}

// =============================================================================
// SUITE
// =============================================================================

#[tokio::test]
async fn test_default_suite_passes_against_mozqa() {
    let suite = SecuritySuite::new(SuiteConfig::default().with_wait(fast_wait()));
    let mut browser = suite.attach(MockBrowser::mozqa()).await.unwrap();
    let report = suite.run(&mut browser).await;

    assert!(report.all_passed(), "{:?}", report.outcomes);
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, [CERTIFICATE_STATUS_CHECK, SESSION_RESTORE_CHECK, UNKNOWN_ISSUER_CHECK]);
    assert_eq!(report.outcome(SESSION_RESTORE_CHECK).unwrap().reports.len(), 6);
}

#[tokio::test]
async fn test_attach_installs_configured_subscriber() {
    let suite = SecuritySuite::new(SuiteConfig::default().with_wait(fast_wait()));
    suite.attach(MockBrowser::mozqa()).await.unwrap();
    assert!(!suite.init_logging());
}

#[tokio::test]
async fn test_fatal_error_aborts_only_its_check() {
    let faults = MockFaults {
        lose_session_on_restart: true,
        ..MockFaults::default()
    };
    let suite = SecuritySuite::new(SuiteConfig::default().with_wait(fast_wait()));
    let mut browser = suite.attach(MockBrowser::mozqa().with_faults(faults)).await.unwrap();
    let report = suite.run(&mut browser).await;

    assert_eq!(report.passed_count(), 2);
    assert_eq!(report.failed_count(), 1);
    let aborted = report.outcome(SESSION_RESTORE_CHECK).unwrap();
    assert!(aborted.error.as_deref().unwrap().contains("tabs to be restored"));
    assert!(report.outcome(UNKNOWN_ISSUER_CHECK).unwrap().passed());
}

#[tokio::test]
async fn test_suite_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("security.yaml");
    std::fs::write(
        &path,
        r"
cases:
  - url: https://ssl-ev.mozqa.com/
    expected_identity: Mozilla Corporation
    expected_class: verifiedIdentity
  - url: https://ssl-ov.mozqa.com/
    expected_class: verifiedDomain
wait:
  timeout_ms: 500
  poll_interval_ms: 5
log_format: json
",
    )
    .unwrap();

    let config = SuiteConfig::from_file(&path).unwrap();
    assert_eq!(config.log_format, certprobe::LogFormat::Json);
    let suite = SecuritySuite::new(config);
    let mut browser = suite.attach(MockBrowser::mozqa()).await.unwrap();
    let reports = suite.certificate_status(&mut browser).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(VerificationReport::passed));
}
