//! Certificate status across a restart with session restore.
//!
//! Each fixture site is loaded in its own tab and fully verified, the
//! browser restarts into the previous session, and every restored tab must
//! show the same identity class and label as before, in the same order.

use crate::browser::{Browser, RESTORE_PREVIOUS_SESSION, STARTUP_PAGE_PREF};
use crate::checker::{CertificateStatusChecker, CheckDepth};
use crate::driver::{Context, PrefValue, RemoteDriver};
use crate::report::VerificationReport;
use crate::result::{CertProbeResult, Teardown};
use crate::suite::TestCase;
use tracing::info;

/// Reports gathered on both sides of the restart
#[derive(Debug, Clone, Default)]
pub struct SessionRestoreReport {
    /// One full report per site, before restarting
    pub before_restart: Vec<VerificationReport>,
    /// One summary report per restored tab, in fixture order
    pub after_restart: Vec<VerificationReport>,
}

impl SessionRestoreReport {
    /// Whether every report on both sides passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.before_restart
            .iter()
            .chain(&self.after_restart)
            .all(VerificationReport::passed)
    }

    /// All reports, pre-restart first
    #[must_use]
    pub fn into_reports(self) -> Vec<VerificationReport> {
        self.before_restart
            .into_iter()
            .chain(self.after_restart)
            .collect()
    }
}

/// Restart-persistence check
#[derive(Debug)]
pub struct SessionRestoreCheck<'a, D: RemoteDriver> {
    browser: &'a mut Browser<D>,
    cases: &'a [TestCase],
}

impl<'a, D: RemoteDriver> SessionRestoreCheck<'a, D> {
    /// Check `cases`, one tab each, in order
    pub fn new(browser: &'a mut Browser<D>, cases: &'a [TestCase]) -> Self {
        Self { browser, cases }
    }

    /// Run the check. Teardown runs on every exit path.
    pub async fn run(mut self) -> CertProbeResult<SessionRestoreReport> {
        self.browser
            .set_pref(STARTUP_PAGE_PREF, PrefValue::Int(RESTORE_PREVIOUS_SESSION))
            .await?;

        let mut report = SessionRestoreReport::default();
        let outcome = self.run_inner(&mut report).await;
        let teardown = self.teardown().await;

        outcome?;
        teardown?;
        Ok(report)
    }

    async fn run_inner(&mut self, report: &mut SessionRestoreReport) -> CertProbeResult<()> {
        for case in self.cases {
            self.browser.navigate_content(&case.url).await?;
            let site = CertificateStatusChecker::new(&mut *self.browser)
                .verify_case(case)
                .await?;
            report.before_restart.push(site);

            let tab_bar = self.browser.tab_bar();
            tab_bar
                .open_tab(self.browser.driver(), self.browser.wait())
                .await?;
        }

        self.browser.restart().await?;

        let tab_bar = self.browser.tab_bar();
        tab_bar
            .wait_for_tabs(self.browser.driver(), self.browser.wait(), self.cases.len())
            .await?;
        info!(tabs = self.cases.len(), "session restored");

        for (index, case) in self.cases.iter().enumerate() {
            tab_bar
                .select(self.browser.driver(), self.browser.wait(), index)
                .await?;
            let restored = CertificateStatusChecker::new(&mut *self.browser)
                .with_depth(CheckDepth::Summary)
                .verify_case(case)
                .await?;
            report.after_restart.push(restored);
        }
        Ok(())
    }

    async fn teardown(&mut self) -> CertProbeResult<()> {
        let mut teardown = Teardown::new();
        teardown.step("return to chrome", self.browser.set_context(Context::Chrome).await);
        teardown.step("close other windows", self.browser.close_other_windows().await);
        let tab_bar = self.browser.tab_bar();
        teardown.step(
            "close extra tabs",
            tab_bar.close_all_except_first(self.browser.driver()).await,
        );
        teardown.step("focus main window", self.browser.focus().await);
        let popup = self.browser.identity_popup();
        teardown.step(
            "close identity popup",
            popup.close(self.browser.driver(), true).await,
        );
        teardown.step(
            "reset startup pref",
            self.browser.reset_pref(STARTUP_PAGE_PREF).await,
        );
        teardown.finish()
    }
}
