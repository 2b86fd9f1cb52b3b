use super::{ChromeSurface, TabBarSelectors};
use crate::certificate::Certificate;
use crate::driver::{By, ElementHandle, RemoteDriver};
use crate::result::{CertProbeError, CertProbeResult};
use crate::wait::Wait;

/// Chrome script returning the selected tab's server certificate, or null
pub const CERTIFICATE_SCRIPT: &str = r"
let status = gBrowser.securityUI
  .QueryInterface(Components.interfaces.nsISSLStatusProvider).SSLStatus;
if (!status || !status.serverCert) {
  return null;
}
let cert = status.serverCert;
return {
  commonName: cert.commonName,
  organization: cert.organization,
  issuerOrganization: cert.issuerOrganization,
  subjectName: cert.subjectName
};
";

/// Chrome script removing the tab passed as the first argument
pub const CLOSE_TAB_SCRIPT: &str = "gBrowser.removeTab(arguments[0]);";

/// Tab strip of the main browser window
#[derive(Debug, Clone)]
pub struct TabBar {
    tabs: By,
    new_tab_button: By,
}

impl TabBar {
    /// Build from selectors
    #[must_use]
    pub fn new(selectors: &TabBarSelectors) -> Self {
        Self {
            tabs: By::css(&selectors.tabs),
            new_tab_button: By::id(&selectors.new_tab_button),
        }
    }

    /// All tabs in strip order
    pub async fn tabs(&self, driver: &dyn RemoteDriver) -> CertProbeResult<Vec<ElementHandle>> {
        driver.find_elements(&self.tabs).await
    }

    /// Index of the selected tab
    pub async fn selected_index(&self, driver: &dyn RemoteDriver) -> CertProbeResult<Option<usize>> {
        for (index, tab) in self.tabs(driver).await?.iter().enumerate() {
            if driver.get_attribute(tab, "selected").await?.as_deref() == Some("true") {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Whether a tab exists at `index` and is the selected one
    pub async fn is_selected_tab(
        &self,
        driver: &dyn RemoteDriver,
        index: usize,
    ) -> CertProbeResult<bool> {
        Ok(self.selected_index(driver).await? == Some(index))
    }

    async fn has_tabs(&self, driver: &dyn RemoteDriver, count: usize) -> CertProbeResult<bool> {
        Ok(self.tabs(driver).await?.len() >= count)
    }

    /// Open a new tab and wait until it is the selected one
    pub async fn open_tab(&self, driver: &dyn RemoteDriver, wait: &Wait) -> CertProbeResult<usize> {
        let before = self.tabs(driver).await?.len();
        let button = driver.find_element(&self.new_tab_button).await?;
        driver.click(&button).await?;

        wait.until("new tab to open", || self.is_selected_tab(driver, before))
            .await?;
        tracing::debug!(index = before, "opened tab");
        Ok(before)
    }

    /// Select the tab at `index` and wait for the selection to land
    pub async fn select(
        &self,
        driver: &dyn RemoteDriver,
        wait: &Wait,
        index: usize,
    ) -> CertProbeResult<()> {
        let tabs = self.tabs(driver).await?;
        let tab = tabs.get(index).ok_or_else(|| CertProbeError::InvalidState {
            message: format!("no tab at index {index} ({} open)", tabs.len()),
        })?;
        driver.click(tab).await?;
        wait.until(&format!("tab {index} to be selected"), || {
            self.is_selected_tab(driver, index)
        })
        .await?;
        Ok(())
    }

    /// Wait until at least `count` tabs exist (e.g. after session restore)
    pub async fn wait_for_tabs(
        &self,
        driver: &dyn RemoteDriver,
        wait: &Wait,
        count: usize,
    ) -> CertProbeResult<()> {
        wait.until(&format!("{count} tabs to be restored"), || {
            self.has_tabs(driver, count)
        })
        .await?;
        Ok(())
    }

    /// Close every tab but the first
    pub async fn close_all_except_first(&self, driver: &dyn RemoteDriver) -> CertProbeResult<()> {
        let tabs = self.tabs(driver).await?;
        for tab in tabs.iter().skip(1).rev() {
            driver
                .execute_script(CLOSE_TAB_SCRIPT, vec![tab.to_arg()?])
                .await?;
        }
        Ok(())
    }

    /// Certificate of the selected tab's page
    pub async fn selected_certificate(
        &self,
        driver: &dyn RemoteDriver,
    ) -> CertProbeResult<Certificate> {
        let value = driver.execute_script(CERTIFICATE_SCRIPT, Vec::new()).await?;
        if value.is_null() {
            return Err(CertProbeError::InvalidState {
                message: "selected tab has no server certificate".to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl ChromeSurface for TabBar {
    fn surface_name(&self) -> &'static str {
        "tab bar"
    }

    fn root(&self) -> &By {
        &self.new_tab_button
    }
}
