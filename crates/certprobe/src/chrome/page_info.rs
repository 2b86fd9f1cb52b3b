use super::{attribute_text, ChromeSurface, PageInfoSelectors};
use crate::driver::{By, RemoteDriver, WindowHandle};
use crate::result::CertProbeResult;

/// `windowtype` of the page info dialog
pub const PAGE_INFO_WINDOW_TYPE: &str = "Browser:page-info";

/// `windowtype` of a browser window
pub const BROWSER_WINDOW_TYPE: &str = "navigator:browser";

/// `viewGroup` value while the security panel is shown
pub const SECURITY_PANEL: &str = "securityTab";

/// The page info dialog, opened from the identity popup.
///
/// Reads only work while the driver is switched to [`Self::handle`].
#[derive(Debug, Clone)]
pub struct PageInfoWindow {
    handle: WindowHandle,
    view_group: By,
    domain: By,
    owner: By,
    verifier: By,
}

impl PageInfoWindow {
    /// Wrap an already-open page info window
    #[must_use]
    pub fn new(handle: WindowHandle, selectors: &PageInfoSelectors) -> Self {
        Self {
            handle,
            view_group: By::id(&selectors.view_group),
            domain: By::id(&selectors.domain),
            owner: By::id(&selectors.owner),
            verifier: By::id(&selectors.verifier),
        }
    }

    /// Window handle of the dialog
    #[must_use]
    pub const fn handle(&self) -> &WindowHandle {
        &self.handle
    }

    /// Name of the panel currently shown in the deck
    pub async fn selected_panel(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.view_group, "value").await
    }

    /// Security panel: website domain
    pub async fn domain(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.domain, "value").await
    }

    /// Security panel: owner
    pub async fn owner(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.owner, "value").await
    }

    /// Security panel: verified by
    pub async fn verifier(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.verifier, "value").await
    }
}

impl ChromeSurface for PageInfoWindow {
    fn surface_name(&self) -> &'static str {
        "page info window"
    }

    fn root(&self) -> &By {
        &self.view_group
    }
}
