use super::{ChromeSurface, LocationBarSelectors};
use crate::driver::{By, RemoteDriver};
use crate::result::CertProbeResult;

/// Address bar security favicon
#[derive(Debug, Clone)]
pub struct LocationBar {
    favicon: By,
}

impl LocationBar {
    /// Build from selector ids
    #[must_use]
    pub fn new(selectors: &LocationBarSelectors) -> Self {
        Self {
            favicon: By::id(&selectors.favicon),
        }
    }

    /// Whether the security favicon is shown, i.e. carries no `hidden`
    /// attribute (or `hidden="false"`).
    ///
    /// The favicon only becomes visible once the TLS state of the page has
    /// been computed.
    pub async fn is_favicon_visible(&self, driver: &dyn RemoteDriver) -> CertProbeResult<bool> {
        let element = driver.find_element(&self.favicon).await?;
        let hidden = driver.get_attribute(&element, "hidden").await?;
        Ok(matches!(hidden.as_deref(), None | Some("false")))
    }
}

impl ChromeSurface for LocationBar {
    fn surface_name(&self) -> &'static str {
        "location bar favicon"
    }

    fn root(&self) -> &By {
        &self.favicon
    }
}
