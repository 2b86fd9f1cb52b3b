use super::{attribute_text, CertErrorSelectors, ChromeSurface};
use crate::driver::{By, RemoteDriver};
use crate::result::CertProbeResult;

/// Error code the technical details show for an untrusted issuer
pub const UNKNOWN_ISSUER_ERROR_CODE: &str = "sec_error_unknown_issuer";

/// `about:certerror` interstitial in the content document
#[derive(Debug, Clone)]
pub struct CertErrorPage {
    domain_link: By,
    get_me_out_button: By,
    exception_button: By,
    technical_content: By,
}

impl CertErrorPage {
    /// Build from selector ids
    #[must_use]
    pub fn new(selectors: &CertErrorSelectors) -> Self {
        Self {
            domain_link: By::id(&selectors.domain_link),
            get_me_out_button: By::id(&selectors.get_me_out_button),
            exception_button: By::id(&selectors.exception_button),
            technical_content: By::id(&selectors.technical_content),
        }
    }

    /// Text of the link naming the certificate's domain
    pub async fn domain_link_text(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.domain_link, "textContent").await
    }

    /// Whether the "Get me out of here!" button exists
    pub async fn has_get_me_out_button(&self, driver: &dyn RemoteDriver) -> CertProbeResult<bool> {
        exists(driver, &self.get_me_out_button).await
    }

    /// Whether the "Add Exception…" button exists
    pub async fn has_exception_button(&self, driver: &dyn RemoteDriver) -> CertProbeResult<bool> {
        exists(driver, &self.exception_button).await
    }

    /// Technical details text block
    pub async fn technical_text(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.technical_content, "textContent").await
    }
}

async fn exists(driver: &dyn RemoteDriver, by: &By) -> CertProbeResult<bool> {
    match driver.find_element(by).await {
        Ok(_) => Ok(true),
        Err(err) if err.is_element_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

impl ChromeSurface for CertErrorPage {
    fn surface_name(&self) -> &'static str {
        "certificate error page"
    }

    fn root(&self) -> &By {
        &self.domain_link
    }
}
