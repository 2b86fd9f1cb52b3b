use super::{attribute_text, css_value, ChromeSurface, IdentityPopupSelectors};
use crate::driver::{By, RemoteDriver};
use crate::result::CertProbeResult;
use serde::{Deserialize, Serialize};

/// Chrome script hiding a XUL panel passed as the first argument
pub const HIDE_POPUP_SCRIPT: &str = "arguments[0].hidePopup();";

/// Identity box in the address bar plus the popup it opens
#[derive(Debug, Clone)]
pub struct IdentityPopup {
    identity_box: By,
    organization_label: By,
    country_label: By,
    popup: By,
    icon: By,
    host: By,
    owner: By,
    owner_location: By,
    verifier: By,
    secure_connection_label: By,
    insecure_connection_label: By,
    more_info_button: By,
}

/// Everything the identity popup displays, read in one pass.
///
/// Recomputed on every popup open; never cached across navigations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPopupState {
    /// `className` of the identity box
    pub box_class: String,
    /// `className` of the popup panel
    pub popup_class: String,
    /// Organization label in the identity box
    pub organization_label: String,
    /// Country label in the identity box, e.g. `(US)`
    pub country_label: String,
    /// Host line: the organization for EV, the hostname otherwise
    pub host: String,
    /// Owner line
    pub owner: String,
    /// Owner location: city, newline, then state and country
    pub owner_location: String,
    /// Issuer line
    pub verifier: String,
    /// `list-style-image` of the lock icon
    pub icon_image: String,
    /// Whether the secure connection label is displayed
    pub secure_label_visible: bool,
    /// Whether the insecure connection label is displayed
    pub insecure_label_visible: bool,
}

impl IdentityPopup {
    /// Build from selector ids
    #[must_use]
    pub fn new(selectors: &IdentityPopupSelectors) -> Self {
        Self {
            identity_box: By::id(&selectors.identity_box),
            organization_label: By::id(&selectors.organization_label),
            country_label: By::id(&selectors.country_label),
            popup: By::id(&selectors.popup),
            icon: By::id(&selectors.icon),
            host: By::id(&selectors.host),
            owner: By::id(&selectors.owner),
            owner_location: By::id(&selectors.owner_location),
            verifier: By::id(&selectors.verifier),
            secure_connection_label: By::id(&selectors.secure_connection_label),
            insecure_connection_label: By::id(&selectors.insecure_connection_label),
            more_info_button: By::id(&selectors.more_info_button),
        }
    }

    /// Click the identity box. The popup opens asynchronously.
    pub async fn click_box(&self, driver: &dyn RemoteDriver) -> CertProbeResult<()> {
        let element = driver.find_element(&self.identity_box).await?;
        driver.click(&element).await
    }

    /// Whether the popup panel reports `state="open"`
    pub async fn is_open(&self, driver: &dyn RemoteDriver) -> CertProbeResult<bool> {
        Ok(attribute_text(driver, &self.popup, "state").await? == "open")
    }

    /// Close the popup if it is open.
    ///
    /// `force` hides the panel directly; otherwise the identity box is
    /// clicked again, which toggles it shut.
    pub async fn close(&self, driver: &dyn RemoteDriver, force: bool) -> CertProbeResult<()> {
        if !self.is_open(driver).await? {
            return Ok(());
        }
        if force {
            let popup = driver.find_element(&self.popup).await?;
            driver
                .execute_script(HIDE_POPUP_SCRIPT, vec![popup.to_arg()?])
                .await?;
            Ok(())
        } else {
            self.click_box(driver).await
        }
    }

    /// Click the "More Information" button (opens page info)
    pub async fn click_more_info(&self, driver: &dyn RemoteDriver) -> CertProbeResult<()> {
        let element = driver.find_element(&self.more_info_button).await?;
        driver.click(&element).await
    }

    /// Identity box class
    pub async fn box_class(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.identity_box, "className").await
    }

    /// Popup panel class
    pub async fn popup_class(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.popup, "className").await
    }

    /// EV organization label (empty for DV/OV)
    pub async fn organization_label(&self, driver: &dyn RemoteDriver) -> CertProbeResult<String> {
        attribute_text(driver, &self.organization_label, "value").await
    }

    /// Read the full popup projection
    pub async fn state(&self, driver: &dyn RemoteDriver) -> CertProbeResult<IdentityPopupState> {
        Ok(IdentityPopupState {
            box_class: self.box_class(driver).await?,
            popup_class: self.popup_class(driver).await?,
            organization_label: self.organization_label(driver).await?,
            country_label: attribute_text(driver, &self.country_label, "value").await?,
            host: attribute_text(driver, &self.host, "value").await?,
            owner: attribute_text(driver, &self.owner, "textContent").await?,
            owner_location: attribute_text(driver, &self.owner_location, "textContent").await?,
            verifier: attribute_text(driver, &self.verifier, "textContent").await?,
            icon_image: css_value(driver, &self.icon, "list-style-image").await?,
            secure_label_visible: is_displayed(driver, &self.secure_connection_label).await?,
            insecure_label_visible: is_displayed(driver, &self.insecure_connection_label).await?,
        })
    }
}

async fn is_displayed(driver: &dyn RemoteDriver, by: &By) -> CertProbeResult<bool> {
    Ok(css_value(driver, by, "display").await? != "none")
}

impl ChromeSurface for IdentityPopup {
    fn surface_name(&self) -> &'static str {
        "identity popup"
    }

    fn root(&self) -> &By {
        &self.popup
    }
}
