//! Page Objects for Browser Chrome
//!
//! Each surface the checks read (location bar, identity popup, page info
//! window, tab bar, certificate error page) is wrapped in a page object that
//! owns its locators and exposes typed reads over a [`RemoteDriver`].
//!
//! Locators come from [`ChromeSelectors`], which defaults to the ids Firefox
//! uses and can be overridden from the suite configuration.

mod cert_error;
mod identity_popup;
mod location_bar;
mod page_info;
mod tab_bar;

pub use cert_error::{CertErrorPage, UNKNOWN_ISSUER_ERROR_CODE};
pub use identity_popup::{IdentityPopup, IdentityPopupState, HIDE_POPUP_SCRIPT};
pub use location_bar::LocationBar;
pub use page_info::{
    PageInfoWindow, BROWSER_WINDOW_TYPE, PAGE_INFO_WINDOW_TYPE, SECURITY_PANEL,
};
pub use tab_bar::{TabBar, CERTIFICATE_SCRIPT, CLOSE_TAB_SCRIPT};

use crate::driver::{By, RemoteDriver};
use crate::result::CertProbeResult;
use serde::{Deserialize, Serialize};

/// A chrome surface with a root element whose presence means "rendered"
pub trait ChromeSurface {
    /// Name used in logs and timeout messages
    fn surface_name(&self) -> &'static str;

    /// Locator of the element that signals the surface is present
    fn root(&self) -> &By;
}

/// Read an attribute, mapping "absent" to the empty string.
pub(crate) async fn attribute_text(
    driver: &dyn RemoteDriver,
    by: &By,
    name: &str,
) -> CertProbeResult<String> {
    let element = driver.find_element(by).await?;
    let value = driver.get_attribute(&element, name).await?;
    tracing::debug!(selector = %by, attribute = name, ?value, "read attribute");
    Ok(value.unwrap_or_default())
}

/// Read a computed CSS property
pub(crate) async fn css_value(
    driver: &dyn RemoteDriver,
    by: &By,
    property: &str,
) -> CertProbeResult<String> {
    let element = driver.find_element(by).await?;
    driver.css_property(&element, property).await
}

/// Locators for every chrome surface the checks touch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeSelectors {
    /// Root element of top-level windows (carries `windowtype`)
    pub window_root: String,
    /// Address bar elements
    pub location_bar: LocationBarSelectors,
    /// Identity popup elements
    pub identity_popup: IdentityPopupSelectors,
    /// Page info window elements
    pub page_info: PageInfoSelectors,
    /// Tab strip elements
    pub tab_bar: TabBarSelectors,
    /// Certificate error page elements (content document)
    pub cert_error: CertErrorSelectors,
}

impl Default for ChromeSelectors {
    fn default() -> Self {
        Self::firefox()
    }
}

impl ChromeSelectors {
    /// Firefox desktop defaults
    #[must_use]
    pub fn firefox() -> Self {
        Self {
            window_root: "main-window".to_string(),
            location_bar: LocationBarSelectors::default(),
            identity_popup: IdentityPopupSelectors::default(),
            page_info: PageInfoSelectors::default(),
            tab_bar: TabBarSelectors::default(),
            cert_error: CertErrorSelectors::default(),
        }
    }

    /// Window root locator
    #[must_use]
    pub fn window_root(&self) -> By {
        By::id(&self.window_root)
    }
}

/// Address bar element ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationBarSelectors {
    /// Security favicon
    pub favicon: String,
}

impl Default for LocationBarSelectors {
    fn default() -> Self {
        Self {
            favicon: "page-proxy-favicon".to_string(),
        }
    }
}

/// Identity popup element ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPopupSelectors {
    /// Identity box in the address bar (click target for the popup)
    pub identity_box: String,
    /// EV organization label inside the identity box
    pub organization_label: String,
    /// EV country label inside the identity box
    pub country_label: String,
    /// Popup panel
    pub popup: String,
    /// Lock icon inside the popup
    pub icon: String,
    /// Host line
    pub host: String,
    /// Owner line
    pub owner: String,
    /// Owner location line
    pub owner_location: String,
    /// Verifier line
    pub verifier: String,
    /// Secure connection label
    pub secure_connection_label: String,
    /// Insecure connection label
    pub insecure_connection_label: String,
    /// "More Information" button, opens page info
    pub more_info_button: String,
}

impl Default for IdentityPopupSelectors {
    fn default() -> Self {
        Self {
            identity_box: "identity-box".to_string(),
            organization_label: "identity-icon-label".to_string(),
            country_label: "identity-icon-country-label".to_string(),
            popup: "identity-popup".to_string(),
            icon: "identity-popup-icon".to_string(),
            host: "identity-popup-content-host".to_string(),
            owner: "identity-popup-content-owner".to_string(),
            owner_location: "identity-popup-content-supplemental".to_string(),
            verifier: "identity-popup-content-verifier".to_string(),
            secure_connection_label: "identity-popup-secure-connection".to_string(),
            insecure_connection_label: "identity-popup-insecure-connection".to_string(),
            more_info_button: "identity-popup-more-info-button".to_string(),
        }
    }
}

/// Page info window element ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageInfoSelectors {
    /// Radio group whose `value` names the selected panel
    pub view_group: String,
    /// Security panel website field
    pub domain: String,
    /// Security panel owner field
    pub owner: String,
    /// Security panel verifier field
    pub verifier: String,
}

impl Default for PageInfoSelectors {
    fn default() -> Self {
        Self {
            view_group: "viewGroup".to_string(),
            domain: "security-identity-domain-value".to_string(),
            owner: "security-identity-owner-value".to_string(),
            verifier: "security-identity-verifier-value".to_string(),
        }
    }
}

/// Tab strip locators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabBarSelectors {
    /// CSS selector matching every tab, in strip order
    pub tabs: String,
    /// New tab button id
    pub new_tab_button: String,
}

impl Default for TabBarSelectors {
    fn default() -> Self {
        Self {
            tabs: "#tabbrowser-tabs tab".to_string(),
            new_tab_button: "new-tab-button".to_string(),
        }
    }
}

/// Certificate error page element ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertErrorSelectors {
    /// Link naming the certificate's domain
    pub domain_link: String,
    /// "Get me out of here!" button
    pub get_me_out_button: String,
    /// "Add Exception..." button
    pub exception_button: String,
    /// Technical details text
    pub technical_content: String,
}

impl Default for CertErrorSelectors {
    fn default() -> Self {
        Self {
            domain_link: "cert_domain_link".to_string(),
            get_me_out_button: "getMeOutOfHereButton".to_string(),
            exception_button: "exceptionDialogButton".to_string(),
            technical_content: "technicalContentText".to_string(),
        }
    }
}
