//! Localized string templates.
//!
//! Chrome labels are built from `.properties` strings with `%S`
//! placeholders. The checks rebuild the expected label text from the same
//! template so they stay locale independent.

use crate::certificate::AddressInfo;

/// Placeholder token in localized templates
pub const PLACEHOLDER: &str = "%S";

/// Bundle holding the identity popup strings
pub const BROWSER_BUNDLE: &str = "chrome://browser/locale/browser.properties";

/// Bundle holding the page info strings
pub const PAGE_INFO_BUNDLE: &str = "chrome://browser/locale/pageInfo.properties";

/// `%S, %S` style template for the owner's state and country
pub const STATE_AND_COUNTRY_KEY: &str = "identity.identified.state_and_country";

/// `Verified by: %S` style template
pub const VERIFIER_KEY: &str = "identity.identified.verifier";

/// Placeholder shown in page info when a site has no validated owner
pub const SECURITY_NO_OWNER_KEY: &str = "securityNoOwner";

/// Replace `%S` placeholders left to right, one value per placeholder.
///
/// Placeholders beyond the supplied values stay in the output. Inserted
/// values are never scanned for further placeholders.
#[must_use]
pub fn substitute(template: &str, values: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    for value in values {
        match rest.find(PLACEHOLDER) {
            Some(pos) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + PLACEHOLDER.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Owner location line: city, a newline, then the template with state and
/// country substituted in that order.
#[must_use]
pub fn owner_location(template: &str, address: &AddressInfo) -> String {
    format!(
        "{}\n{}",
        address.city,
        substitute(template, &[&address.state, &address.country])
    )
}

/// Verifier line for the given issuer organization
#[must_use]
pub fn verifier(template: &str, issuer_organization: &str) -> String {
    substitute(template, &[issuer_organization])
}

/// Country label shown next to an EV organization name
#[must_use]
pub fn country_label(address: &AddressInfo) -> String {
    format!("({})", address.country)
}
