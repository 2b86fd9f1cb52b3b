//! Certificate metadata as reported by the browser's TLS state, and the
//! identity classes the chrome derives from it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Server certificate of the selected tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    /// Subject organization (`O`)
    pub organization: String,
    /// Issuer organization
    pub issuer_organization: String,
    /// Subject common name (`CN`), possibly a wildcard
    pub common_name: String,
    /// Full subject distinguished name
    pub subject_name: String,
}

impl Certificate {
    /// Create a certificate record
    #[must_use]
    pub fn new(
        organization: impl Into<String>,
        issuer_organization: impl Into<String>,
        common_name: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            issuer_organization: issuer_organization.into(),
            common_name: common_name.into(),
            subject_name: String::new(),
        }
    }

    /// Set the subject distinguished name
    #[must_use]
    pub fn with_subject_name(mut self, subject_name: impl Into<String>) -> Self {
        self.subject_name = subject_name.into();
        self
    }

    /// Whether the common name is a wildcard (`*.example.com`)
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.common_name.starts_with('*')
    }

    /// Address fields from the subject name
    #[must_use]
    pub fn address(&self) -> AddressInfo {
        AddressInfo::from_subject_name(&self.subject_name)
    }
}

/// Postal location of the certificate subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Country (`C`)
    pub country: String,
    /// State or province (`ST`)
    pub state: String,
    /// Locality (`L`)
    pub city: String,
}

impl AddressInfo {
    /// Create an address
    #[must_use]
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.into(),
            city: city.into(),
        }
    }

    /// Parse `C`, `ST` and `L` out of a distinguished name such as
    /// `CN=ssl-ev.mozqa.com,O=Mozilla Corporation,L=Mountain View,ST=CA,C=US`.
    ///
    /// Quoted values and `\,` escapes are honoured. Missing attributes are
    /// left empty; the first occurrence of a repeated attribute wins.
    #[must_use]
    pub fn from_subject_name(subject: &str) -> Self {
        let mut address = Self::default();
        for (key, value) in subject_attributes(subject) {
            let slot = match key.to_ascii_uppercase().as_str() {
                "C" => &mut address.country,
                "ST" => &mut address.state,
                "L" => &mut address.city,
                _ => continue,
            };
            if slot.is_empty() {
                *slot = value;
            }
        }
        address
    }
}

fn dn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:^|,)\s*([A-Za-z0-9.]+)\s*=\s*("(?:[^"\\]|\\.)*"|(?:[^,\\]|\\.)*)"#)
            .expect("distinguished name pattern is valid")
    })
}

fn subject_attributes(subject: &str) -> impl Iterator<Item = (String, String)> + '_ {
    dn_pattern()
        .captures_iter(subject)
        .map(|caps| (caps[1].to_string(), unescape_value(caps[2].trim())))
}

fn unescape_value(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip the wildcard label from a common name: `*.mozqa.com` → `mozqa.com`.
///
/// Non-wildcard names are returned unchanged.
#[must_use]
pub fn domain_from_common_name(common_name: &str) -> &str {
    common_name
        .strip_prefix("*.")
        .or_else(|| common_name.strip_prefix('*'))
        .unwrap_or(common_name)
}

/// Match the page-info domain field against a certificate common name.
///
/// Wildcard names match when the displayed value contains the de-wildcarded
/// domain; the panel may render an expanded host there. A wildcard with
/// nothing after it matches nothing. Other names must match exactly.
#[must_use]
pub fn matches_common_name(displayed: &str, common_name: &str) -> bool {
    if common_name.starts_with('*') {
        let domain = domain_from_common_name(common_name);
        !domain.is_empty() && displayed.contains(domain)
    } else {
        displayed == common_name
    }
}

/// How thoroughly the certificate authority proofed the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// Extended validation
    Extended,
    /// Organization validated
    Organization,
    /// Domain validated
    Domain,
    /// No valid certificate
    None,
}

impl ValidationLevel {
    /// The identity class the chrome shows for this level
    #[must_use]
    pub const fn identity_class(self) -> IdentityClass {
        match self {
            Self::Extended => IdentityClass::VerifiedIdentity,
            Self::Organization | Self::Domain => IdentityClass::VerifiedDomain,
            Self::None => IdentityClass::Unverified,
        }
    }
}

/// CSS class of the identity box and popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityClass {
    /// EV: organization identity verified
    #[serde(rename = "verifiedIdentity")]
    VerifiedIdentity,
    /// DV/OV: domain ownership verified
    #[serde(rename = "verifiedDomain")]
    VerifiedDomain,
    /// No verified identity
    #[serde(rename = "unknownIdentity")]
    Unverified,
}

impl IdentityClass {
    /// Class name as rendered in the chrome
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::VerifiedIdentity => "verifiedIdentity",
            Self::VerifiedDomain => "verifiedDomain",
            Self::Unverified => "unknownIdentity",
        }
    }

    /// Parse a rendered class name
    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "verifiedIdentity" => Some(Self::VerifiedIdentity),
            "verifiedDomain" => Some(Self::VerifiedDomain),
            "unknownIdentity" => Some(Self::Unverified),
            _ => None,
        }
    }

    /// Whether the chrome shows organization details (EV only)
    #[must_use]
    pub const fn shows_organization(self) -> bool {
        matches!(self, Self::VerifiedIdentity)
    }
}

impl fmt::Display for IdentityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}
