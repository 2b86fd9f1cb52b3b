//! MockBrowser - Scripted In-Memory Browser
//!
//! A [`RemoteDriver`] that models just enough of Firefox for every check to
//! run end to end without a live browser:
//!
//! - sites keyed by host, each with a certificate and validation level, or
//!   an untrusted issuer that produces the certificate error page
//! - a main window with tabs, plus page info windows opened from the popup
//! - an identity popup that opens asynchronously
//! - preferences that survive restarts, and session restore driven by
//!   `browser.startup.page`
//! - a localized string table
//!
//! Chrome is rendered from the selected tab's site on every read. Attribute
//! overrides and [`MockFaults`] inject the failures the checks must report.

use crate::browser::{RESTORE_PREVIOUS_SESSION, STARTUP_PAGE_PREF};
use crate::certificate::{Certificate, IdentityClass, ValidationLevel};
use crate::chrome::{
    ChromeSelectors, BROWSER_WINDOW_TYPE, CERTIFICATE_SCRIPT, CLOSE_TAB_SCRIPT, HIDE_POPUP_SCRIPT,
    PAGE_INFO_WINDOW_TYPE, SECURITY_PANEL, UNKNOWN_ISSUER_ERROR_CODE,
};
use crate::driver::{By, Context, ElementHandle, PrefValue, RemoteDriver, WindowHandle};
use crate::l10n;
use crate::result::{CertProbeError, CertProbeResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Default `identity.identified.state_and_country` template
pub const DEFAULT_STATE_AND_COUNTRY: &str = "%S, %S";

/// Default `identity.identified.verifier` template
pub const DEFAULT_VERIFIER: &str = "Verified by: %S";

/// Default `securityNoOwner` string
pub const DEFAULT_SECURITY_NO_OWNER: &str = "This website does not supply ownership information.";

const EV_ICON: &str = "url(\"chrome://browser/skin/identity-icons-https-ev.png\")";
const HTTPS_ICON: &str = "url(\"chrome://browser/skin/identity-icons-https.png\")";

// =============================================================================
// SITES AND FAULTS
// =============================================================================

/// A site the mock can load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSite {
    /// Certificate served; `None` for untrusted sites
    pub certificate: Option<Certificate>,
    /// Validation level the browser assigns
    pub level: ValidationLevel,
    /// Hostname named on the certificate error page, for untrusted sites
    pub error_domain: Option<String>,
}

impl MockSite {
    /// Extended validation
    #[must_use]
    pub const fn extended(certificate: Certificate) -> Self {
        Self::validated(certificate, ValidationLevel::Extended)
    }

    /// Organization validation
    #[must_use]
    pub const fn organization(certificate: Certificate) -> Self {
        Self::validated(certificate, ValidationLevel::Organization)
    }

    /// Domain validation
    #[must_use]
    pub const fn domain(certificate: Certificate) -> Self {
        Self::validated(certificate, ValidationLevel::Domain)
    }

    const fn validated(certificate: Certificate, level: ValidationLevel) -> Self {
        Self {
            certificate: Some(certificate),
            level,
            error_domain: None,
        }
    }

    /// Certificate chained to an unknown issuer, issued for `domain`
    #[must_use]
    pub fn untrusted(domain: impl Into<String>) -> Self {
        Self {
            certificate: None,
            level: ValidationLevel::None,
            error_domain: Some(domain.into()),
        }
    }
}

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockFaults {
    /// Clicking the identity box never opens the popup
    pub popup_never_opens: bool,
    /// "More Information" never opens page info
    pub page_info_never_opens: bool,
    /// Restart always starts with a single blank tab
    pub lose_session_on_restart: bool,
    /// Unknown issuers load like any other site
    pub trust_unknown_issuers: bool,
    /// Extended validation sites come back domain validated after a restart
    pub downgrade_on_restart: bool,
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PopupState {
    Closed,
    /// Remaining `state` reads before the panel reports open
    Opening(u32),
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    WindowRoot,
    Favicon,
    IdentityBox,
    OrganizationLabel,
    CountryLabel,
    Popup,
    PopupIcon,
    Host,
    Owner,
    OwnerLocation,
    Verifier,
    SecureLabel,
    InsecureLabel,
    MoreInfoButton,
    NewTabButton,
    Tab(usize),
    ViewGroup,
    PageInfoDomain,
    PageInfoOwner,
    PageInfoVerifier,
    DomainLink,
    GetMeOutButton,
    ExceptionButton,
    TechnicalContent,
}

/// What a tab or page info window is showing
enum Page<'a> {
    Blank,
    Secure { host: String, site: &'a MockSite },
    CertError { host: String, domain: &'a str },
}

impl Page<'_> {
    fn identity_class(&self) -> IdentityClass {
        match self {
            Self::Secure { site, .. } => site.level.identity_class(),
            _ => IdentityClass::Unverified,
        }
    }

    fn certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Secure { site, .. } => site.certificate.as_ref(),
            _ => None,
        }
    }

    fn is_extended(&self) -> bool {
        self.identity_class() == IdentityClass::VerifiedIdentity
    }
}

#[derive(Debug)]
struct State {
    selectors: ChromeSelectors,
    context: Context,
    sites: HashMap<String, MockSite>,
    tabs: Vec<Option<String>>,
    selected: usize,
    main_window: WindowHandle,
    page_info: Option<(WindowHandle, Option<String>)>,
    current_window: WindowHandle,
    windows_opened: u32,
    popup: PopupState,
    transition_polls: u32,
    restore_pending: u32,
    prefs: HashMap<String, PrefValue>,
    strings: HashMap<String, String>,
    overrides: HashMap<(String, String), String>,
    faults: MockFaults,
    restarts: u32,
    history: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        let main_window = WindowHandle("main-0".to_string());
        let strings = [
            (l10n::STATE_AND_COUNTRY_KEY, DEFAULT_STATE_AND_COUNTRY),
            (l10n::VERIFIER_KEY, DEFAULT_VERIFIER),
            (l10n::SECURITY_NO_OWNER_KEY, DEFAULT_SECURITY_NO_OWNER),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            selectors: ChromeSelectors::firefox(),
            context: Context::Content,
            sites: HashMap::new(),
            tabs: vec![None],
            selected: 0,
            current_window: main_window.clone(),
            main_window,
            page_info: None,
            windows_opened: 0,
            popup: PopupState::Closed,
            transition_polls: 0,
            restore_pending: 0,
            prefs: HashMap::new(),
            strings,
            overrides: HashMap::new(),
            faults: MockFaults::default(),
            restarts: 0,
            history: Vec::new(),
        }
    }
}

fn handle_for(element: Element, by: &By) -> ElementHandle {
    match (element, by) {
        (Element::Tab(index), _) => ElementHandle::new(format!("tab-{index}")),
        (_, By::Id(id)) => ElementHandle::new(id.clone()),
        (_, By::Css(css)) => ElementHandle::new(css.clone()),
    }
}

/// Host part of an https URL
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

impl State {
    fn record(&mut self, call: impl Into<String>) {
        self.history.push(call.into());
    }

    fn page_for(&self, url: Option<&str>) -> Page<'_> {
        let Some(url) = url else {
            return Page::Blank;
        };
        let host = host_of(url);
        match self.sites.get(host) {
            None => Page::Blank,
            Some(site) => match &site.error_domain {
                Some(domain) if !self.faults.trust_unknown_issuers => Page::CertError {
                    host: host.to_string(),
                    domain,
                },
                _ => Page::Secure {
                    host: host.to_string(),
                    site,
                },
            },
        }
    }

    fn selected_page(&self) -> Page<'_> {
        self.page_for(self.tabs.get(self.selected).and_then(Option::as_deref))
    }

    fn in_page_info(&self) -> bool {
        matches!(&self.page_info, Some((handle, _)) if *handle == self.current_window)
    }

    fn window_exists(&self, handle: &WindowHandle) -> bool {
        *handle == self.main_window || matches!(&self.page_info, Some((h, _)) if h == handle)
    }

    fn visible_tabs(&self) -> usize {
        if self.restore_pending > 0 {
            self.tabs.len().min(1)
        } else {
            self.tabs.len()
        }
    }

    fn string(&self, key: &str) -> &str {
        self.strings.get(key).map_or("", String::as_str)
    }

    // -------------------------------------------------------------------------
    // element resolution
    // -------------------------------------------------------------------------

    fn resolve(&self, by: &By) -> Option<Element> {
        match by {
            By::Css(css) => (self.context == Context::Chrome
                && !self.in_page_info()
                && *css == self.selectors.tab_bar.tabs
                && self.visible_tabs() > 0)
                .then_some(Element::Tab(0)),
            By::Id(id) => self.resolve_id(id),
        }
    }

    fn resolve_id(&self, id: &str) -> Option<Element> {
        let s = &self.selectors;
        match self.context {
            Context::Content => {
                if !matches!(self.selected_page(), Page::CertError { .. }) {
                    return None;
                }
                let e = &s.cert_error;
                [
                    (&e.domain_link, Element::DomainLink),
                    (&e.get_me_out_button, Element::GetMeOutButton),
                    (&e.exception_button, Element::ExceptionButton),
                    (&e.technical_content, Element::TechnicalContent),
                ]
                .into_iter()
                .find_map(|(sel, el)| (sel == id).then_some(el))
            }
            Context::Chrome if id == s.window_root => Some(Element::WindowRoot),
            Context::Chrome if self.in_page_info() => {
                let p = &s.page_info;
                [
                    (&p.view_group, Element::ViewGroup),
                    (&p.domain, Element::PageInfoDomain),
                    (&p.owner, Element::PageInfoOwner),
                    (&p.verifier, Element::PageInfoVerifier),
                ]
                .into_iter()
                .find_map(|(sel, el)| (sel == id).then_some(el))
            }
            Context::Chrome => {
                let p = &s.identity_popup;
                [
                    (&s.location_bar.favicon, Element::Favicon),
                    (&s.tab_bar.new_tab_button, Element::NewTabButton),
                    (&p.identity_box, Element::IdentityBox),
                    (&p.organization_label, Element::OrganizationLabel),
                    (&p.country_label, Element::CountryLabel),
                    (&p.popup, Element::Popup),
                    (&p.icon, Element::PopupIcon),
                    (&p.host, Element::Host),
                    (&p.owner, Element::Owner),
                    (&p.owner_location, Element::OwnerLocation),
                    (&p.verifier, Element::Verifier),
                    (&p.secure_connection_label, Element::SecureLabel),
                    (&p.insecure_connection_label, Element::InsecureLabel),
                    (&p.more_info_button, Element::MoreInfoButton),
                ]
                .into_iter()
                .find_map(|(sel, el)| (sel == id).then_some(el))
            }
        }
    }

    fn resolve_handle(&self, handle: &ElementHandle) -> CertProbeResult<Element> {
        let tab = handle
            .id
            .strip_prefix("tab-")
            .and_then(|n| n.parse::<usize>().ok());
        let element = match tab {
            Some(index) => (self.context == Context::Chrome
                && !self.in_page_info()
                && index < self.visible_tabs())
            .then_some(Element::Tab(index)),
            None => self.resolve_id(&handle.id),
        };
        element.ok_or_else(|| CertProbeError::element_not_found(format!("stale element {}", handle.id)))
    }


    // -------------------------------------------------------------------------
    // rendering
    // -------------------------------------------------------------------------

    fn attribute(&mut self, element: Element, name: &str) -> Option<String> {
        if element == Element::Popup && name == "state" {
            return Some(self.popup_state().to_string());
        }

        let page = self.selected_page();
        let class = page.identity_class();
        let cert = page.certificate().cloned().unwrap_or_default();
        let address = cert.address();
        let ev = page.is_extended();
        let ev_text = |text: &str| if ev { text.to_string() } else { String::new() };

        match (element, name) {
            (Element::WindowRoot, "windowtype") => Some(if self.in_page_info() {
                PAGE_INFO_WINDOW_TYPE.to_string()
            } else {
                BROWSER_WINDOW_TYPE.to_string()
            }),
            (Element::Favicon, "hidden") => {
                matches!(page, Page::Blank).then(|| "true".to_string())
            }
            (Element::IdentityBox | Element::Popup, "className") => {
                Some(class.class_name().to_string())
            }
            (Element::OrganizationLabel, "value") => Some(ev_text(&cert.organization)),
            (Element::CountryLabel, "value") => Some(ev_text(&l10n::country_label(&address))),
            (Element::Host, "value") => Some(match &page {
                _ if ev => cert.organization.clone(),
                Page::Secure { host, .. } | Page::CertError { host, .. } => host.clone(),
                Page::Blank => String::new(),
            }),
            (Element::Owner, "textContent") => Some(ev_text(&cert.organization)),
            (Element::OwnerLocation, "textContent") => Some(ev_text(&l10n::owner_location(
                self.string(l10n::STATE_AND_COUNTRY_KEY),
                &address,
            ))),
            (Element::Verifier, "textContent") => Some(if page.certificate().is_some() {
                l10n::verifier(self.string(l10n::VERIFIER_KEY), &cert.issuer_organization)
            } else {
                String::new()
            }),
            (Element::Tab(index), "selected") => {
                (index == self.selected).then(|| "true".to_string())
            }
            (Element::ViewGroup, "value") => Some(SECURITY_PANEL.to_string()),
            (Element::PageInfoDomain | Element::PageInfoOwner | Element::PageInfoVerifier, "value") => {
                Some(self.page_info_value(element))
            }
            (Element::DomainLink, "textContent") => match &page {
                Page::CertError { domain, .. } => Some((*domain).to_string()),
                _ => None,
            },
            (Element::TechnicalContent, "textContent") => match &page {
                Page::CertError { host, .. } => Some(format!(
                    "{host} uses an invalid security certificate.\n\n\
                     The certificate is not trusted because the issuer certificate is unknown.\n\n\
                     (Error code: {UNKNOWN_ISSUER_ERROR_CODE})"
                )),
                _ => None,
            },
            _ => None,
        }
    }

    fn page_info_value(&self, element: Element) -> String {
        let url = self.page_info.as_ref().and_then(|(_, url)| url.as_deref());
        let page = self.page_for(url);
        let Some(cert) = page.certificate() else {
            return String::new();
        };
        match element {
            Element::PageInfoDomain => match &page {
                Page::Secure { host, .. } if cert.is_wildcard() => host.clone(),
                _ => cert.common_name.clone(),
            },
            Element::PageInfoOwner if page.is_extended() => cert.organization.clone(),
            Element::PageInfoOwner => self.string(l10n::SECURITY_NO_OWNER_KEY).to_string(),
            _ => cert.issuer_organization.clone(),
        }
    }

    fn popup_state(&mut self) -> &'static str {
        match self.popup {
            PopupState::Closed => "closed",
            PopupState::Open => "open",
            PopupState::Opening(0) => {
                self.popup = PopupState::Open;
                "open"
            }
            PopupState::Opening(n) => {
                self.popup = PopupState::Opening(n - 1);
                "showing"
            }
        }
    }

    fn css(&self, element: Element, property: &str) -> String {
        let page = self.selected_page();
        let secure = matches!(page, Page::Secure { .. }) && page.certificate().is_some();
        let shown = |visible: bool| (if visible { "block" } else { "none" }).to_string();
        match (element, property) {
            (Element::PopupIcon, "list-style-image") if page.is_extended() => EV_ICON.to_string(),
            (Element::PopupIcon, "list-style-image") if secure => HTTPS_ICON.to_string(),
            (Element::PopupIcon, "list-style-image") => "none".to_string(),
            (Element::SecureLabel, "display") => shown(secure),
            (Element::InsecureLabel, "display") => shown(!secure),
            (_, "display") => shown(true),
            _ => String::new(),
        }
    }

    // -------------------------------------------------------------------------
    // actions
    // -------------------------------------------------------------------------

    fn click(&mut self, element: Element) {
        match element {
            Element::IdentityBox => {
                self.popup = match self.popup {
                    PopupState::Open => PopupState::Closed,
                    _ if self.faults.popup_never_opens => self.popup,
                    _ => PopupState::Opening(self.transition_polls),
                };
            }
            Element::MoreInfoButton => {
                if self.popup == PopupState::Open && !self.faults.page_info_never_opens {
                    self.windows_opened += 1;
                    let handle = WindowHandle(format!("page-info-{}", self.windows_opened));
                    let url = self.tabs.get(self.selected).cloned().flatten();
                    self.page_info = Some((handle, url));
                }
            }
            Element::NewTabButton => {
                self.tabs.push(None);
                self.selected = self.tabs.len() - 1;
                self.popup = PopupState::Closed;
            }
            Element::Tab(index) => {
                self.selected = index;
                self.popup = PopupState::Closed;
            }
            _ => {}
        }
    }

    fn close_tab(&mut self, index: usize) -> CertProbeResult<()> {
        if index >= self.tabs.len() || self.tabs.len() == 1 {
            return Err(CertProbeError::Script {
                message: format!("cannot remove tab {index}"),
            });
        }
        self.tabs.remove(index);
        if self.selected > index || self.selected >= self.tabs.len() {
            self.selected -= 1;
        }
        Ok(())
    }

    fn restart(&mut self) {
        self.restarts += 1;
        let restore = !self.faults.lose_session_on_restart
            && self.prefs.get(STARTUP_PAGE_PREF) == Some(&PrefValue::Int(RESTORE_PREVIOUS_SESSION));
        if restore {
            self.selected = self.selected.min(self.tabs.len() - 1);
            if self.tabs.len() > 1 {
                self.restore_pending = self.transition_polls;
            }
        } else {
            self.tabs = vec![None];
            self.selected = 0;
        }
        if self.faults.downgrade_on_restart {
            for site in self.sites.values_mut() {
                if site.level == ValidationLevel::Extended {
                    site.level = ValidationLevel::Domain;
                }
            }
        }
        self.main_window = WindowHandle(format!("main-{}", self.restarts));
        self.current_window = self.main_window.clone();
        self.page_info = None;
        self.popup = PopupState::Closed;
        self.context = Context::Content;
    }
}

// =============================================================================
// MOCK BROWSER
// =============================================================================

/// Scripted in-memory browser
///
/// # Example
///
/// ```ignore
/// let mock = MockBrowser::mozqa().with_transition_polls(2);
/// let mut browser = Browser::attach(mock, ChromeSelectors::firefox(), WaitOptions::new()).await?;
/// ```
#[derive(Debug, Default)]
pub struct MockBrowser {
    state: Mutex<State>,
}

impl MockBrowser {
    /// Empty browser with one blank tab
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Browser serving the mozqa.com fixture sites
    #[must_use]
    pub fn mozqa() -> Self {
        let issuer = "DigiCert Inc";
        Self::new()
            .with_site(
                "ssl-dv.mozqa.com",
                MockSite::domain(
                    Certificate::new("", issuer, "ssl-dv.mozqa.com")
                        .with_subject_name("CN=ssl-dv.mozqa.com"),
                ),
            )
            .with_site(
                "ssl-ev.mozqa.com",
                MockSite::extended(
                    Certificate::new("Mozilla Corporation", issuer, "ssl-ev.mozqa.com")
                        .with_subject_name(
                            "CN=ssl-ev.mozqa.com,O=Mozilla Corporation,L=Mountain View,ST=CA,C=US",
                        ),
                ),
            )
            .with_site(
                "ssl-ov.mozqa.com",
                MockSite::organization(
                    Certificate::new("Mozilla Corporation", issuer, "*.mozqa.com")
                        .with_subject_name(
                            "CN=*.mozqa.com,O=Mozilla Corporation,L=Mountain View,ST=California,C=US",
                        ),
                ),
            )
            .with_site(
                "ssl-unknownissuer.mozqa.com",
                MockSite::untrusted("ssl-selfsigned-unknownissuer.mozqa.com"),
            )
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn update(mut self, f: impl FnOnce(&mut State)) -> Self {
        f(self.state.get_mut().unwrap_or_else(PoisonError::into_inner));
        self
    }

    /// Serve `site` at `host`
    #[must_use]
    pub fn with_site(self, host: impl Into<String>, site: MockSite) -> Self {
        let host = host.into();
        self.update(|s| {
            s.sites.insert(host, site);
        })
    }

    /// Number of reads before asynchronous transitions (popup opening,
    /// tabs reappearing after restart) complete
    #[must_use]
    pub fn with_transition_polls(self, polls: u32) -> Self {
        self.update(|s| s.transition_polls = polls)
    }

    /// Inject misbehaviour
    #[must_use]
    pub fn with_faults(self, faults: MockFaults) -> Self {
        self.update(|s| s.faults = faults)
    }

    /// Override a localized string
    #[must_use]
    pub fn with_string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.update(|s| {
            s.strings.insert(key, value);
        })
    }

    /// Force an element attribute or CSS property to a fixed value
    #[must_use]
    pub fn with_override(
        self,
        element_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = (element_id.into(), name.into());
        let value = value.into();
        self.update(|s| {
            s.overrides.insert(key, value);
        })
    }

    /// Use non-default chrome locators
    #[must_use]
    pub fn with_selectors(self, selectors: ChromeSelectors) -> Self {
        self.update(|s| s.selectors = selectors)
    }

    /// Current command context
    #[must_use]
    pub fn context(&self) -> Context {
        self.with_state(|s| s.context)
    }

    /// URLs of all tabs; `None` for blank tabs
    #[must_use]
    pub fn tab_urls(&self) -> Vec<Option<String>> {
        self.with_state(|s| s.tabs.clone())
    }

    /// Whether the identity popup is open
    #[must_use]
    pub fn popup_open(&self) -> bool {
        self.with_state(|s| s.popup == PopupState::Open)
    }

    /// Number of open top-level windows
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.with_state(|s| 1 + usize::from(s.page_info.is_some()))
    }

    /// Current value of a preference
    #[must_use]
    pub fn pref(&self, name: &str) -> Option<PrefValue> {
        self.with_state(|s| s.prefs.get(name).cloned())
    }

    /// Number of restarts so far
    #[must_use]
    pub fn restarts(&self) -> u32 {
        self.with_state(|s| s.restarts)
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.with_state(|s| s.history.clone())
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.with_state(|s| s.history.iter().any(|c| c.starts_with(method)))
    }
}

#[async_trait]
impl RemoteDriver for MockBrowser {
    async fn set_context(&mut self, context: Context) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("set_context:{context:?}"));
            s.context = context;
            Ok(())
        })
    }

    async fn navigate(&mut self, url: &str) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("navigate:{url}"));
            if s.context != Context::Content {
                return Err(CertProbeError::driver("navigate requires the content context"));
            }
            if !s.sites.contains_key(host_of(url)) {
                return Err(CertProbeError::Navigation {
                    url: url.to_string(),
                    message: "Reached error page: about:neterror?e=dnsNotFound".to_string(),
                });
            }
            let selected = s.selected;
            s.tabs[selected] = Some(url.to_string());
            s.popup = PopupState::Closed;
            match s.selected_page() {
                Page::CertError { .. } => Err(CertProbeError::Navigation {
                    url: url.to_string(),
                    message: "Reached error page: about:certerror?e=nssBadCert".to_string(),
                }),
                _ => Ok(()),
            }
        })
    }

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> CertProbeResult<serde_json::Value> {
        self.with_state(|s| {
            if s.context != Context::Chrome {
                return Err(CertProbeError::Script {
                    message: "ReferenceError: gBrowser is not defined".to_string(),
                });
            }
            if script == CERTIFICATE_SCRIPT {
                s.record("execute_script:certificate");
                return match s.selected_page().certificate() {
                    Some(cert) => Ok(serde_json::to_value(cert)?),
                    None => Ok(serde_json::Value::Null),
                };
            }
            let handle: ElementHandle = match args.into_iter().next() {
                Some(arg) => serde_json::from_value(arg)?,
                None => {
                    return Err(CertProbeError::Script {
                        message: "missing element argument".to_string(),
                    })
                }
            };
            if script == HIDE_POPUP_SCRIPT {
                s.record("execute_script:hide_popup");
                s.resolve_handle(&handle)?;
                s.popup = PopupState::Closed;
                Ok(serde_json::Value::Null)
            } else if script == CLOSE_TAB_SCRIPT {
                s.record(format!("execute_script:close_tab:{}", handle.id));
                match s.resolve_handle(&handle)? {
                    Element::Tab(index) => s.close_tab(index)?,
                    _ => {
                        return Err(CertProbeError::Script {
                            message: format!("{} is not a tab", handle.id),
                        })
                    }
                }
                Ok(serde_json::Value::Null)
            } else {
                Err(CertProbeError::Script {
                    message: "unsupported script".to_string(),
                })
            }
        })
    }

    async fn find_element(&self, by: &By) -> CertProbeResult<ElementHandle> {
        self.with_state(|s| {
            let element = s.resolve(by).ok_or_else(|| CertProbeError::element_not_found(by))?;
            Ok(handle_for(element, by))
        })
    }

    async fn find_elements(&self, by: &By) -> CertProbeResult<Vec<ElementHandle>> {
        self.with_state(|s| {
            if let By::Css(css) = by {
                if s.context == Context::Chrome && !s.in_page_info() && *css == s.selectors.tab_bar.tabs {
                    s.restore_pending = s.restore_pending.saturating_sub(1);
                    return Ok((0..s.visible_tabs())
                        .map(|i| ElementHandle::new(format!("tab-{i}")))
                        .collect());
                }
            }
            Ok(s.resolve(by)
                .map(|element| handle_for(element, by))
                .into_iter()
                .collect())
        })
    }

    async fn get_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> CertProbeResult<Option<String>> {
        self.with_state(|s| {
            let resolved = s.resolve_handle(element)?;
            let key = (element.id.clone(), name.to_string());
            if let Some(value) = s.overrides.get(&key) {
                return Ok(Some(value.clone()));
            }
            Ok(s.attribute(resolved, name))
        })
    }

    async fn css_property(&self, element: &ElementHandle, name: &str) -> CertProbeResult<String> {
        self.with_state(|s| {
            let resolved = s.resolve_handle(element)?;
            let key = (element.id.clone(), name.to_string());
            if let Some(value) = s.overrides.get(&key) {
                return Ok(value.clone());
            }
            Ok(s.css(resolved, name))
        })
    }

    async fn click(&self, element: &ElementHandle) -> CertProbeResult<()> {
        self.with_state(|s| {
            let resolved = s.resolve_handle(element)?;
            s.record(format!("click:{}", element.id));
            s.click(resolved);
            Ok(())
        })
    }

    async fn window_handles(&self) -> CertProbeResult<Vec<WindowHandle>> {
        self.with_state(|s| {
            let mut handles = vec![s.main_window.clone()];
            handles.extend(s.page_info.as_ref().map(|(handle, _)| handle.clone()));
            Ok(handles)
        })
    }

    async fn current_window(&self) -> CertProbeResult<WindowHandle> {
        self.with_state(|s| Ok(s.current_window.clone()))
    }

    async fn switch_to_window(&mut self, handle: &WindowHandle) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("switch_to_window:{handle}"));
            if !s.window_exists(handle) {
                return Err(CertProbeError::driver(format!("no such window: {handle}")));
            }
            s.current_window = handle.clone();
            Ok(())
        })
    }

    async fn close_window(&mut self) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("close_window:{}", s.current_window));
            if s.current_window == s.main_window {
                return Err(CertProbeError::driver("refusing to close the main window"));
            }
            if s.in_page_info() {
                s.page_info = None;
                Ok(())
            } else {
                Err(CertProbeError::element_not_found(format!(
                    "window {}",
                    s.current_window
                )))
            }
        })
    }

    async fn set_pref(&mut self, name: &str, value: PrefValue) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("set_pref:{name}"));
            s.prefs.insert(name.to_string(), value);
            Ok(())
        })
    }

    async fn reset_pref(&mut self, name: &str) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record(format!("reset_pref:{name}"));
            s.prefs.remove(name);
            Ok(())
        })
    }

    async fn localized_string(&self, bundle: &str, key: &str) -> CertProbeResult<String> {
        self.with_state(|s| {
            s.strings.get(key).cloned().ok_or_else(|| {
                CertProbeError::driver(format!("no string {key} in {bundle}"))
            })
        })
    }

    async fn restart(&mut self) -> CertProbeResult<()> {
        self.with_state(|s| {
            s.record("restart");
            s.restart();
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn chrome(mock: &mut MockBrowser) {
        mock.set_context(Context::Chrome).await.unwrap();
    }

    async fn load(mock: &mut MockBrowser, url: &str) -> CertProbeResult<()> {
        mock.set_context(Context::Content).await.unwrap();
        let result = mock.navigate(url).await;
        chrome(mock).await;
        result
    }

    async fn read(mock: &MockBrowser, id: &str, name: &str) -> Option<String> {
        let element = mock.find_element(&By::id(id)).await.unwrap();
        mock.get_attribute(&element, name).await.unwrap()
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_host_of() {
            assert_eq!(host_of("https://ssl-ev.mozqa.com/"), "ssl-ev.mozqa.com");
            assert_eq!(host_of("https://ssl-dv.mozqa.com"), "ssl-dv.mozqa.com");
            assert_eq!(host_of("https://a.example/path?q#f"), "a.example");
        }

        #[tokio::test]
        async fn test_navigate_requires_content_context() {
            let mut mock = MockBrowser::mozqa();
            chrome(&mut mock).await;
            let err = mock.navigate("https://ssl-ev.mozqa.com/").await.unwrap_err();
            assert!(matches!(err, CertProbeError::Driver { .. }));
        }

        #[tokio::test]
        async fn test_unknown_host_fails() {
            let mut mock = MockBrowser::mozqa();
            let err = load(&mut mock, "https://nowhere.example").await.unwrap_err();
            assert!(matches!(err, CertProbeError::Navigation { .. }));
        }

        #[tokio::test]
        async fn test_untrusted_site_shows_error_page() {
            let mut mock = MockBrowser::mozqa();
            mock.set_context(Context::Content).await.unwrap();
            let err = mock.navigate("https://ssl-unknownissuer.mozqa.com").await.unwrap_err();
            assert!(matches!(err, CertProbeError::Navigation { .. }));
            assert_eq!(
                read(&mock, "cert_domain_link", "textContent").await.as_deref(),
                Some("ssl-selfsigned-unknownissuer.mozqa.com")
            );
        }
    }

    mod chrome_tests {
        use super::*;

        #[tokio::test]
        async fn test_blank_tab_hides_favicon() {
            let mut mock = MockBrowser::mozqa();
            chrome(&mut mock).await;
            assert_eq!(read(&mock, "page-proxy-favicon", "hidden").await.as_deref(), Some("true"));
        }

        #[tokio::test]
        async fn test_ev_chrome() {
            let mut mock = MockBrowser::mozqa();
            load(&mut mock, "https://ssl-ev.mozqa.com/").await.unwrap();
            assert_eq!(read(&mock, "page-proxy-favicon", "hidden").await, None);
            assert_eq!(
                read(&mock, "identity-box", "className").await.as_deref(),
                Some("verifiedIdentity")
            );
            assert_eq!(
                read(&mock, "identity-icon-country-label", "value").await.as_deref(),
                Some("(US)")
            );
            assert_eq!(
                read(&mock, "identity-popup-content-supplemental", "textContent")
                    .await
                    .as_deref(),
                Some("Mountain View\nCA, US")
            );
        }

        #[tokio::test]
        async fn test_popup_opens_after_transition_polls() {
            let mut mock = MockBrowser::mozqa().with_transition_polls(2);
            load(&mut mock, "https://ssl-dv.mozqa.com").await.unwrap();
            let identity_box = mock.find_element(&By::id("identity-box")).await.unwrap();
            mock.click(&identity_box).await.unwrap();

            let states = [
                read(&mock, "identity-popup", "state").await,
                read(&mock, "identity-popup", "state").await,
                read(&mock, "identity-popup", "state").await,
            ];
            assert_eq!(states[0].as_deref(), Some("showing"));
            assert_eq!(states[2].as_deref(), Some("open"));
            assert!(mock.popup_open());
        }

        #[tokio::test]
        async fn test_override_wins() {
            let mut mock = MockBrowser::mozqa().with_override("identity-box", "className", "bogus");
            load(&mut mock, "https://ssl-ev.mozqa.com/").await.unwrap();
            assert_eq!(read(&mock, "identity-box", "className").await.as_deref(), Some("bogus"));
        }

        #[tokio::test]
        async fn test_certificate_script_needs_chrome() {
            let mut mock = MockBrowser::mozqa();
            load(&mut mock, "https://ssl-ev.mozqa.com/").await.unwrap();
            let value = mock.execute_script(CERTIFICATE_SCRIPT, Vec::new()).await.unwrap();
            assert_eq!(value["organization"], "Mozilla Corporation");

            mock.set_context(Context::Content).await.unwrap();
            assert!(mock.execute_script(CERTIFICATE_SCRIPT, Vec::new()).await.is_err());
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_restart_without_pref_drops_tabs() {
            let mut mock = MockBrowser::mozqa();
            chrome(&mut mock).await;
            let button = mock.find_element(&By::id("new-tab-button")).await.unwrap();
            mock.click(&button).await.unwrap();
            assert_eq!(mock.tab_urls().len(), 2);

            mock.restart().await.unwrap();
            assert_eq!(mock.tab_urls(), vec![None]);
            assert_eq!(mock.context(), Context::Content);
        }

        #[tokio::test]
        async fn test_restart_with_pref_restores_tabs() {
            let mut mock = MockBrowser::mozqa();
            mock.set_pref(STARTUP_PAGE_PREF, PrefValue::Int(3)).await.unwrap();
            load(&mut mock, "https://ssl-dv.mozqa.com").await.unwrap();
            let button = mock.find_element(&By::id("new-tab-button")).await.unwrap();
            mock.click(&button).await.unwrap();

            mock.restart().await.unwrap();
            assert_eq!(
                mock.tab_urls(),
                vec![Some("https://ssl-dv.mozqa.com".to_string()), None]
            );
            assert_eq!(mock.current_window().await.unwrap(), WindowHandle("main-1".to_string()));
        }

        #[tokio::test]
        async fn test_downgrade_on_restart_drops_extended_validation() {
            let mut mock = MockBrowser::mozqa().with_faults(MockFaults {
                downgrade_on_restart: true,
                ..MockFaults::default()
            });
            mock.set_pref(STARTUP_PAGE_PREF, PrefValue::Int(3)).await.unwrap();
            load(&mut mock, "https://ssl-ev.mozqa.com/").await.unwrap();
            assert_eq!(
                read(&mock, "identity-box", "className").await.as_deref(),
                Some("verifiedIdentity")
            );

            mock.restart().await.unwrap();
            chrome(&mut mock).await;
            assert_eq!(
                read(&mock, "identity-box", "className").await.as_deref(),
                Some("verifiedDomain")
            );
            assert_eq!(
                read(&mock, "identity-icon-label", "value").await.as_deref(),
                Some("")
            );
        }
    }
}
