//! RemoteDriver - Abstract Remote Browser Control
//!
//! Everything Certprobe knows about the browser goes through this trait:
//! navigation, element lookup, attribute and CSS reads, clicks, chrome
//! scripts, window handles, preferences, localized strings and restarts.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Checks (EV status, session restore, unknown issuer)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Page objects (identity popup, page info, tab bar, ...)      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  RemoteDriver                                                │
//! │    ├── MockBrowser   (scripted, in-memory)                   │
//! │    └── your client   (Marionette, WebDriver BiDi, ...)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::result::CertProbeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum By {
    /// Element id
    Id(String),
    /// CSS selector
    Css(String),
}

impl By {
    /// Create an id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Css(css) => write!(f, "{css}"),
        }
    }
}

/// Reference to a remote DOM element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Remote reference id
    #[serde(rename = "element")]
    pub id: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Serialize as a script argument
    pub fn to_arg(&self) -> CertProbeResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Top-level window handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which document commands address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Context {
    /// Browser chrome (toolbars, popups, dialogs)
    #[default]
    Chrome,
    /// The web page in the selected tab
    Content,
}

/// Preference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    /// Boolean pref
    Bool(bool),
    /// Integer pref
    Int(i64),
    /// String pref
    String(String),
}

/// Abstract driver for remote browser control.
///
/// Read-only operations take `&self` so they can be polled from
/// [`crate::Wait::until`]; operations that move the browser to a new state
/// take `&mut self`.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    /// Switch the document commands address
    async fn set_context(&mut self, context: Context) -> CertProbeResult<()>;

    /// Load `url` in the selected tab
    async fn navigate(&mut self, url: &str) -> CertProbeResult<()>;

    /// Execute script in the current context
    async fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> CertProbeResult<serde_json::Value>;

    /// Find the first element matching `by`
    async fn find_element(&self, by: &By) -> CertProbeResult<ElementHandle>;

    /// Find all elements matching `by`
    async fn find_elements(&self, by: &By) -> CertProbeResult<Vec<ElementHandle>>;

    /// Read an attribute or DOM property
    async fn get_attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> CertProbeResult<Option<String>>;

    /// Read a computed CSS property
    async fn css_property(&self, element: &ElementHandle, name: &str) -> CertProbeResult<String>;

    /// Click an element
    async fn click(&self, element: &ElementHandle) -> CertProbeResult<()>;

    /// Handles of all open top-level windows
    async fn window_handles(&self) -> CertProbeResult<Vec<WindowHandle>>;

    /// Handle of the window commands currently address
    async fn current_window(&self) -> CertProbeResult<WindowHandle>;

    /// Address commands to another window
    async fn switch_to_window(&mut self, handle: &WindowHandle) -> CertProbeResult<()>;

    /// Close the current window
    async fn close_window(&mut self) -> CertProbeResult<()>;

    /// Set a user preference
    async fn set_pref(&mut self, name: &str, value: PrefValue) -> CertProbeResult<()>;

    /// Restore a preference to its default
    async fn reset_pref(&mut self, name: &str) -> CertProbeResult<()>;

    /// Look up a localized string from a properties bundle
    async fn localized_string(&self, bundle: &str, key: &str) -> CertProbeResult<String>;

    /// Quit and relaunch the browser with the same profile
    async fn restart(&mut self) -> CertProbeResult<()>;
}
