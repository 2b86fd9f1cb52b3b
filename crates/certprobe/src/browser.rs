//! Browser session: a [`RemoteDriver`] plus the locators and wait policy
//! every check shares.

use crate::certificate::Certificate;
use crate::chrome::{
    CertErrorPage, ChromeSelectors, ChromeSurface, IdentityPopup, LocationBar, PageInfoWindow,
    TabBar, BROWSER_WINDOW_TYPE, PAGE_INFO_WINDOW_TYPE,
};
use crate::driver::{By, Context, PrefValue, RemoteDriver, WindowHandle};
use crate::result::{CertProbeError, CertProbeResult, Teardown};
use crate::wait::{Wait, WaitOptions, WaitResult};
use tracing::{debug, info, warn};

/// Startup behaviour pref; `3` restores the previous session
pub const STARTUP_PAGE_PREF: &str = "browser.startup.page";

/// `browser.startup.page` value that restores the previous session
pub const RESTORE_PREVIOUS_SESSION: i64 = 3;

/// Browser session
///
/// # Example
///
/// ```ignore
/// let mut browser = Browser::attach(driver, ChromeSelectors::firefox(), WaitOptions::new()).await?;
/// browser.navigate_content("https://ssl-ev.mozqa.com/").await?;
/// let cert = browser.selected_certificate().await?;
/// ```
#[derive(Debug)]
pub struct Browser<D: RemoteDriver> {
    driver: D,
    selectors: ChromeSelectors,
    wait: Wait,
    main_window: WindowHandle,
}

impl<D: RemoteDriver> Browser<D> {
    /// Attach to a running browser; the current window becomes the main one
    pub async fn attach(
        mut driver: D,
        selectors: ChromeSelectors,
        wait: WaitOptions,
    ) -> CertProbeResult<Self> {
        driver.set_context(Context::Chrome).await?;
        let main_window = driver.current_window().await?;
        debug!(%main_window, "attached to browser");
        Ok(Self {
            driver,
            selectors,
            wait: Wait::new(wait),
            main_window,
        })
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Underlying driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Give the driver back
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Shared poller
    #[must_use]
    pub const fn wait(&self) -> &Wait {
        &self.wait
    }

    /// Locators in effect
    #[must_use]
    pub const fn selectors(&self) -> &ChromeSelectors {
        &self.selectors
    }

    /// Handle of the main browser window
    #[must_use]
    pub const fn main_window(&self) -> &WindowHandle {
        &self.main_window
    }

    /// Address bar page object
    #[must_use]
    pub fn location_bar(&self) -> LocationBar {
        LocationBar::new(&self.selectors.location_bar)
    }

    /// Identity box and popup page object
    #[must_use]
    pub fn identity_popup(&self) -> IdentityPopup {
        IdentityPopup::new(&self.selectors.identity_popup)
    }

    /// Tab strip page object
    #[must_use]
    pub fn tab_bar(&self) -> TabBar {
        TabBar::new(&self.selectors.tab_bar)
    }

    /// Certificate error page object (content context)
    #[must_use]
    pub fn cert_error_page(&self) -> CertErrorPage {
        CertErrorPage::new(&self.selectors.cert_error)
    }

    /// Switch command context
    pub async fn set_context(&mut self, context: Context) -> CertProbeResult<()> {
        self.driver.set_context(context).await
    }

    /// Navigate the selected tab from the content context, then return to
    /// chrome whether or not navigation succeeded.
    pub async fn navigate_content(&mut self, url: &str) -> CertProbeResult<()> {
        info!(url, "navigating");
        self.driver.set_context(Context::Content).await?;
        let navigated = self.driver.navigate(url).await;
        self.driver.set_context(Context::Chrome).await?;
        navigated
    }

    /// Wait until a surface's root element can be found
    pub async fn wait_for_surface<S: ChromeSurface>(&self, surface: &S) -> CertProbeResult<WaitResult> {
        let driver = &self.driver;
        let root = surface.root();
        self.wait
            .until(surface.surface_name(), || is_present(driver, root))
            .await
    }

    /// Look up a localized string
    pub async fn localized(&self, bundle: &str, key: &str) -> CertProbeResult<String> {
        self.driver.localized_string(bundle, key).await
    }

    /// Server certificate of the selected tab
    pub async fn selected_certificate(&self) -> CertProbeResult<Certificate> {
        self.tab_bar().selected_certificate(&self.driver).await
    }

    /// Set a preference
    pub async fn set_pref(&mut self, name: &str, value: PrefValue) -> CertProbeResult<()> {
        debug!(name, ?value, "setting pref");
        self.driver.set_pref(name, value).await
    }

    /// Restore a preference to its default
    pub async fn reset_pref(&mut self, name: &str) -> CertProbeResult<()> {
        self.driver.reset_pref(name).await
    }

    /// Open page info through the identity popup's "More Information" button
    /// and switch to it once its document identifies as the page info dialog.
    pub async fn open_page_info_window(&mut self) -> CertProbeResult<PageInfoWindow> {
        let before = self.driver.window_handles().await?;
        self.identity_popup().click_more_info(&self.driver).await?;

        let driver = &self.driver;
        let known = before.as_slice();
        self.wait
            .until("page info window to open", || has_new_window(driver, known))
            .await?;

        let handle = self
            .driver
            .window_handles()
            .await?
            .into_iter()
            .find(|h| !before.contains(h))
            .ok_or_else(|| CertProbeError::InvalidState {
                message: "page info window closed before it could be focused".to_string(),
            })?;
        self.driver.switch_to_window(&handle).await?;
        self.wait_for_window_type(PAGE_INFO_WINDOW_TYPE).await?;
        info!(%handle, "page info window open");

        let window = PageInfoWindow::new(handle, &self.selectors.page_info);
        self.wait_for_surface(&window).await?;
        Ok(window)
    }

    async fn wait_for_window_type(&self, window_type: &str) -> CertProbeResult<WaitResult> {
        let driver = &self.driver;
        let root = self.selectors.window_root();
        let root = &root;
        self.wait
            .until(&format!("{window_type} window"), || {
                is_window_type(driver, root, window_type)
            })
            .await
    }

    /// Return command focus to the main browser window
    pub async fn focus(&mut self) -> CertProbeResult<()> {
        self.driver.switch_to_window(&self.main_window).await
    }

    /// Close every top-level window except the main one, then focus it.
    ///
    /// Every window is attempted even when an earlier one fails; the first
    /// failure is returned. Windows that vanish mid-way are skipped, and a
    /// window that identifies as a browser window is never closed.
    pub async fn close_other_windows(&mut self) -> CertProbeResult<()> {
        let mut teardown = Teardown::new();
        for handle in self.driver.window_handles().await? {
            if handle == self.main_window {
                continue;
            }
            teardown.step("close window", self.close_secondary_window(&handle).await);
        }
        teardown.step("focus main window", self.focus().await);
        teardown.finish()
    }

    async fn close_secondary_window(&mut self, handle: &WindowHandle) -> CertProbeResult<()> {
        self.driver.switch_to_window(handle).await?;
        let root = self.selectors.window_root();
        if is_window_type(&self.driver, &root, BROWSER_WINDOW_TYPE).await? {
            warn!(%handle, main_window = %self.main_window, "keeping unexpected browser window");
            return Ok(());
        }
        debug!(%handle, "closing window");
        self.driver.close_window().await
    }

    /// Restart the browser and re-attach to its new main window.
    ///
    /// The main window handle is re-read as soon as the driver returns, even
    /// when the restart reported an error, so cleanup never mistakes the
    /// relaunched window for a stray one.
    pub async fn restart(&mut self) -> CertProbeResult<()> {
        info!("restarting browser");
        let relaunched = self.driver.restart().await;
        match self.driver.current_window().await {
            Ok(handle) => self.main_window = handle,
            Err(err) => debug!(%err, "main window unknown after restart"),
        }
        relaunched?;

        self.driver.set_context(Context::Chrome).await?;
        self.wait_for_window_type(BROWSER_WINDOW_TYPE).await?;
        self.main_window = self.driver.current_window().await?;
        debug!(main_window = %self.main_window, "browser restarted");
        Ok(())
    }
}

async fn is_present(driver: &dyn RemoteDriver, by: &By) -> CertProbeResult<bool> {
    driver.find_element(by).await.map(|_| true)
}

async fn has_new_window(driver: &dyn RemoteDriver, known: &[WindowHandle]) -> CertProbeResult<bool> {
    let handles = driver.window_handles().await?;
    Ok(handles.iter().any(|h| !known.contains(h)))
}

/// Whether the current window's root element carries `windowtype`
async fn is_window_type(
    driver: &dyn RemoteDriver,
    root: &By,
    window_type: &str,
) -> CertProbeResult<bool> {
    let element = driver.find_element(root).await?;
    let actual = driver.get_attribute(&element, "windowtype").await?;
    Ok(actual.as_deref() == Some(window_type))
}
