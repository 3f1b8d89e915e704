//! Browser session over WebDriver
//!
//! One [`BrowserSession`] exists per run. It is opened once, shared by
//! reference with every scenario, and closed exactly once by the runner.
//! All state assertions go through [`BrowserSession::wait`], which evaluates
//! a [`WaitCondition`] on every poll tick.

use std::path::Path;
use async_trait::async_trait;
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{debug, info, warn};

use crate::artifacts::SnapshotSource;
use crate::config::BrowserConfig;
use crate::driver_service::DriverService;
use crate::error::{E2eError, E2eResult};
use crate::runner::{Launcher, Session};
use crate::wait::{wait_on, Locator, Page, Satisfied, WaitCondition, WaitConfig};

/// Condition over the rendered page of a live session.
pub type Condition = WaitCondition<WebElement>;

impl From<&Locator> for By {
    fn from(locator: &Locator) -> Self {
        match locator {
            Locator::Id(v) => By::Id(v.clone()),
            Locator::Name(v) => By::Name(v.clone()),
            Locator::Css(v) => By::Css(v.clone()),
            Locator::XPath(v) => By::XPath(v.clone()),
            Locator::LinkText(v) => By::LinkText(v.clone()),
        }
    }
}

pub struct BrowserSession {
    driver: Option<WebDriver>,
    service: Option<DriverService>,
    wait: WaitConfig,
}

impl BrowserSession {
    /// Launch Chrome through WebDriver.
    ///
    /// Any failure here is fatal for the run; a partially started driver
    /// service is stopped before the error is returned.
    pub async fn open(config: &BrowserConfig, wait: WaitConfig) -> E2eResult<Self> {
        let mut service = None;
        let url = match &config.webdriver_url {
            Some(url) => url.clone(),
            None => {
                let spawned =
                    DriverService::spawn(&config.chromedriver, config.driver_startup_timeout)
                        .await
                        .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;
                let url = spawned.url().to_string();
                service = Some(spawned);
                url
            }
        };

        let mut caps = DesiredCapabilities::chrome();
        for arg in config.chrome_args() {
            caps.add_arg(&arg)
                .map_err(|e| E2eError::BrowserLaunch(format!("invalid argument {arg}: {e}")))?;
        }

        let driver = WebDriver::new(url.as_str(), caps)
            .await
            .map_err(|e| E2eError::BrowserLaunch(format!("session at {url}: {e}")))?;

        info!(
            "Browser session opened (headless: {}, args: {:?})",
            config.headless,
            config.chrome_args()
        );
        Ok(Self {
            driver: Some(driver),
            service,
            wait,
        })
    }

    fn driver(&self) -> E2eResult<&WebDriver> {
        self.driver.as_ref().ok_or(E2eError::SessionClosed)
    }

    pub fn wait_config(&self) -> WaitConfig {
        self.wait
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// Load `url`. Does not wait for anything on the new page.
    pub async fn navigate(&self, url: &str) -> E2eResult<()> {
        debug!("navigate: {}", url);
        self.driver()?.goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        Ok(self.driver()?.current_url().await?.to_string())
    }

    /// Locate an element that must already be in the page.
    pub async fn find(&self, locator: &Locator) -> E2eResult<WebElement> {
        Ok(self.driver()?.find(By::from(locator)).await?)
    }

    /// All elements currently matching `locator` (possibly none).
    pub async fn find_all(&self, locator: &Locator) -> E2eResult<Vec<WebElement>> {
        Ok(self.driver()?.find_all(By::from(locator)).await?)
    }

    /// Block until `condition` holds, returning the element it matched, if any.
    pub async fn wait(&self, condition: &Condition) -> E2eResult<Option<WebElement>> {
        Ok(match wait_on(self, self.wait, condition).await? {
            Satisfied::Page => None,
            Satisfied::Element(el) => Some(el),
        })
    }

    pub async fn wait_for(&self, condition: Condition) -> E2eResult<()> {
        self.wait(&condition).await.map(|_| ())
    }

    /// Wait for an element condition and return the element.
    pub async fn wait_for_element(&self, condition: Condition) -> E2eResult<WebElement> {
        self.wait(&condition).await?.ok_or_else(|| {
            E2eError::AssertionFailed(format!("'{}' matched no element", condition.describe()))
        })
    }

    pub async fn visible(&self, locator: Locator) -> E2eResult<WebElement> {
        self.wait_for_element(WaitCondition::ElementVisible(locator)).await
    }

    pub async fn clickable(&self, locator: Locator) -> E2eResult<WebElement> {
        self.wait_for_element(WaitCondition::ElementClickable(locator)).await
    }

    /// Wait for a native dialog, accept it, and return its message.
    pub async fn accept_alert(&self) -> E2eResult<String> {
        self.wait_for(WaitCondition::AlertPresent).await?;
        let driver = self.driver()?;
        let text = driver.get_alert_text().await?;
        debug!("accepting dialog: {}", text);
        driver.accept_alert().await?;
        Ok(text)
    }

    /// Release the session and the driver service. Idempotent.
    pub async fn close(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => info!("Browser session closed"),
                Err(e) => warn!("Browser session did not quit cleanly: {}", e),
            }
        }
        if let Some(mut service) = self.service.take() {
            service.stop().await;
        }
    }
}

async fn first_matching<F, Fut>(
    driver: &WebDriver,
    locator: &Locator,
    check: F,
) -> E2eResult<Option<WebElement>>
where
    F: Fn(WebElement) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for el in driver.find_all(By::from(locator)).await? {
        if check(el.clone()).await {
            return Ok(Some(el));
        }
    }
    Ok(None)
}

/// Replace the contents of the field `locator` inside `scope` with `value`.
pub async fn fill(scope: &WebElement, locator: &Locator, value: &str) -> E2eResult<()> {
    let field = scope.find(By::from(locator)).await?;
    field.clear().await?;
    field.send_keys(value).await?;
    Ok(())
}

/// Visible text of the element at `locator` inside `scope`.
pub async fn text_in(scope: &WebElement, locator: &Locator) -> E2eResult<String> {
    Ok(scope.find(By::from(locator)).await?.text().await?)
}

pub async fn click_in(scope: &WebElement, locator: &Locator) -> E2eResult<()> {
    scope.find(By::from(locator)).await?.click().await?;
    Ok(())
}

/// Pick the option whose visible text is `text` in the `<select>` at `locator`.
pub async fn select_by_text(scope: &WebElement, locator: &Locator, text: &str) -> E2eResult<()> {
    let select = scope.find(By::from(locator)).await?;
    SelectElement::new(&select).await?.select_by_visible_text(text).await?;
    Ok(())
}

pub async fn select_by_index(scope: &WebElement, locator: &Locator, index: u32) -> E2eResult<()> {
    let select = scope.find(By::from(locator)).await?;
    SelectElement::new(&select).await?.select_by_index(index).await?;
    Ok(())
}

#[async_trait]
impl Page for BrowserSession {
    type Element = WebElement;

    async fn url(&self) -> E2eResult<String> {
        self.current_url().await
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.driver()?.title().await?)
    }

    async fn first_visible(&self, locator: &Locator) -> E2eResult<Option<WebElement>> {
        first_matching(self.driver()?, locator, |el| async move {
            matches!(el.is_displayed().await, Ok(true))
        })
        .await
    }

    async fn first_clickable(&self, locator: &Locator) -> E2eResult<Option<WebElement>> {
        first_matching(self.driver()?, locator, |el| async move {
            matches!(el.is_clickable().await, Ok(true))
        })
        .await
    }

    async fn alert_open(&self) -> E2eResult<bool> {
        Ok(self.driver()?.get_alert_text().await.is_ok())
    }

    async fn is_attached(&self, element: &WebElement) -> E2eResult<bool> {
        Ok(element.is_present().await?)
    }
}

#[async_trait]
impl SnapshotSource for BrowserSession {
    async fn save_snapshot(&self, path: &Path) -> E2eResult<()> {
        self.driver()?.screenshot(path).await?;
        Ok(())
    }
}

#[async_trait]
impl Session for BrowserSession {
    async fn close(&mut self) {
        BrowserSession::close(self).await;
    }
}

/// Opens Chrome sessions from a [`BrowserConfig`].
pub struct ChromeLauncher {
    pub config: BrowserConfig,
    pub wait: WaitConfig,
}

#[async_trait]
impl Launcher for ChromeLauncher {
    type Session = BrowserSession;

    async fn open(&self) -> E2eResult<BrowserSession> {
        BrowserSession::open(&self.config, self.wait).await
    }
}

