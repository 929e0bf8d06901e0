//! WebDriver-backed implementation of the page abstraction.
//!
//! Every purchase attempt gets a fresh browser session so no cookies or
//! form state leak between attempts.

use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::{By, DesiredCapabilities, WebDriver, WebElement};
use tokio::time::{sleep, timeout};

use crate::automation::page::{Browser, NAVIGATION_TIMEOUT, PageDriver, StepError};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Opens sessions against a WebDriver server (chromedriver, Selenium).
#[derive(Debug, Clone)]
pub struct WebDriverBrowser {
    server_url: String,
}

impl WebDriverBrowser {
    /// Creates a browser factory for the given WebDriver server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Page = WebDriverPage;

    async fn open(&self) -> Result<Self::Page, StepError> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(&self.server_url, caps)
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        Ok(WebDriverPage { driver })
    }
}

/// One live WebDriver session.
pub struct WebDriverPage {
    driver: WebDriver,
}

impl WebDriverPage {
    async fn find(&self, selector: &str) -> Result<WebElement, StepError> {
        self.driver
            .find(By::Css(selector))
            .await
            .map_err(|_| StepError::NotFound(selector.to_string()))
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn navigate(&mut self, url: &str) -> Result<(), StepError> {
        timeout(NAVIGATION_TIMEOUT, self.driver.goto(url))
            .await
            .map_err(|_| StepError::Timeout(url.to_string()))?
            .map_err(|e| StepError::Driver(e.to_string()))
    }

    async fn click(&mut self, selector: &str) -> Result<(), StepError> {
        self.find(selector)
            .await?
            .click()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), StepError> {
        let element = self.find(selector).await?;
        element
            .clear()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        element
            .send_keys(value)
            .await
            .map_err(|e| StepError::Driver(e.to_string()))
    }

    async fn fill_in_frame(
        &mut self,
        frame_selector: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), StepError> {
        let frame = self.find(frame_selector).await?;
        frame
            .enter_frame()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;

        let result = self.fill(selector, value).await;

        // Leave the frame even when the fill failed.
        self.driver
            .enter_default_frame()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        result
    }

    async fn select(&mut self, selector: &str, value: &str) -> Result<(), StepError> {
        // Click the option directly instead of depending on select helpers.
        let option = format!("{selector} option[value='{value}']");
        self.find(selector).await?;
        self.click(&option).await
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), StepError> {
        let element = self.find(selector).await?;
        let current = element
            .is_selected()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        if current != checked {
            element
                .click()
                .await
                .map_err(|e| StepError::Driver(e.to_string()))?;
        }
        Ok(())
    }

    async fn wait_for_any(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<usize, StepError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            for (index, selector) in selectors.iter().enumerate() {
                if self.driver.find(By::Css(*selector)).await.is_ok() {
                    return Ok(index);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StepError::Timeout(selectors.join(", ")));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn text(&mut self, selector: &str) -> Result<String, StepError> {
        let text = self
            .find(selector)
            .await?
            .text()
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        Ok(text.trim().to_string())
    }

    async fn collect_text(&mut self, selector: &str) -> Result<String, StepError> {
        let elements = self
            .driver
            .find_all(By::Css(selector))
            .await
            .map_err(|e| StepError::Driver(e.to_string()))?;
        let mut parts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(text) = element.text().await {
                parts.push(text);
            }
        }
        Ok(parts.join(" "))
    }

    async fn close(&mut self) {
        if let Err(e) = self.driver.clone().quit().await {
            tracing::warn!(error = %e, "failed to quit webdriver session");
        }
    }
}
