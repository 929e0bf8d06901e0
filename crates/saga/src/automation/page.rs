//! Browser page abstraction used by the vendor routines.
//!
//! Routines talk to a [`PageDriver`] instead of a concrete WebDriver so
//! that each interaction is an explicit `Result`-returning step. Tests run
//! against [`ScriptedPage`]; production uses the WebDriver-backed page.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// How long a page navigation may take.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for an optional element (popups and the like).
pub const POPUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for elements that must appear between steps.
pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single failed page interaction.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// Nothing matched the selector within the allowed time.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The selector matched nothing.
    #[error("element not found: {0}")]
    NotFound(String),

    /// The underlying driver failed.
    #[error("driver error: {0}")]
    Driver(String),
}

/// One live browser page. Selectors are CSS.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates to a URL and waits for the document to load.
    async fn navigate(&mut self, url: &str) -> Result<(), StepError>;

    /// Clicks the first element matching the selector.
    async fn click(&mut self, selector: &str) -> Result<(), StepError>;

    /// Clears and fills a text input.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), StepError>;

    /// Fills a text input inside an iframe, then returns to the top frame.
    async fn fill_in_frame(
        &mut self,
        frame_selector: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), StepError>;

    /// Picks an option of a `<select>` by value.
    async fn select(&mut self, selector: &str, value: &str) -> Result<(), StepError>;

    /// Checks or unchecks a checkbox, clicking only when needed.
    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), StepError>;

    /// Waits until any of the selectors matches; returns the index that did.
    async fn wait_for_any(
        &mut self,
        selectors: &[&str],
        timeout: Duration,
    ) -> Result<usize, StepError>;

    /// Waits for a single selector to appear.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), StepError> {
        self.wait_for_any(&[selector], timeout).await.map(|_| ())
    }

    /// Text content of the first matching element.
    async fn text(&mut self, selector: &str) -> Result<String, StepError>;

    /// Joined text of every matching element; empty when nothing matches.
    async fn collect_text(&mut self, selector: &str) -> Result<String, StepError>;

    /// Tears the page down. Best effort.
    async fn close(&mut self);
}

/// Opens a fresh page per purchase attempt.
#[async_trait]
pub trait Browser: Send + Sync {
    type Page: PageDriver;

    async fn open(&self) -> Result<Self::Page, StepError>;
}

#[derive(Debug, Default)]
struct ScriptState {
    visible: HashSet<String>,
    missing: HashSet<String>,
    texts: HashMap<String, String>,
}

/// Scripted in-memory page for routine tests.
///
/// Interactions succeed unless the selector was registered as missing;
/// waits succeed only for selectors registered as visible. Every call is
/// appended to a shared action log for assertions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    state: Arc<ScriptState>,
    log: Arc<Mutex<Vec<String>>>,
}

/// Browser double handing out clones of one scripted page.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBrowser {
    state: Arc<ScriptState>,
    log: Arc<Mutex<Vec<String>>>,
    open_count: Arc<Mutex<u32>>,
}

/// Builder for the scripted page behavior.
#[derive(Debug, Default)]
pub struct ScriptedPageBuilder {
    state: ScriptState,
}

impl ScriptedPageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a selector as visible to `wait_for_any`.
    pub fn visible(mut self, selector: &str) -> Self {
        self.state.visible.insert(selector.to_string());
        self
    }

    /// Makes every interaction with the selector fail.
    pub fn missing(mut self, selector: &str) -> Self {
        self.state.missing.insert(selector.to_string());
        self
    }

    /// Registers text content for a selector (implies visibility).
    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.state.visible.insert(selector.to_string());
        self.state.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn build_browser(self) -> ScriptedBrowser {
        ScriptedBrowser {
            state: Arc::new(self.state),
            log: Arc::new(Mutex::new(Vec::new())),
            open_count: Arc::new(Mutex::new(0)),
        }
    }
}

impl ScriptedBrowser {
    /// Everything every page has done so far.
    pub fn actions(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// How many fresh pages were opened.
    pub fn open_count(&self) -> u32 {
        *self.open_count.lock().unwrap()
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    type Page = ScriptedPage;

    async fn open(&self) -> Result<Self::Page, StepError> {
        *self.open_count.lock().unwrap() += 1;
        Ok(ScriptedPage {
            state: self.state.clone(),
            log: self.log.clone(),
        })
    }
}

impl ScriptedPage {
    fn record(&self, action: String) {
        self.log.lock().unwrap().push(action);
    }

    fn check(&self, selector: &str) -> Result<(), StepError> {
        if self.state.missing.contains(selector) {
            return Err(StepError::NotFound(selector.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&mut self, url: &str) -> Result<(), StepError> {
        self.record(format!("navigate {url}"));
        self.check(url)
    }

    async fn click(&mut self, selector: &str) -> Result<(), StepError> {
        self.record(format!("click {selector}"));
        self.check(selector)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), StepError> {
        self.record(format!("fill {selector}={value}"));
        self.check(selector)
    }

    async fn fill_in_frame(
        &mut self,
        frame_selector: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), StepError> {
        self.record(format!("frame {frame_selector} fill {selector}={value}"));
        self.check(frame_selector)?;
        self.check(selector)
    }

    async fn select(&mut self, selector: &str, value: &str) -> Result<(), StepError> {
        self.record(format!("select {selector}={value}"));
        self.check(selector)
    }

    async fn set_checked(&mut self, selector: &str, checked: bool) -> Result<(), StepError> {
        self.record(format!("set_checked {selector}={checked}"));
        self.check(selector)
    }

    async fn wait_for_any(
        &mut self,
        selectors: &[&str],
        _timeout: Duration,
    ) -> Result<usize, StepError> {
        self.record(format!("wait_for_any {}", selectors.join(", ")));
        selectors
            .iter()
            .position(|s| self.state.visible.contains(*s))
            .ok_or_else(|| StepError::Timeout(selectors.join(", ")))
    }

    async fn text(&mut self, selector: &str) -> Result<String, StepError> {
        self.record(format!("text {selector}"));
        self.state
            .texts
            .get(selector)
            .cloned()
            .ok_or_else(|| StepError::NotFound(selector.to_string()))
    }

    async fn collect_text(&mut self, selector: &str) -> Result<String, StepError> {
        self.record(format!("collect_text {selector}"));
        Ok(self.state.texts.get(selector).cloned().unwrap_or_default())
    }

    async fn close(&mut self) {
        self.record("close".to_string());
    }
}
