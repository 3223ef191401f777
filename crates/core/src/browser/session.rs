//! Browser session abstraction.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::BrowserConfig;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be created. Fatal for the run.
    #[error("session startup failed: {0}")]
    Startup(String),

    /// No element matched the locator.
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// Page navigation failed or timed out.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Script execution failed in the page.
    #[error("script error: {0}")]
    Script(String),

    /// Transport or protocol failure talking to the driver.
    #[error("driver error: {0}")]
    Driver(String),

    /// The session has already been closed.
    #[error("session closed")]
    Closed,
}

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    /// W3C location strategy name.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Opaque handle to an element found in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// An exclusively-owned browser automation session.
///
/// A session is used by one operation at a time; the pool guarantees that.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Slot index this session was created for.
    fn slot(&self) -> usize;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    async fn find_element(&mut self, locator: &Locator) -> Result<ElementRef, SessionError>;

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementRef>, SessionError>;

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), SessionError>;

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError>;

    /// Run a synchronous script. Elements in `args` are passed as references.
    async fn execute_script(
        &mut self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, SessionError>;

    /// Direct browser downloads into `dir`.
    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), SessionError>;

    /// Close the session. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Argument passed to an injected script.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Element(ElementRef),
    Value(Value),
}

impl From<&ElementRef> for ScriptArg {
    fn from(element: &ElementRef) -> Self {
        ScriptArg::Element(element.clone())
    }
}

impl From<&str> for ScriptArg {
    fn from(s: &str) -> Self {
        ScriptArg::Value(Value::String(s.to_string()))
    }
}

/// Creates fully-configured sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a session for `slot`, applying headless mode, proxy, page load
    /// timeout, page load strategy and image/notification suppression.
    async fn create(
        &self,
        config: &BrowserConfig,
        slot: usize,
    ) -> Result<Box<dyn BrowserSession>, SessionError>;
}
