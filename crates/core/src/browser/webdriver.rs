//! W3C WebDriver client for chromedriver.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::BrowserConfig;

use super::session::{BrowserSession, ElementRef, Locator, ScriptArg, SessionError, SessionFactory};

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4ed4ec2ef4a3";

/// Extra slack on top of the page load timeout for a single driver command.
const COMMAND_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Build the `capabilities` payload for a new chromedriver session.
pub fn capabilities(config: &BrowserConfig) -> Value {
    let mut args: Vec<String> = Vec::new();

    if config.headless_mode {
        args.extend(
            ["--headless=new", "--start-maximized", "--no-sandbox", "--disable-dev-shm-usage"]
                .iter()
                .map(|s| s.to_string()),
        );
    }

    if let Some(proxy) = config.effective_proxy() {
        args.push(format!("--proxy-server={}", proxy));
    }

    args.push("--disable-notifications".to_string());
    args.push("--disable-popup-blocking".to_string());
    args.push("--disable-extensions".to_string());
    if config.disable_images {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": config.page_load_strategy.as_str(),
                "timeouts": {
                    "pageLoad": config.timeout.saturating_mul(1000),
                },
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": {
                        "profile.default_content_setting_values.notifications": 2,
                        "download.prompt_for_download": false,
                    },
                },
            }
        }
    })
}

fn map_transport(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Driver("request to webdriver timed out".to_string())
    } else if e.is_connect() {
        SessionError::Driver(format!("webdriver not reachable: {}", e))
    } else {
        SessionError::Driver(e.to_string())
    }
}

fn map_wire_error(err: WireError) -> SessionError {
    match err.error.as_str() {
        "no such element" | "stale element reference" => SessionError::NoSuchElement(err.message),
        "timeout" | "unknown error" if err.message.contains("net::") => {
            SessionError::Navigation(err.message)
        }
        "timeout" => SessionError::Navigation(err.message),
        "javascript error" => SessionError::Script(err.message),
        "invalid session id" | "no such window" => SessionError::Closed,
        other => SessionError::Driver(format!("{}: {}", other, err.message)),
    }
}

fn parse_element(value: &Value) -> Option<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
}

fn element_json(element: &ElementRef) -> Value {
    let mut map = Map::new();
    map.insert(ELEMENT_KEY.to_string(), Value::String(element.0.clone()));
    Value::Object(map)
}

async fn send_command(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    timeout: Duration,
) -> Result<Value, SessionError> {
    let mut request = client.request(method, url).timeout(timeout);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(map_transport)?;
    let status = response.status();
    let wire: WireResponse = response.json().await.map_err(map_transport)?;

    if !status.is_success() {
        return match serde_json::from_value::<WireError>(wire.value) {
            Ok(err) => Err(map_wire_error(err)),
            Err(_) => Err(SessionError::Driver(format!("HTTP {}", status))),
        };
    }

    Ok(wire.value)
}

/// One chromedriver session.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    slot: usize,
    command_timeout: Duration,
    closed: bool,
}

impl WebDriverSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send_command(&self.client, method, &url, body, self.command_timeout).await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    fn slot(&self) -> usize {
        self.slot
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!(slot = self.slot, url = %url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map_err(|e| match e {
                SessionError::Driver(msg) => SessionError::Navigation(msg),
                other => other,
            })?;
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<ElementRef, SessionError> {
        let value = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": locator.strategy(), "value": locator.value() })),
            )
            .await?;
        parse_element(&value).ok_or_else(|| SessionError::NoSuchElement(locator.to_string()))
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementRef>, SessionError> {
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": locator.strategy(), "value": locator.value() })),
            )
            .await?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(parse_element).collect())
            .unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let path = format!("/element/{}/attribute/{}", element.0, name);
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), SessionError> {
        let path = format!("/element/{}/value", element.0);
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        let path = format!("/element/{}/click", element.0);
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    async fn execute_script(
        &mut self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, SessionError> {
        let args: Vec<Value> = args
            .iter()
            .map(|arg| match arg {
                ScriptArg::Element(element) => element_json(element),
                ScriptArg::Value(value) => value.clone(),
            })
            .collect();
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), SessionError> {
        let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(json!({
                "cmd": "Page.setDownloadBehavior",
                "params": { "behavior": "allow", "downloadPath": dir.to_string_lossy() },
            })),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        let result = self.command(Method::DELETE, "", None).await;
        self.closed = true;
        match result {
            Ok(_) | Err(SessionError::Closed) => {
                debug!(slot = self.slot, session_id = %self.session_id, "Session closed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!(slot = self.slot, session_id = %self.session_id, "WebDriver session dropped without close");
        }
    }
}

/// Creates chromedriver sessions over the W3C wire protocol.
pub struct WebDriverSessionFactory {
    client: Client,
}

impl WebDriverSessionFactory {
    pub fn new() -> Result<Self, SessionError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SessionError::Startup(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessionFactory {
    async fn create(
        &self,
        config: &BrowserConfig,
        slot: usize,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();
        let command_timeout = Duration::from_secs(config.timeout) + COMMAND_SLACK;

        let value = send_command(
            &self.client,
            Method::POST,
            &format!("{}/session", base_url),
            Some(capabilities(config)),
            command_timeout,
        )
        .await
        .map_err(|e| SessionError::Startup(e.to_string()))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::Startup("response has no sessionId".to_string()))?
            .to_string();

        debug!(slot, session_id = %session_id, "WebDriver session created");

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base_url,
            session_id,
            slot,
            command_timeout,
            closed: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLoadStrategy;

    fn args_of(caps: &Value) -> Vec<String> {
        caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_capabilities_defaults() {
        let caps = capabilities(&BrowserConfig::default());
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["pageLoadStrategy"], "eager");
        assert_eq!(always["timeouts"]["pageLoad"], 25_000);

        let args = args_of(&caps);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--disable-notifications".to_string()));
        assert!(args.contains(&"--blink-settings=imagesEnabled=false".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--proxy-server")));
    }

    #[test]
    fn test_capabilities_with_proxy_and_window() {
        let config = BrowserConfig {
            headless_mode: false,
            use_proxy: true,
            proxy_server: "10.0.0.1:3128".to_string(),
            page_load_strategy: PageLoadStrategy::Normal,
            disable_images: false,
            ..Default::default()
        };
        let caps = capabilities(&config);
        assert_eq!(caps["capabilities"]["alwaysMatch"]["pageLoadStrategy"], "normal");

        let args = args_of(&caps);
        assert!(args.contains(&"--proxy-server=10.0.0.1:3128".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.iter().any(|a| a.contains("imagesEnabled")));
    }

    #[test]
    fn test_wire_error_mapping() {
        let err = map_wire_error(WireError {
            error: "no such element".to_string(),
            message: "Unable to locate element".to_string(),
        });
        assert!(matches!(err, SessionError::NoSuchElement(_)));

        let err = map_wire_error(WireError {
            error: "invalid session id".to_string(),
            message: String::new(),
        });
        assert!(matches!(err, SessionError::Closed));

        let err = map_wire_error(WireError {
            error: "timeout".to_string(),
            message: "page load".to_string(),
        });
        assert!(matches!(err, SessionError::Navigation(_)));
    }

    #[test]
    fn test_element_reference_roundtrip() {
        let element = ElementRef("abc-123".to_string());
        let json = element_json(&element);
        assert_eq!(parse_element(&json), Some(element));
        assert_eq!(parse_element(&json!({ "foo": "bar" })), None);
    }

    #[tokio::test]
    async fn test_create_fails_when_driver_unreachable() {
        let factory = WebDriverSessionFactory::new().unwrap();
        let config = BrowserConfig {
            webdriver_url: "http://127.0.0.1:1".to_string(),
            timeout: 1,
            ..Default::default()
        };
        let result = factory.create(&config, 0).await;
        assert!(matches!(result, Err(SessionError::Startup(_))));
    }
}
