use std::{future::Future, sync::Arc, time::Duration};

use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use crate::{ChromeCapabilities, Key, Locator, Result, WebDriverError};

/// Web element identifier key from W3C WebDriver.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
struct Session {
    client: Client,
    base_url: String,
    session_id: String,
}

impl Session {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.endpoint(path);
        tracing::trace!(%method, %url, "webdriver command");

        let mut request = self.client.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let payload = resp.json::<Value>().await?;

        unwrap_value(status, payload)
    }
}

/// Extracts `value` from a WebDriver response, turning error payloads into errors.
fn unwrap_value(status: StatusCode, mut payload: Value) -> Result<Value> {
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .ok_or_else(|| WebDriverError::UnexpectedResponse(payload.to_string()))?;

    if status.is_success() {
        return Ok(value);
    }

    let error = value["error"].as_str().unwrap_or("unknown error");
    let message = value["message"].as_str().unwrap_or_default();
    Err(WebDriverError::from_payload(error, message))
}

fn element_id(value: &Value) -> Result<String> {
    value[ELEMENT_KEY]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| WebDriverError::UnexpectedResponse(format!("not an element: {value}")))
}

fn locator_body(locator: &Locator<'_>) -> Value {
    let (using, value) = locator.strategy();
    json!({ "using": using, "value": value })
}

/// Builds an action sequence that moves the mouse onto `element_id`, clicks,
/// then presses each key once.
fn click_and_keys_payload(element_id: &str, keys: &[Key]) -> Value {
    let mut pointer = vec![
        json!({
            "type": "pointerMove",
            "duration": 0,
            "origin": { ELEMENT_KEY: element_id },
            "x": 0,
            "y": 0
        }),
        json!({ "type": "pointerDown", "button": 0 }),
        json!({ "type": "pointerUp", "button": 0 }),
    ];
    let mut keyboard = vec![json!({ "type": "pause", "duration": 0 }); pointer.len()];

    for key in keys {
        let value = key.code_point().to_string();
        keyboard.push(json!({ "type": "keyDown", "value": value }));
        keyboard.push(json!({ "type": "keyUp", "value": value }));
    }
    pointer.resize(keyboard.len(), json!({ "type": "pause", "duration": 0 }));

    json!({
        "actions": [
            {
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": pointer
            },
            { "type": "key", "id": "keyboard", "actions": keyboard }
        ]
    })
}

/// A live WebDriver session. Cloning shares the same session.
#[derive(Debug, Clone)]
pub struct WebDriver {
    session: Arc<Session>,
}

impl WebDriver {
    /// Opens a new browser session on the driver server at `server_url`.
    #[tracing::instrument(skip(capabilities))]
    pub async fn connect(server_url: &str, capabilities: &ChromeCapabilities) -> Result<Self> {
        let client = Client::new();
        let base_url = server_url.trim_end_matches('/').to_string();

        let resp = client
            .post(format!("{base_url}/session"))
            .json(&capabilities.to_json())
            .send()
            .await?;
        let status = resp.status();
        let value = unwrap_value(status, resp.json::<Value>().await?)?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| WebDriverError::UnexpectedResponse(value.to_string()))?
            .to_string();
        tracing::debug!(%session_id, "WebDriver session created");

        Ok(Self {
            session: Arc::new(Session {
                client,
                base_url,
                session_id,
            }),
        })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.session
            .send(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.session.send(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::UnexpectedResponse(value.to_string()))
    }

    /// Runs `script` synchronously in the page and returns its result.
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.session
            .send(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": script, "args": args })),
            )
            .await
    }

    pub async fn find(&self, locator: Locator<'_>) -> Result<Element> {
        let value = self
            .session
            .send(Method::POST, "/element", Some(locator_body(&locator)))
            .await?;
        Ok(self.element(element_id(&value)?))
    }

    pub async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Element>> {
        let value = self
            .session
            .send(Method::POST, "/elements", Some(locator_body(&locator)))
            .await?;
        self.elements(&value)
    }

    /// Polls until an element matching `locator` is present.
    pub async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<Element> {
        self.poll_until(locator.to_string(), timeout, || async move {
            match self.find(locator).await {
                Ok(element) => Ok(Some(element)),
                Err(WebDriverError::NoSuchElement(_)) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Polls until at least one element matches `locator`.
    pub async fn wait_for_all(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<Vec<Element>> {
        self.poll_until(locator.to_string(), timeout, || async move {
            let elements = self.find_all(locator).await?;
            Ok((!elements.is_empty()).then_some(elements))
        })
        .await
    }

    /// Polls until an element matching `locator` is displayed and enabled.
    pub async fn wait_for_clickable(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<Element> {
        self.poll_until(format!("clickable {locator}"), timeout, || async move {
            let element = match self.find(locator).await {
                Ok(element) => element,
                Err(WebDriverError::NoSuchElement(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let ready = element.is_displayed().await? && element.is_enabled().await?;
            Ok(ready.then_some(element))
        })
        .await
    }

    pub async fn wait_for_url(&self, expected: &str, timeout: Duration) -> Result<()> {
        self.poll_until(format!("url {expected}"), timeout, || async move {
            Ok((self.current_url().await? == expected).then_some(()))
        })
        .await
    }

    pub async fn alert_text(&self) -> Result<String> {
        let value = self.session.send(Method::GET, "/alert/text", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn accept_alert(&self) -> Result<()> {
        self.session.send(Method::POST, "/alert/accept", None).await?;
        Ok(())
    }

    /// Waits up to `timeout` for a user prompt and returns its text, or `None`
    /// if no alert showed up.
    pub async fn wait_for_alert(&self, timeout: Duration) -> Result<Option<String>> {
        let found = self
            .poll_until("alert".to_string(), timeout, || async move {
                match self.alert_text().await {
                    Ok(text) => Ok(Some(text)),
                    Err(WebDriverError::NoSuchAlert(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await;

        match found {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn enter_frame(&self, frame: &Element) -> Result<()> {
        self.session
            .send(
                Method::POST,
                "/frame",
                Some(json!({ "id": { ELEMENT_KEY: frame.id } })),
            )
            .await?;
        Ok(())
    }

    pub async fn enter_default_frame(&self) -> Result<()> {
        self.session
            .send(Method::POST, "/frame", Some(json!({ "id": null })))
            .await?;
        Ok(())
    }

    /// Moves to `element`, clicks it and presses `keys` in order.
    pub async fn click_and_press(&self, element: &Element, keys: &[Key]) -> Result<()> {
        self.session
            .send(
                Method::POST,
                "/actions",
                Some(click_and_keys_payload(&element.id, keys)),
            )
            .await?;
        self.session.send(Method::DELETE, "/actions", None).await?;
        Ok(())
    }

    /// Ends the session and closes the browser.
    pub async fn quit(&self) -> Result<()> {
        self.session.send(Method::DELETE, "", None).await?;
        Ok(())
    }

    fn element(&self, id: String) -> Element {
        Element {
            driver: self.clone(),
            id,
        }
    }

    fn elements(&self, value: &Value) -> Result<Vec<Element>> {
        value
            .as_array()
            .ok_or_else(|| WebDriverError::UnexpectedResponse(value.to_string()))?
            .iter()
            .map(|v| element_id(v).map(|id| self.element(id)))
            .collect()
    }

    async fn poll_until<T, F, Fut>(
        &self,
        waiting_for: String,
        timeout: Duration,
        mut probe: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = probe().await? {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(WebDriverError::Timeout {
                    waiting_for,
                    timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

/// A reference to an element in the current browsing context.
#[derive(Debug, Clone)]
pub struct Element {
    driver: WebDriver,
    id: String,
}

impl Element {
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.driver
            .session
            .send(method, &format!("/element/{}{}", self.id, path), body)
            .await
    }

    pub async fn click(&self) -> Result<()> {
        self.send(Method::POST, "/click", None).await?;
        Ok(())
    }

    pub async fn send_keys(&self, text: &str) -> Result<()> {
        self.send(Method::POST, "/value", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    pub async fn text(&self) -> Result<String> {
        let value = self.send(Method::GET, "/text", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Returns the attribute value, or `None` when the attribute is absent.
    pub async fn attr(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .send(Method::GET, &format!("/attribute/{name}"), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn is_displayed(&self) -> Result<bool> {
        let value = self.send(Method::GET, "/displayed", None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        let value = self.send(Method::GET, "/enabled", None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn find(&self, locator: Locator<'_>) -> Result<Element> {
        let value = self
            .send(Method::POST, "/element", Some(locator_body(&locator)))
            .await?;
        Ok(self.driver.element(element_id(&value)?))
    }
}
