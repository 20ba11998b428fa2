use serde_json::{json, Value};

/// Capabilities for a Chrome session driven through `chromedriver`.
#[derive(Debug, Clone, Default)]
pub struct ChromeCapabilities {
    args: Vec<String>,
}

impl ChromeCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn headless(self) -> Self {
        self.arg("--headless").arg("--disable-gpu")
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_json(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": self.args }
                }
            }
        })
    }
}
