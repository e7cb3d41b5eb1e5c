use std::ffi::OsStr;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::config::BrowserConfig;
use crate::utils::error::{EngineError, Result};

/// Opens page-rendering sessions. One session is acquired per sweep and
/// reused across every product in it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

/// An active page-rendering session positioned at whatever URL was last
/// loaded. `evaluate` runs a script in the page and returns its textual
/// result, `None` when the script produced no value.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PageSession: Send {
    async fn load(&mut self, url: &str) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Result<Option<String>>;
}

pub struct ChromeRenderer {
    config: BrowserConfig,
}

impl ChromeRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
            ])
            .build()
            .map_err(|e| EngineError::Render(format!("failed to build launch options: {e}")))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| EngineError::Render(format!("failed to launch browser: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| EngineError::Render(format!("failed to create tab: {e}")))?;

        Ok(Box::new(ChromeSession {
            _browser: browser,
            tab,
        }))
    }
}

/// Browser and tab torn down on drop, on every exit path of a sweep.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn load(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| EngineError::Render(format!("navigation to {url} failed: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| EngineError::Render(format!("page load of {url} failed: {e}")))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Option<String>> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| EngineError::Extraction(format!("script execution failed: {e}")))?;

        match remote.value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(EngineError::Extraction(format!(
                "script returned non-text value: {other}"
            ))),
        }
    }
}
