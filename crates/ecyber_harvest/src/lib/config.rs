use std::{path::PathBuf, time::Duration};

use webdriver_bindings::ChromeCapabilities;

use crate::capture::CapturePolicy;

pub const DEFAULT_SCHOOL_DOMAIN: &str = "e-cyber.catholic.ac.kr";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub download_dir: PathBuf,
    /// Skip lectures whose `mp3/` folder already holds audio.
    pub skip_existing: bool,
    pub capture: CapturePolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            skip_existing: true,
            capture: CapturePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
        }
    }
}

impl BrowserOptions {
    pub fn capabilities(&self) -> ChromeCapabilities {
        let caps = ChromeCapabilities::new()
            .arg("window-size=960,1080")
            .arg("window-position=0,0");
        if self.headless {
            caps.headless()
        } else {
            caps
        }
    }
}

/// Fixed waits used while scripting the portal. The values were tuned
/// against the live site.
#[derive(Debug, Clone)]
pub struct NavigationTimings {
    pub element_timeout: Duration,
    pub after_login: Duration,
    pub after_course_list: Duration,
    pub after_week_menu: Duration,
    pub after_week_click: Duration,
    pub alert_timeout: Duration,
    pub after_alert: Duration,
    pub auth_probe_delay: Duration,
    pub auth_dialog_timeout: Duration,
    pub player_url_timeout: Duration,
    pub playback_start: Duration,
    pub intro_skip: Duration,
    pub seek_settle: Duration,
}

impl Default for NavigationTimings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            after_login: Duration::from_millis(500),
            after_course_list: Duration::from_millis(500),
            after_week_menu: Duration::from_secs(2),
            after_week_click: Duration::from_secs(1),
            alert_timeout: Duration::from_secs(3),
            after_alert: Duration::from_secs(1),
            auth_probe_delay: Duration::from_millis(500),
            auth_dialog_timeout: Duration::from_secs(3),
            player_url_timeout: Duration::from_secs(10),
            playback_start: Duration::from_secs(3),
            intro_skip: Duration::from_secs(5),
            seek_settle: Duration::from_secs(1),
        }
    }
}
