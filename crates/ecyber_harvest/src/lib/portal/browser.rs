use anyhow::Context;
use serde_json::json;
use tokio::{sync::Mutex, time::sleep};
use webdriver_bindings::{Element, Key, Locator, WebDriver, WebDriverError};

use crate::{
    config::{BrowserOptions, NavigationTimings},
    portal::{Portal, VideoPlayer, VideoSlot},
    types::{CourseToken, Credentials, LectureEntry, LectureUnit, SubjectEntry, WeekEntry},
};

/// The e-cyber portal driven through a WebDriver session.
pub struct EcyberPortal {
    driver: WebDriver,
    domain: String,
    timings: NavigationTimings,
    video: Mutex<Option<Element>>,
}

impl EcyberPortal {
    const LOGIN_PATH: &'static str = "/ilos/main/member/login_form.acl";
    const COURSE_LIST_PATH: &'static str = "/ilos/mp/course_register_list_form.acl";
    const PLAYER_PATH: &'static str = "/ilos/st/course/online_view_form.acl";
    const INTRO_VIDEO_PATH: &'static str = "/settings/viewer/uniplayer/intro.mp4";

    const OVERLAY_SCRIPT: &'static str = include_str!("./scripts/overlay.js");
    const OVERLAY_MESSAGE_SCRIPT: &'static str = include_str!("./scripts/overlay_message.js");
    const OVERLAY_TEXT: &'static str = "Automated control in progress. Please do not touch this page.";

    const ATTENDANCE_ALERT_MARKER: &'static str = "출석인정기간이 지나";

    const WEEKS_XPATH: &'static str = r#"//div[@id="chart"]//div[contains(@class, "wb-week")]"#;
    const LECTURE_ROWS_XPATH: &'static str = "//*[contains(@onclick, 'viewGo(')]";
    const SYNCED_VIDEO_XPATH: &'static str = "//*[@id='syncvideo-play']/div/div[1]/div[1]/video";
    const SINGLE_VIDEO_XPATH: &'static str = "//*[@id='video-play-video1']/div[1]/video";
    const DURATION_META_XPATH: &'static str = "/html/head/meta[13]";

    /// Right-arrow presses per forward nudge.
    const SEEK_STEPS: usize = 6;

    #[tracing::instrument(skip(timings))]
    pub async fn connect(
        options: &BrowserOptions,
        school_domain: &str,
        timings: NavigationTimings,
    ) -> anyhow::Result<Self> {
        let driver = WebDriver::connect(&options.webdriver_url, &options.capabilities())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to start browser session"))
            .context("Failed to start browser session")?;
        tracing::info!("Browser session started");

        Ok(Self {
            driver,
            domain: school_domain.to_string(),
            timings,
            video: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.domain, path)
    }

    fn week_xpath(label: &str) -> String {
        format!(
            r#"//div[@id="chart"]//*[contains(@class, "wb-week") and normalize-space(.)="{label}"]"#
        )
    }

    async fn add_overlay(&self) {
        if let Err(e) = self
            .driver
            .execute(Self::OVERLAY_SCRIPT, vec![json!(Self::OVERLAY_TEXT)])
            .await
        {
            tracing::warn!(error = %e, "Failed to inject automation overlay");
        }
    }

    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.driver.goto(url).await?;
        self.add_overlay().await;
        Ok(())
    }

    /// Opens the course list, enters the course and its weeks view.
    async fn enter_course(&self, token: &CourseToken) -> anyhow::Result<()> {
        let t = &self.timings;

        self.navigate(&self.url(Self::COURSE_LIST_PATH)).await?;
        sleep(t.after_course_list).await;
        self.driver
            .execute("eclassRoom(arguments[0]);", vec![json!(token.as_str())])
            .await?;
        self.add_overlay().await;

        self.driver
            .wait_for_clickable(Locator::Id("menu_lecture_weeks"), t.element_timeout)
            .await?
            .click()
            .await?;
        sleep(t.after_week_menu).await;
        self.add_overlay().await;
        Ok(())
    }

    async fn click_week(&self, label: &str) -> anyhow::Result<()> {
        let xpath = Self::week_xpath(label);
        self.driver
            .wait_for_clickable(Locator::XPath(&xpath), self.timings.element_timeout)
            .await
            .with_context(|| format!("Week '{label}' not found"))?
            .click()
            .await?;
        sleep(self.timings.after_week_click).await;
        Ok(())
    }

    async fn enter_player_frame(&self) -> anyhow::Result<()> {
        let iframe = self.driver.find(Locator::TagName("iframe")).await?;
        self.driver.enter_frame(&iframe).await?;
        Ok(())
    }

    async fn viewer(&self) -> anyhow::Result<Element> {
        Ok(self.driver.find(Locator::Id("contentViewer")).await?)
    }
}

impl Portal for EcyberPortal {
    #[tracing::instrument(skip_all, fields(username = %credentials.username))]
    async fn sign_in(&self, credentials: &Credentials) -> anyhow::Result<()> {
        let t = &self.timings;

        self.navigate(&self.url(Self::LOGIN_PATH)).await?;
        self.driver
            .wait_for(Locator::Id("usr_id"), t.element_timeout)
            .await
            .context("Login form did not load")?
            .send_keys(&credentials.username)
            .await?;
        self.driver
            .find(Locator::Id("usr_pwd"))
            .await?
            .send_keys(&credentials.password)
            .await?;
        self.driver.find(Locator::Id("login_btn")).await?.click().await?;
        tracing::info!("Signing in");

        sleep(t.after_login).await;
        self.navigate(&self.url(Self::COURSE_LIST_PATH)).await?;
        self.driver
            .wait_for(Locator::Id("list_tab1"), t.element_timeout)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Course list did not load after login"))
            .context("Login failed: check that the credentials are correct")?;

        Ok(())
    }

    async fn open_regular_subjects(&self) -> anyhow::Result<()> {
        self.driver
            .wait_for_clickable(Locator::Id("list_tab1"), self.timings.element_timeout)
            .await?
            .click()
            .await?;
        tracing::info!("Switched to the regular subjects tab");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn scrape_subjects(&self) -> anyhow::Result<Vec<SubjectEntry>> {
        let containers = self
            .driver
            .wait_for_all(
                Locator::ClassName("content-container"),
                self.timings.element_timeout,
            )
            .await
            .context("Failed to load the subject list")?;

        let mut entries = Vec::with_capacity(containers.len());
        for container in containers {
            let title = match container.find(Locator::ClassName("content-title")).await {
                Ok(el) => el.text().await?,
                Err(WebDriverError::NoSuchElement(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            let onclick = match container.find(Locator::TagName("a")).await {
                Ok(link) => link.attr("onclick").await?,
                Err(WebDriverError::NoSuchElement(_)) => None,
                Err(e) => return Err(e.into()),
            };
            entries.push(SubjectEntry { title, onclick });
        }
        Ok(entries)
    }

    #[tracing::instrument(skip(self))]
    async fn scrape_weeks(&self, token: &CourseToken) -> anyhow::Result<Vec<WeekEntry>> {
        self.enter_course(token).await?;

        let weeks = self
            .driver
            .wait_for_all(Locator::XPath(Self::WEEKS_XPATH), self.timings.element_timeout)
            .await
            .context("Failed to load the weeks view")?;

        let mut entries = Vec::with_capacity(weeks.len());
        for week in weeks {
            entries.push(WeekEntry {
                label: week.text().await?.trim().to_string(),
                class: week.attr("class").await?.unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    #[tracing::instrument(skip(self), fields(week = %week.label))]
    async fn scrape_week_lectures(&self, week: &WeekEntry) -> anyhow::Result<Vec<LectureEntry>> {
        self.click_week(&week.label).await?;

        let rows = self
            .driver
            .find_all(Locator::XPath(Self::LECTURE_ROWS_XPATH))
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LectureEntry {
                text: row.text().await?,
                onclick: row.attr("onclick").await?,
            });
        }
        Ok(entries)
    }

    #[tracing::instrument(skip(self, lecture), fields(week = lecture.week, title = %lecture.title))]
    async fn open_lecture(&self, token: &CourseToken, lecture: &LectureUnit) -> anyhow::Result<()> {
        self.enter_course(token).await?;
        self.click_week(&format!("{}주", lecture.week)).await?;

        self.driver
            .execute(lecture.script.raw(), vec![])
            .await
            .context("Failed to run the lecture's resume script")?;

        if let Some(text) = self.driver.wait_for_alert(self.timings.alert_timeout).await? {
            if text.contains(Self::ATTENDANCE_ALERT_MARKER) {
                tracing::info!("Attendance period has passed, accepting the warning");
                self.driver.accept_alert().await?;
                sleep(self.timings.after_alert).await;
            }
        }
        Ok(())
    }

    async fn secondary_auth_pending(&self) -> anyhow::Result<bool> {
        sleep(self.timings.auth_probe_delay).await;
        match self
            .driver
            .wait_for(
                Locator::Id("dialog_secondary_auth"),
                self.timings.auth_dialog_timeout,
            )
            .await
        {
            Ok(dialog) => Ok(dialog.is_displayed().await?),
            Err(e) if e.is_timeout() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn enter_player(&self) -> anyhow::Result<()> {
        self.add_overlay().await;
        if self
            .driver
            .wait_for_alert(self.timings.alert_timeout)
            .await?
            .is_some()
        {
            self.driver.accept_alert().await?;
            sleep(self.timings.after_alert).await;
        }

        self.driver
            .wait_for_url(&self.url(Self::PLAYER_PATH), self.timings.player_url_timeout)
            .await
            .context("Player page did not open")?;
        self.add_overlay().await;
        Ok(())
    }

    async fn show_message(&self, message: &str) -> anyhow::Result<()> {
        self.add_overlay().await;
        self.driver
            .execute(Self::OVERLAY_MESSAGE_SCRIPT, vec![json!(message)])
            .await?;
        Ok(())
    }

    async fn quit(&self) -> anyhow::Result<()> {
        self.driver.quit().await?;
        tracing::info!("Browser session closed");
        Ok(())
    }
}

impl VideoPlayer for EcyberPortal {
    fn intro_video_url(&self) -> String {
        self.url(Self::INTRO_VIDEO_PATH)
    }

    async fn start_playback(&self) -> anyhow::Result<()> {
        let viewer = self.viewer().await?;
        self.driver.click_and_press(&viewer, &[Key::Space]).await?;
        sleep(self.timings.playback_start).await;
        self.driver.click_and_press(&viewer, &[]).await?;
        sleep(self.timings.intro_skip).await;

        self.enter_player_frame().await
    }

    async fn locate_video(&self, slot: VideoSlot) -> anyhow::Result<Option<String>> {
        let xpath = match slot {
            VideoSlot::Synced => Self::SYNCED_VIDEO_XPATH,
            VideoSlot::Single => Self::SINGLE_VIDEO_XPATH,
        };

        let video = match self.driver.find(Locator::XPath(xpath)).await {
            Ok(video) => video,
            Err(WebDriverError::NoSuchElement(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let source = video.attr("src").await?.unwrap_or_default();
        *self.video.lock().await = Some(video);

        Ok(Some(source))
    }

    async fn current_source(&self) -> anyhow::Result<Option<String>> {
        let video = self
            .video
            .lock()
            .await
            .clone()
            .context("No video element has been located")?;
        Ok(video.attr("src").await?)
    }

    async fn announced_duration(&self) -> anyhow::Result<Option<String>> {
        match self
            .driver
            .find(Locator::XPath(Self::DURATION_META_XPATH))
            .await
        {
            Ok(meta) => Ok(meta.attr("content").await?),
            Err(WebDriverError::NoSuchElement(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn seek_forward(&self) -> anyhow::Result<()> {
        self.driver.enter_default_frame().await?;
        let viewer = self.viewer().await?;
        sleep(self.timings.seek_settle).await;

        self.driver
            .click_and_press(&viewer, &[Key::ArrowRight; Self::SEEK_STEPS])
            .await?;

        self.enter_player_frame().await?;
        sleep(self.timings.seek_settle).await;
        Ok(())
    }

    async fn leave_player(&self) -> anyhow::Result<()> {
        self.video.lock().await.take();
        self.driver.enter_default_frame().await?;
        Ok(())
    }
}
