use crate::config::{DelayRange, HarvestConfig};
use crate::crawlers::crawler::PageSession;
use crate::crawlers::fingerprint::{Fingerprint, pause};
use crate::crawlers::pagination::find_next_link;
use crate::error::ScrapeError;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use url::Url;

/// Ports WebDriver servers commonly listen on
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver
    "http://localhost:4723", // Appium
    "http://localhost:9222", // Chrome debug port
    "http://127.0.0.1:4444",
];

const HIDE_AUTOMATION: &str = "Object.defineProperty(navigator, 'webdriver', {get: () => undefined}); \
     window.chrome = window.chrome || {runtime: {}};";

const LOAD_STATE: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

const IDLE_POLL: Duration = Duration::from_millis(500);
/// Consecutive polls with no new resources before the page counts as idle
const IDLE_STABLE_POLLS: usize = 2;

/// Buttons that page through results via script instead of links
const CLICKABLE_NEXT: [&str; 4] = [
    r#"button[aria-label*="Next"]"#,
    r#"button[aria-label*="next"]"#,
    r#"button[class*="next"]"#,
    r#"[role="button"][aria-label*="Next"]"#,
];
const CLICKABLE_NEXT_XPATH: &str = "//button[normalize-space()='Next' or normalize-space()='›' \
     or normalize-space()='→' or normalize-space()='>']";

/// Starts browser sessions against a WebDriver server
pub struct RenderAgent;

impl RenderAgent {
    /// Connect to WebDriver with a fresh fingerprint.
    ///
    /// The configured URL is tried first, then the usual local ports.
    pub async fn open(config: &HarvestConfig) -> Result<RenderSession, ScrapeError> {
        let fingerprint = Fingerprint::random();
        let capabilities = chrome_capabilities(&fingerprint, config.headless);

        let mut tried = vec![config.webdriver_url.clone()];
        tried.extend(
            FALLBACK_WEBDRIVER_URLS
                .iter()
                .filter(|url| **url != config.webdriver_url)
                .map(|url| url.to_string()),
        );

        for url in &tried {
            let mut builder = ClientBuilder::native();
            builder.capabilities(capabilities.clone());
            match builder.connect(url).await {
                Ok(client) => {
                    ::log::info!("Connected to WebDriver at {}", url);
                    let (width, height) = fingerprint.viewport;
                    if let Err(e) = client.set_window_size(width, height).await {
                        ::log::debug!("Could not resize window: {}", e);
                    }
                    return Ok(RenderSession {
                        client: Some(client),
                        current: None,
                        html: None,
                        navigation_timeout: config.navigation_timeout(),
                        pre_delay: config.pre_nav_delay,
                        post_delay: config.post_nav_delay,
                    });
                }
                Err(e) => ::log::debug!("No WebDriver at {}: {}", url, e),
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(ScrapeError::RenderInit(format!(
            "no WebDriver answered at {}",
            tried.join(", ")
        )))
    }
}

fn chrome_capabilities(fingerprint: &Fingerprint, headless: bool) -> Map<String, Value> {
    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": fingerprint.chrome_args(headless),
            "excludeSwitches": ["enable-automation"],
            "useAutomationExtension": false,
        }),
    );
    capabilities
}

/// A live browser session.
///
/// Call `close` when done; the browser is not released on drop.
pub struct RenderSession {
    client: Option<Client>,
    current: Option<String>,
    html: Option<String>,
    navigation_timeout: Duration,
    pre_delay: DelayRange,
    post_delay: DelayRange,
}

impl RenderSession {
    fn client(&self) -> Result<&Client, ScrapeError> {
        self.client.as_ref().ok_or(ScrapeError::NoPageLoaded)
    }

    /// Settle, hide automation markers, then read the page
    async fn capture(&mut self, url: &str) -> Result<String, ScrapeError> {
        let budget = self.navigation_timeout;
        let client = self.client()?;
        wait_for_network_idle(client, budget).await;
        if let Err(e) = client.execute(HIDE_AUTOMATION, vec![]).await {
            ::log::debug!("Could not patch navigator on {}: {}", url, e);
        }
        let html = client
            .source()
            .await
            .map_err(|e| navigation_error(url, e))?;
        let current = match client.current_url().await {
            Ok(current) => current.to_string(),
            Err(_) => url.to_string(),
        };

        pause(self.post_delay).await;
        self.current = Some(current);
        self.html = Some(html.clone());
        Ok(html)
    }

    /// Click a script-driven next button, if the page has one
    async fn click_next(&mut self) -> Result<Option<String>, ScrapeError> {
        let url = self.current.clone().unwrap_or_default();
        let previous = self.html.clone();
        let client = self.client()?;

        let mut button = None;
        for css in CLICKABLE_NEXT {
            if let Ok(element) = client.find(Locator::Css(css)).await {
                button = Some(element);
                break;
            }
        }
        if button.is_none() {
            button = client.find(Locator::XPath(CLICKABLE_NEXT_XPATH)).await.ok();
        }
        let Some(button) = button else {
            return Ok(None);
        };

        pause(self.pre_delay).await;
        button.click().await.map_err(|e| navigation_error(&url, e))?;
        let html = self.capture(&url).await?;
        if previous.as_deref() == Some(html.as_str()) {
            ::log::debug!("Next button on {} changed nothing", url);
            return Ok(None);
        }
        Ok(Some(html))
    }
}

#[async_trait]
impl PageSession for RenderSession {
    fn label(&self) -> &'static str {
        "render"
    }

    async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
        pause(self.pre_delay).await;
        let client = self.client()?;
        let limit = self.navigation_timeout;

        match timeout(limit, client.goto(url)).await {
            Err(_) => {
                return Err(ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                });
            }
            Ok(Err(e)) => return Err(navigation_error(url, e)),
            Ok(Ok(())) => {}
        }
        self.capture(url).await
    }

    async fn advance(&mut self) -> Result<Option<String>, ScrapeError> {
        let (Some(current), Some(html)) = (self.current.as_deref(), self.html.as_deref()) else {
            return Err(ScrapeError::NoPageLoaded);
        };
        let base = Url::parse(current).map_err(|e| ScrapeError::Navigation {
            url: current.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(next) = find_next_link(html, &base) {
            ::log::debug!("Following next link {}", next);
            return self.load(next.as_str()).await.map(Some);
        }
        self.click_next().await
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }
}

/// Tracks load-state polls until the page settles or the budget runs out
struct IdleWatch {
    deadline: Instant,
    last_count: Option<u64>,
    stable: usize,
}

impl IdleWatch {
    fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
            last_count: None,
            stable: 0,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Feed one `[readyState, resourceCount]` poll; true once the page is idle
    fn observe(&mut self, state: &Value) -> bool {
        let complete = state.get(0).and_then(Value::as_str) == Some("complete");
        let count = state.get(1).and_then(Value::as_u64);
        if complete && count.is_some() && count == self.last_count {
            self.stable += 1;
        } else {
            self.stable = 0;
        }
        self.last_count = count;
        self.stable >= IDLE_STABLE_POLLS
    }
}

/// Poll until the document is complete and no new resources appear, or `budget` elapses
async fn wait_for_network_idle(client: &Client, budget: Duration) {
    let mut watch = IdleWatch::new(budget);
    while !watch.expired() {
        if let Ok(state) = client.execute(LOAD_STATE, vec![]).await {
            if watch.observe(&state) {
                return;
            }
        }
        sleep(IDLE_POLL).await;
    }
    ::log::debug!("Network did not settle within {:?}", budget);
}

fn navigation_error(url: &str, error: CmdError) -> ScrapeError {
    if error.to_string().contains("Unable to find session") {
        ::log::warn!("Lost WebDriver session while loading {}", url);
    }
    ScrapeError::Navigation {
        url: url.to_string(),
        reason: error.to_string(),
    }
}
