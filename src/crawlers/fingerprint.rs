use crate::config::DelayRange;
use rand::Rng;
use std::time::Duration;

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const VIEWPORTS: [(u32, u32); 5] = [
    (1920, 1080),
    (1536, 864),
    (1440, 900),
    (1366, 768),
    (1280, 800),
];

const ACCEPT_LANGUAGES: [&str; 3] = [
    "en-US,en;q=0.9",
    "en-US,en;q=0.8",
    "en-GB,en;q=0.9,en-US;q=0.8",
];

/// Browser identity presented to the directory site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: &'static str,
    pub viewport: (u32, u32),
    pub accept_language: &'static str,
}

impl Fingerprint {
    /// Draw a fingerprint from the fixed pools
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            user_agent: USER_AGENTS[rng.random_range(0..USER_AGENTS.len())],
            viewport: VIEWPORTS[rng.random_range(0..VIEWPORTS.len())],
            accept_language: ACCEPT_LANGUAGES[rng.random_range(0..ACCEPT_LANGUAGES.len())],
        }
    }

    /// Request headers a real browser with this identity would send
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("User-Agent", self.user_agent.to_string()),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                    .to_string(),
            ),
            ("Accept-Language", self.accept_language.to_string()),
            ("Cache-Control", "no-cache".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "none".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
        ]
    }

    /// Chrome command line carrying this identity, with automation hints off
    pub fn chrome_args(&self, headless: bool) -> Vec<String> {
        let (width, height) = self.viewport;
        let language = self
            .accept_language
            .split(',')
            .next()
            .unwrap_or("en-US");

        let mut args = vec![
            format!("--user-agent={}", self.user_agent),
            format!("--window-size={width},{height}"),
            format!("--lang={language}"),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if headless {
            args.push("--headless=new".to_string());
        }
        args
    }
}

/// Pick a duration inside the range
pub fn sample_delay(range: DelayRange) -> Duration {
    if range.max_ms <= range.min_ms {
        return Duration::from_millis(range.min_ms);
    }
    Duration::from_millis(rand::rng().random_range(range.min_ms..=range.max_ms))
}

/// Sleep for a random time inside the range
pub async fn pause(range: DelayRange) {
    if range.is_zero() {
        return;
    }
    let delay = sample_delay(range);
    ::log::trace!("Pausing {}ms", delay.as_millis());
    tokio::time::sleep(delay).await;
}
