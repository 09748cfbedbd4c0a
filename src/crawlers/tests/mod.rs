mod catalog_tests;

use crate::crawlers::crawler::PageSession;
use crate::crawlers::pagination::find_next_link;
use crate::error::ScrapeError;
use crate::utils::slugify;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// In-memory session serving canned pages by URL; unknown URLs answer 404
pub struct ScriptedSession {
    label: &'static str,
    pages: HashMap<String, String>,
    visits: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
    load_delay: Duration,
    current: Option<String>,
    html: Option<String>,
}

impl ScriptedSession {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pages: HashMap::new(),
            visits: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
            load_delay: Duration::ZERO,
            current: None,
            html: None,
        }
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Every URL passed to `load`, in order
    pub fn visits(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.visits)
    }

    pub fn closed(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    fn label(&self) -> &'static str {
        self.label
    }

    async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.visits.lock().unwrap().push(url.to_string());
        let html = self.pages.get(url).cloned().ok_or(ScrapeError::Http {
            url: url.to_string(),
            status: 404,
        })?;
        self.current = Some(url.to_string());
        self.html = Some(html.clone());
        Ok(html)
    }

    async fn advance(&mut self) -> Result<Option<String>, ScrapeError> {
        let (Some(current), Some(html)) = (self.current.as_deref(), self.html.as_deref()) else {
            return Err(ScrapeError::NoPageLoaded);
        };
        let next = find_next_link(html, &Url::parse(current).unwrap());
        match next {
            Some(next) => self.load(next.as_str()).await.map(Some),
            None => Ok(None),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    async fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Listing page with one card per name, all located in `city, state`
pub fn listing_page(names: &[String], city: &str, state: &str, next: Option<&str>) -> String {
    let cards: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<div class="vendor-card">
                     <h3>{name}</h3>
                     <a href="/marketplace/{slug}">View</a>
                     <span>4.5 (10)</span>
                     <span>{city}, {state}</span>
                   </div>"#,
                slug = slugify(name)
            )
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<nav><a rel="next" href="{href}">Next</a></nav>"#))
        .unwrap_or_default();
    format!("<html><body><main>{cards}</main>{pager}</body></html>")
}

pub fn names(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix} Hall {i}")).collect()
}

pub fn profile_page(name: &str) -> String {
    format!(
        r#"<html><body><h1>{name}</h1><div class="guest-capacity">Up to 150 guests</div></body></html>"#
    )
}
