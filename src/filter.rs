use regex::Regex;
use url::Url;

/// Configuration for filtering anchors found on listing pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilterConfig {
    /// Only accept links on this host or its subdomains (None accepts any host)
    pub required_domain: Option<String>,

    /// Regex patterns for URLs that can never be detail pages
    pub exclude_patterns: Vec<String>,
}

/// Asset files and account pages
pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff2?|ttf|eot|pdf)(\?.*)?$".to_string(),
        r"(?i)/(login|signup|sign-up|account|cart)(/|$)".to_string(),
    ]
}

impl Default for LinkFilterConfig {
    fn default() -> Self {
        Self {
            required_domain: None,
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Resolves and vets hrefs pulled out of scraped markup
#[derive(Debug, Clone)]
pub struct LinkFilter {
    config: LinkFilterConfig,
    exclude_regexes: Vec<Regex>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::for_site(None)
    }
}

impl LinkFilter {
    /// Create a new link filter from configuration
    pub fn new(config: LinkFilterConfig) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            config,
            exclude_regexes,
        })
    }

    /// Filter scoped to the host of `site_root`, with the default exclusions
    pub fn for_site(site_root: Option<&Url>) -> Self {
        let config = LinkFilterConfig {
            required_domain: site_root.and_then(|u| u.host_str()).map(|h| h.to_string()),
            ..LinkFilterConfig::default()
        };
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            config,
            exclude_regexes,
        }
    }

    /// Resolve an anchor href and return it if it can point at another page
    pub fn accept_link(&self, href: &str, base: Option<&Url>) -> Option<String> {
        let url = resolve(href, base)?;
        if !self.is_in_domain_scope(&url) {
            return None;
        }

        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return None;
        }

        Some(normalize_url(&url).to_string())
    }

    /// Resolve an image source; asset exclusions do not apply here
    pub fn accept_image(&self, src: &str, base: Option<&Url>) -> Option<String> {
        if src.trim_start().starts_with("data:") {
            return None;
        }
        resolve(src, base).map(|u| u.to_string())
    }

    /// Check if a URL is on the required host or one of its subdomains
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        let Some(required) = &self.config.required_domain else {
            return true;
        };
        match url.host_str() {
            Some(host) => host == required || host.ends_with(&format!(".{required}")),
            None => false,
        }
    }
}

/// Resolve `href` against `base`, rejecting pseudo-links and non-HTTP schemes.
///
/// Without a base, only absolute URLs resolve.
pub fn resolve(href: &str, base: Option<&Url>) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Strip the fragment so the same page is not seen twice
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}
