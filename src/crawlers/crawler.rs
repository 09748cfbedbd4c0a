use crate::error::ScrapeError;
use async_trait::async_trait;

/// A navigation session that yields page HTML.
///
/// One session is driven by exactly one caller at a time, and pages are
/// visited strictly in order.
#[async_trait]
pub trait PageSession: Send {
    /// Short name for logs
    fn label(&self) -> &'static str;

    /// Navigate to `url` and return its HTML
    async fn load(&mut self, url: &str) -> Result<String, ScrapeError>;

    /// Follow the current page's "next" control.
    ///
    /// `Ok(None)` means no next control could be found.
    async fn advance(&mut self) -> Result<Option<String>, ScrapeError>;

    /// URL of the page most recently loaded
    fn current_url(&self) -> Option<&str>;

    /// Release whatever the session holds; safe to call more than once
    async fn close(&mut self);
}

/// The sessions a batch navigates with
pub struct Sessions {
    pub primary: Box<dyn PageSession>,
    /// Tried for a region when the primary cannot load it
    pub fallback: Option<Box<dyn PageSession>>,
}

impl Sessions {
    pub fn new(primary: Box<dyn PageSession>, fallback: Option<Box<dyn PageSession>>) -> Self {
        Self { primary, fallback }
    }

    /// Close every session
    pub async fn close(&mut self) {
        self.primary.close().await;
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.close().await;
        }
    }
}
