//! Web browser presentation for the token flow.

use crate::errors::{NationBuilderError, NationBuilderResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// Presents the authorization page to the user.
///
/// The redirect comes back out of band, through
/// [`crate::Authenticator::finish_browser_authentication`].
pub trait WebBrowser: Send + Sync {
    /// Shows `url`. An error aborts the flow with a `WebBrowser` error.
    fn present(&self, url: &Url) -> NationBuilderResult<()>;

    /// Hides the browser once the flow ended.
    fn dismiss(&self) {}
}

/// Browser double that records what it was asked to show.
#[derive(Default)]
pub struct MockWebBrowser {
    presented: Mutex<Vec<Url>>,
    dismissals: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl MockWebBrowser {
    /// Create new mock browser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent presentation fail with `message`.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    /// URLs presented so far.
    pub fn presented_urls(&self) -> Vec<Url> {
        self.presented.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of times the browser was dismissed.
    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }
}

impl WebBrowser for MockWebBrowser {
    fn present(&self, url: &Url) -> NationBuilderResult<()> {
        if let Some(message) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(NationBuilderError::web_browser(message));
        }
        if let Ok(mut presented) = self.presented.lock() {
            presented.push(url.clone());
        }
        Ok(())
    }

    fn dismiss(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
    }
}
