//! Render surfaces for pages whose glossary tooltips only exist after
//! pointer interaction.
//!
//! The browser side is expressed as three traits so the pool and the detail
//! pipeline can run against a scripted surface in tests:
//!
//! - [`Launcher`] starts a [`RenderSurface`] (one browser plus one isolated
//!   browsing context).
//! - [`RenderSurface`] opens tabs and tears itself down.
//! - [`PageTab`] navigates, waits, reads markup and drives the pointer via
//!   [`HoverSurface`].
//!
//! The Chrome implementation lives in [`chrome`] behind the `render` feature.

#[cfg(feature = "render")]
pub mod chrome;
pub mod pool;

use std::time::Duration;

use thiserror::Error;

pub use pool::RenderPool;

#[cfg(feature = "render")]
pub use chrome::{ChromeLauncher, ChromeSurface, ChromeTab};

/// Errors that can occur while driving a render surface.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to the browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to open a tab or navigate it.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// An in-page script failed.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// An operation exceeded its time budget.
    #[error("render timeout after {0}ms")]
    Timeout(u64),

    /// Wait selector not found.
    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,

    /// The page or browser process crashed.
    #[error("render target crashed: {0}")]
    Crashed(String),
}

/// Driver messages that mean the browser or its target is gone.
const FATAL_MARKERS: &[&str] = &["target closed", "target crashed", "browser closed", "connection closed", "crashed"];

impl RenderError {
    /// Build a timeout error from the budget that was exceeded.
    pub fn timeout(budget: Duration) -> Self {
        RenderError::Timeout(budget.as_millis() as u64)
    }

    /// `true` when the surface itself is unusable and must be relaunched.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::BrowserClosed | RenderError::Crashed(_) | RenderError::BrowserLaunch(_) => true,
            RenderError::Navigation(msg) | RenderError::ContentRetrieval(msg) | RenderError::Script(msg) => {
                let msg = msg.to_lowercase();
                FATAL_MARKERS.iter().any(|m| msg.contains(m))
            }
            RenderError::Timeout(_) | RenderError::SelectorNotFound(_) => false,
        }
    }
}

impl From<RenderError> for prts_core::Error {
    fn from(err: RenderError) -> Self {
        prts_core::Error::RenderFailed(err.to_string())
    }
}

/// How to find a glossary term element on the live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermLocator {
    /// Tooltip class carried by the term span.
    pub class: String,
    /// Literal text the span must contain.
    pub text: String,
}

/// Text read out of a rendered tooltip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TooltipContent {
    /// Texts of the `strong`/`b` descendants.
    pub strong_texts: Vec<String>,
    /// Texts of every other descendant.
    pub other_texts: Vec<String>,
    /// The whole tooltip text.
    pub full_text: String,
}

/// Pointer-driven access to a loaded page.
#[async_trait::async_trait]
pub trait HoverSurface: Send + Sync {
    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), RenderError>;

    /// Scroll the first element matching `target` into view and move the
    /// pointer over it. Returns how many elements matched; zero means
    /// nothing was hovered.
    async fn hover(&self, target: &TermLocator) -> Result<usize, RenderError>;

    /// Read the first element matching `selector`, if one is present.
    async fn query_tooltip(&self, selector: &str) -> Result<Option<TooltipContent>, RenderError>;

    /// Move the pointer away from any term.
    async fn reset_pointer(&self) -> Result<(), RenderError>;
}

/// One browser tab.
#[async_trait::async_trait]
pub trait PageTab: HoverSurface {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Wait until the page stops loading resources, up to `timeout`.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), RenderError>;

    /// Serialized markup of the current document.
    async fn content(&self) -> Result<String, RenderError>;

    async fn close(&self) -> Result<(), RenderError>;
}

/// A live browser with one browsing context.
#[async_trait::async_trait]
pub trait RenderSurface: Send + Sync {
    type Tab: PageTab;

    fn is_alive(&self) -> bool;

    /// Open a blank tab in the shared context.
    async fn open_tab(&self) -> Result<Self::Tab, RenderError>;

    /// Close the context, the browser and the protocol driver, in that order.
    /// Step failures are logged, never returned.
    async fn shutdown(&self);
}

/// Starts render surfaces.
#[async_trait::async_trait]
pub trait Launcher: Send + Sync {
    type Surface: RenderSurface;

    async fn launch(&self) -> Result<Self::Surface, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RenderError::BrowserClosed.is_fatal());
        assert!(RenderError::Crashed("oom".into()).is_fatal());
        assert!(RenderError::Navigation("Target closed".into()).is_fatal());
        assert!(RenderError::Script("page CRASHED".into()).is_fatal());
        assert!(!RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()).is_fatal());
        assert!(!RenderError::Script("Cannot read properties of null (reading 'target')".into()).is_fatal());
        assert!(!RenderError::Script("event.target is undefined".into()).is_fatal());
        assert!(!RenderError::Timeout(3000).is_fatal());
        assert!(!RenderError::SelectorNotFound("#mw-content-text".into()).is_fatal());
    }

    #[test]
    fn test_timeout_from_duration() {
        let err = RenderError::timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "render timeout after 3000ms");
    }

    #[test]
    fn test_into_core_error() {
        let err: prts_core::Error = RenderError::BrowserClosed.into();
        assert!(err.to_string().starts_with("RENDER_FAILED"));
    }
}
