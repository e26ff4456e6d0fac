//! Headless Chrome/Chromium render surface using chromiumoxide.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::layout::Point;
use chromiumoxide::{Handler, Page};
use futures_util::StreamExt;
use prts_core::config::BrowserSettings;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{HoverSurface, Launcher, PageTab, RenderError, RenderSurface, TermLocator, TooltipContent};

/// Where the pointer is parked between two hovers.
const POINTER_REST: (f64, f64) = (100.0, 100.0);
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Launches one headless browser with an isolated browsing context.
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let s = &self.settings;
        let mut builder = BrowserConfig::builder()
            .window_size(s.viewport_width, s.viewport_height)
            .viewport(Viewport { width: s.viewport_width, height: s.viewport_height, ..Default::default() })
            .launch_timeout(Duration::from_millis(s.launch_timeout_ms))
            .args(s.args.iter().map(String::as_str))
            .arg(format!("--user-agent={}", s.user_agent));
        if !s.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(RenderError::BrowserLaunch)
    }
}

#[async_trait::async_trait]
impl Launcher for ChromeLauncher {
    type Surface = ChromeSurface;

    async fn launch(&self) -> Result<ChromeSurface, RenderError> {
        let (mut browser, handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler = spawn_handler_task(handler, Arc::clone(&closed));

        let context = match browser.create_browser_context(CreateBrowserContextParams::default()).await {
            Ok(id) => id,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(RenderError::BrowserLaunch(format!("browser context: {e}")));
            }
        };

        tracing::info!(headless = self.settings.headless, "browser launched");
        Ok(ChromeSurface { browser: Mutex::new(browser), context, handler, closed })
    }
}

/// Drive the protocol event stream until the connection ends, then mark the
/// surface closed.
fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("browser handler event error: {e}");
            }
        }
        closed.store(true, Ordering::SeqCst);
    })
}

/// A running browser plus its browsing context and protocol driver task.
pub struct ChromeSurface {
    browser: Mutex<Browser>,
    context: BrowserContextId,
    handler: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl RenderSurface for ChromeSurface {
    type Tab = ChromeTab;

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.handler.is_finished()
    }

    async fn open_tab(&self) -> Result<ChromeTab, RenderError> {
        if !self.is_alive() {
            return Err(RenderError::BrowserClosed);
        }
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.context.clone());

        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        Ok(ChromeTab { page })
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;

        if let Err(e) = browser.dispose_browser_context(self.context.clone()).await {
            tracing::warn!("closing browser context failed: {e}");
        }
        if let Err(e) = browser.close().await {
            tracing::warn!("closing browser failed: {e}");
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("waiting for browser exit failed: {e}");
        }
        self.handler.abort();
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One page of the shared browsing context.
pub struct ChromeTab {
    page: Page,
}

#[derive(Debug, Deserialize)]
struct HoverTarget {
    count: usize,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct RawTooltip {
    found: bool,
    #[serde(default)]
    strong: Vec<String>,
    #[serde(default)]
    other: Vec<String>,
    #[serde(default)]
    full: String,
}

fn hover_script(target: &TermLocator) -> Result<String, RenderError> {
    let class = serde_json::to_string(&target.class).map_err(|e| RenderError::Script(e.to_string()))?;
    let text = serde_json::to_string(&target.text).map_err(|e| RenderError::Script(e.to_string()))?;
    Ok(format!(
        r#"(() => {{
            const text = {text};
            const matches = Array.from(document.getElementsByClassName({class}))
                .filter(el => el.tagName === 'SPAN' && (el.textContent || '').includes(text));
            if (matches.length === 0) return {{ count: 0, x: 0, y: 0 }};
            const el = matches[0];
            el.scrollIntoView({{ block: 'center', inline: 'center' }});
            const r = el.getBoundingClientRect();
            return {{ count: matches.length, x: r.left + r.width / 2, y: r.top + r.height / 2 }};
        }})()"#
    ))
}

fn tooltip_script(selector: &str) -> Result<String, RenderError> {
    let selector = serde_json::to_string(selector).map_err(|e| RenderError::Script(e.to_string()))?;
    Ok(format!(
        r#"(() => {{
            const tip = document.querySelector({selector});
            if (!tip) return {{ found: false }};
            const texts = nodes => Array.from(nodes).map(e => (e.innerText || '').trim()).filter(Boolean);
            return {{
                found: true,
                strong: texts(tip.querySelectorAll('strong, b')),
                other: texts(tip.querySelectorAll(':not(strong):not(b)')),
                full: (tip.innerText || '').trim(),
            }};
        }})()"#
    ))
}

/// Resolves once `document.readyState` is complete and the resource count
/// has been stable for half a second, or after `budget_ms`.
fn network_idle_script(budget_ms: u64) -> String {
    format!(
        r#"(async () => {{
            const deadline = Date.now() + {budget_ms};
            const interval = 250;
            const requiredStableMs = 500;
            let last = performance.getEntriesByType('resource').length;
            let stableMs = 0;
            while (Date.now() < deadline) {{
                await new Promise(r => setTimeout(r, interval));
                const current = performance.getEntriesByType('resource').length;
                if (document.readyState === 'complete' && current === last) {{
                    stableMs += interval;
                    if (stableMs >= requiredStableMs) return true;
                }} else {{
                    stableMs = 0;
                }}
                last = current;
            }}
            return false;
        }})()"#
    )
}

impl ChromeTab {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, RenderError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| RenderError::Script(e.to_string()))
    }
}

#[async_trait::async_trait]
impl HoverSurface for ChromeTab {
    async fn ping(&self) -> Result<(), RenderError> {
        self.eval::<String>("document.title".to_string()).await.map(|_| ())
    }

    async fn hover(&self, target: &TermLocator) -> Result<usize, RenderError> {
        let found: HoverTarget = self.eval(hover_script(target)?).await?;
        if found.count > 0 {
            self.page
                .move_mouse(Point::new(found.x, found.y))
                .await
                .map_err(|e| RenderError::Script(e.to_string()))?;
        }
        Ok(found.count)
    }

    async fn query_tooltip(&self, selector: &str) -> Result<Option<TooltipContent>, RenderError> {
        let raw: RawTooltip = self.eval(tooltip_script(selector)?).await?;
        Ok(raw.found.then(|| TooltipContent { strong_texts: raw.strong, other_texts: raw.other, full_text: raw.full }))
    }

    async fn reset_pointer(&self) -> Result<(), RenderError> {
        self.page
            .move_mouse(Point::new(POINTER_REST.0, POINTER_REST.1))
            .await
            .map(|_| ())
            .map_err(|e| RenderError::Script(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PageTab for ChromeTab {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| RenderError::timeout(timeout))?
            .map(|_| ())
            .map_err(|e| RenderError::Navigation(e.to_string()))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| RenderError::SelectorNotFound(selector.to_string()))
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), RenderError> {
        let budget_ms = timeout.as_millis() as u64;
        let settled = tokio::time::timeout(timeout + SELECTOR_POLL, self.eval::<bool>(network_idle_script(budget_ms)))
            .await
            .map_err(|_| RenderError::timeout(timeout))??;
        if !settled {
            tracing::debug!(budget_ms, "network did not go idle, continuing");
        }
        Ok(())
    }

    async fn content(&self) -> Result<String, RenderError> {
        self.page
            .content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))
    }

    async fn close(&self) -> Result<(), RenderError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))
    }
}
