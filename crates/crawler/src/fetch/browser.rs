// ABOUTME: Headless Chromium page fetcher built on chromiumoxide.
// ABOUTME: One browser process per fetch; it is always torn down before the call returns.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{PageFetcher, RenderedPage};
use crate::error::CrawlError;
use crate::guard::{ensure_public_host, validate_url};
use crate::options::CrawlerOptions;

/// Walks the rendered DOM and joins the text of nodes a human would see.
const VISIBLE_TEXT_JS: &str = r#"(() => {
  const skip = new Set(['SCRIPT','STYLE','NOSCRIPT','TEMPLATE','SVG','IFRAME','OBJECT','CANVAS','HEAD']);
  const out = [];
  const walk = (el) => {
    if (skip.has(el.tagName)) return;
    if (el.hidden || el.getAttribute('aria-hidden') === 'true') return;
    const cs = window.getComputedStyle(el);
    if (cs.display === 'none' || cs.visibility === 'hidden' || cs.opacity === '0') return;
    for (const child of el.childNodes) {
      if (child.nodeType === Node.TEXT_NODE) {
        const t = child.textContent.trim();
        if (t) out.push(t);
      } else if (child.nodeType === Node.ELEMENT_NODE) {
        walk(child);
      }
    }
  };
  if (document.body) walk(document.body);
  return out.join(' ');
})()"#;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("LORE_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["chromium", "chromium-browser", "google-chrome", "google-chrome-stable"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Fetcher that renders pages in headless Chromium.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    opts: CrawlerOptions,
}

/// A running browser and the task pumping its CDP events.
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Session {
    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "browser close failed, killing");
        }
        if self.browser.wait().await.is_err() {
            let _ = self.browser.kill().await;
        }
        self.handler.abort();
    }
}

impl BrowserFetcher {
    pub fn new(opts: CrawlerOptions) -> Self {
        Self { opts }
    }

    async fn launch(&self, url: &str) -> Result<Session, CrawlError> {
        let chrome_path = self
            .opts
            .chromium_path
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                CrawlError::browser(url, "Launch", Some(anyhow::anyhow!("Chromium not found")))
            })?;

        let (width, height) = self.opts.viewport;
        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", self.opts.user_agent))
            .window_size(width, height)
            .build()
            .map_err(|e| {
                CrawlError::browser(
                    url,
                    "Launch",
                    Some(anyhow::anyhow!("failed to build browser config: {}", e)),
                )
            })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            CrawlError::browser(
                url,
                "Launch",
                Some(anyhow::anyhow!("failed to launch Chromium: {}", e)),
            )
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Session { browser, handler })
    }

    async fn render(&self, session: &Session, url: &str) -> Result<RenderedPage, CrawlError> {
        let page = session.browser.new_page("about:blank").await.map_err(|e| {
            CrawlError::browser(url, "NewPage", Some(anyhow::anyhow!("{}", e)))
        })?;

        let result = self.navigate_and_read(&page, url).await;
        let _ = page.close().await;
        result
    }

    async fn navigate_and_read(&self, page: &Page, url: &str) -> Result<RenderedPage, CrawlError> {
        let nav_ms = self.opts.nav_timeout.as_millis();
        match tokio::time::timeout(self.opts.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(CrawlError::browser(
                    url,
                    "Navigate",
                    Some(anyhow::anyhow!("navigation failed: {}", e)),
                ))
            }
            Err(_) => {
                return Err(CrawlError::timeout(
                    url,
                    "Navigate",
                    Some(anyhow::anyhow!("navigation timed out after {}ms", nav_ms)),
                ))
            }
        }

        tokio::time::sleep(self.opts.settle_delay).await;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        // Navigation may have been redirected somewhere internal.
        if let Ok(parsed) = url::Url::parse(&final_url) {
            if parsed.scheme() == "http" || parsed.scheme() == "https" {
                ensure_public_host(&parsed, self.opts.allow_private_networks).await?;
            }
        }

        let html = page.content().await.map_err(|e| {
            CrawlError::browser(url, "Content", Some(anyhow::anyhow!("failed to get HTML: {}", e)))
        })?;

        let visible_text = match page.evaluate(VISIBLE_TEXT_JS).await {
            Ok(result) => result.into_value::<String>().ok(),
            Err(e) => {
                tracing::debug!(url, error = %e, "visible text evaluation failed");
                None
            }
        };

        Ok(RenderedPage {
            url: url.to_string(),
            final_url,
            html,
            visible_text,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        let parsed = validate_url(url, self.opts.allow_private_networks)?;
        ensure_public_host(&parsed, self.opts.allow_private_networks).await?;

        let session = self.launch(url).await?;
        let result = self.render(&session, url).await;
        session.shutdown().await;
        result
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
