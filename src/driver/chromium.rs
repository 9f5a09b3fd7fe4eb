use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

use super::PageDriver;
use crate::config::DriverOptions;

/// 基于 chromiumoxide 的页面驱动。整个运行期间只开一个页面，
/// 章节之间复用同一个会话。
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    pub async fn launch(opts: &DriverOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &opts.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if opts.headless {
            builder = builder.arg("--headless=new").arg("--disable-gpu");
        } else {
            builder = builder.with_head();
        }
        if opts.ignore_ssl_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if opts.allow_insecure_content {
            builder = builder.arg("--allow-running-insecure-content");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        // CDP 事件循环
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        info!(headless = opts.headless, "browser session started");
        Ok(Self {
            browser,
            page,
            handler: handle,
        })
    }
}

// 在同一个超时预算内执行一段等待，预算耗尽返回 None。
// 导航和后续的 load 等待共用一份预算，整体不超过 timeout_ms。
async fn with_deadline<T>(
    budget: Duration,
    started: Instant,
    fut: impl Future<Output = T>,
) -> Option<T> {
    let remaining = budget.saturating_sub(started.elapsed());
    tokio::time::timeout(remaining, fut).await.ok()
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        let budget = Duration::from_millis(timeout_ms);
        let started = Instant::now();

        match with_deadline(budget, started, self.page.goto(url)).await {
            Some(Ok(_)) => {}
            Some(Err(e)) => bail!("navigation failed: {e}"),
            None => bail!("navigation timed out after {timeout_ms}ms"),
        }
        // load 事件可能一直不来，等待同样受预算约束
        match with_deadline(budget, started, self.page.wait_for_navigation()).await {
            Some(_) => Ok(()),
            None => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("script execution failed")?;
        // 表达式可能没有返回值（例如 scrollBy），统一成 Null
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut browser = this.browser;
        browser.close().await.context("failed to close browser")?;
        let _ = this.handler.await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_completes_within_budget() {
        let started = Instant::now();
        let result = with_deadline(Duration::from_secs(2), started, async { 7 }).await;
        assert_eq!(result, Some(7));
    }

    #[tokio::test]
    async fn test_with_deadline_cuts_off_slow_wait() {
        // 预算 50ms，等待 5s 的 load 事件必须被掐断
        let started = Instant::now();
        let result = with_deadline(
            Duration::from_millis(50),
            started,
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_with_deadline_respects_already_spent_budget() {
        // 预算在前一阶段已经用完，后续等待立即超时
        let started = Instant::now() - Duration::from_secs(1);
        let result = with_deadline(
            Duration::from_millis(100),
            started,
            tokio::time::sleep(Duration::from_millis(1)),
        )
        .await;
        assert!(result.is_none());
    }
}
