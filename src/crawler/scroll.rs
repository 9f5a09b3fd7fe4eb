use anyhow::{bail, Context};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::CrawlOptions;
use crate::driver::PageDriver;

// 一次脚本往返读齐滚动判定需要的三个指标
pub(crate) const PAGE_METRICS_JS: &str =
    "({ height: document.body.scrollHeight, offset: window.pageYOffset, viewport: window.innerHeight })";

pub(crate) const SCROLL_TO_TOP_JS: &str = "window.scrollTo(0, 0)";

pub(crate) fn scroll_by_js(delta: i64) -> String {
    format!("window.scrollBy(0, {})", delta)
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PageMetrics {
    height: f64,
    offset: f64,
    viewport: f64,
}

async fn read_metrics(driver: &dyn PageDriver) -> anyhow::Result<PageMetrics> {
    let value = driver.execute_script(PAGE_METRICS_JS).await?;
    serde_json::from_value(value).context("无法解析页面滚动指标")
}

/// 向下滚动到页面高度稳定，再回到顶部。
///
/// 到底的判定要两个信号同时成立：高度比上一步没有增长，
/// 且当前滚动位置加视口高度已经贴近总高度（slack 以内）。
/// 只看高度不动会被异步加载途中的高度平台误判。
/// 步数超过 max_scroll_steps 按稳定失败处理，留给章节层重试。
pub async fn stabilize_page(driver: &dyn PageDriver, opts: &CrawlOptions) -> anyhow::Result<()> {
    let mut last_height = read_metrics(driver).await?.height;
    let mut steps = 0u32;
    loop {
        steps += 1;
        if steps > opts.max_scroll_steps {
            bail!("页面滚动 {} 步后高度仍未稳定", opts.max_scroll_steps);
        }

        driver
            .execute_script(&scroll_by_js(opts.scroll_step_px as i64))
            .await?;
        tokio::time::sleep(Duration::from_millis(opts.scroll_pause_ms)).await;

        let m = read_metrics(driver).await?;
        let at_bottom = m.offset + m.viewport + opts.bottom_slack_px as f64 >= m.height;
        if m.height <= last_height && at_bottom {
            debug!(steps, height = m.height, "page height stabilized");
            break;
        }
        last_height = m.height;
    }

    // 给尾部的异步加载留时间
    tokio::time::sleep(Duration::from_secs(opts.settle_secs)).await;

    // 分步回滚，每步不超过剩余距离；回程不用等加载，停顿更短
    let mut remaining = read_metrics(driver).await?.offset;
    while remaining > 0.0 {
        let step = (opts.scroll_step_px as f64).min(remaining);
        driver.execute_script(&scroll_by_js(-(step as i64))).await?;
        tokio::time::sleep(Duration::from_millis(opts.scroll_up_pause_ms)).await;
        remaining -= step;
    }
    driver.execute_script(SCROLL_TO_TOP_JS).await?;
    Ok(())
}
