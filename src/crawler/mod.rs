pub mod locate;
pub mod scroll;

use std::time::Duration;
use tracing::debug;

use crate::config::CrawlOptions;
use crate::driver::PageDriver;

pub use locate::locate_images;
pub use scroll::stabilize_page;

/// 页面上定位到的一张图片。ordinal 按文档顺序从 1 开始，
/// 决定落盘文件名，一次抓取内保持稳定。
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub ordinal: usize,
    pub source: String,
}

/// 加载并稳定一个章节页面，返回按文档顺序排列的图片列表。
/// 导航、稳定、定位任一步失败都向上抛，由章节层按一次失败重试。
pub async fn crawl_chapter_page(
    driver: &dyn PageDriver,
    url: &str,
    image_selector: &str,
    opts: &CrawlOptions,
) -> anyhow::Result<Vec<ImageRef>> {
    driver
        .navigate(url, opts.navigation_timeout_secs * 1000)
        .await?;
    // 等首屏渲染完成再开始滚动
    tokio::time::sleep(Duration::from_secs(opts.initial_settle_secs)).await;

    scroll::stabilize_page(driver, opts).await?;

    let refs = locate::locate_images(driver, image_selector).await?;
    debug!(url, count = refs.len(), "chapter page crawled");
    Ok(refs)
}
