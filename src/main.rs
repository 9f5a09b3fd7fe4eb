use tracing::{error, info};

use manga_chapter_dl::config::Manager as ConfigManager;
use manga_chapter_dl::driver::chromium::ChromiumDriver;
use manga_chapter_dl::driver::PageDriver;
use manga_chapter_dl::logger;
use manga_chapter_dl::request::Client;
use manga_chapter_dl::task::Runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 配置文件路径取第一个参数，缺省当前目录的 config.json
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    let _guard = logger::init(&logger::default_log_dir())?;

    let mut manager = ConfigManager::new(config_path.into());
    manager.load_or_default()?;
    let config = manager.config.clone();
    info!(path = %manager.config_path.display(), "configuration loaded");

    let proxy = (!config.proxy_url.is_empty()).then(|| config.proxy_url.clone());
    let client = Client::new(proxy)?;
    // 未知站点是配置错误，直接终止
    let runner = Runner::new(config.clone(), client)?;

    let driver: Box<dyn PageDriver> = Box::new(ChromiumDriver::launch(&config.driver).await?);
    let run_result = runner.run(driver.as_ref()).await;
    if let Err(e) = driver.close().await {
        error!(error = %e, "failed to close browser session");
    }

    let report = run_result?;
    if !report.abandoned_chapters.is_empty() {
        error!(
            chapters = ?report.abandoned_chapters,
            "some chapters were abandoned after all retries"
        );
    }
    Ok(())
}
