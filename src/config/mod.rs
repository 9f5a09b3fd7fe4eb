use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// 运行配置。所有字段带默认值，配置文件可以只写需要覆盖的部分。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 作品主页地址，站点配置按它的域名解析
    pub base_url: String,
    pub start_chapter: u32,
    pub end_chapter: u32,
    /// 章节目录的根输出路径
    pub output_dir: String,
    pub proxy_url: String,
    pub driver: DriverOptions,
    pub crawl: CrawlOptions,
    pub download: DownloadOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            start_chapter: 1,
            end_chapter: 1,
            output_dir: "Chapters".to_string(),
            proxy_url: String::new(),
            driver: DriverOptions::default(),
            crawl: CrawlOptions::default(),
            download: DownloadOptions::default(),
        }
    }
}

/// 浏览器会话选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    pub headless: bool,
    pub ignore_ssl_errors: bool,
    pub allow_insecure_content: bool,
    /// 不设置则让浏览器库自行探测
    pub chrome_path: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            headless: false,
            ignore_ssl_errors: true,
            allow_insecure_content: true,
            chrome_path: None,
        }
    }
}

/// 页面滚动与稳定相关的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// 每步向下滚动的像素数
    pub scroll_step_px: u32,
    /// 向下滚动每步之间的停顿，懒加载需要时间发起请求
    pub scroll_pause_ms: u64,
    /// 回滚到顶部时每步的停顿，内容已渲染过，可以更快
    pub scroll_up_pause_ms: u64,
    /// 判定到底时允许的误差像素
    pub bottom_slack_px: u32,
    /// 滚动步数上限，超过视为页面无法稳定
    pub max_scroll_steps: u32,
    /// 高度稳定后等待尾部异步加载的时间
    pub settle_secs: u64,
    /// 导航完成后等待首屏渲染的时间
    pub initial_settle_secs: u64,
    pub navigation_timeout_secs: u64,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            scroll_step_px: 1000,
            scroll_pause_ms: 100,
            scroll_up_pause_ms: 30,
            bottom_slack_px: 10,
            max_scroll_steps: 600,
            settle_secs: 3,
            initial_settle_secs: 5,
            navigation_timeout_secs: 30,
        }
    }
}

/// 图片下载相关的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// 单章节内的并发下载数
    pub workers: usize,
    /// 小于该字节数的图片视为占位图，按失败处理
    pub min_image_size: usize,
    pub fetch_timeout_secs: u64,
    /// 章节整体重试上限
    pub retry_limit: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            workers: 5,
            min_image_size: 100,
            fetch_timeout_secs: 10,
            retry_limit: 3,
        }
    }
}

pub struct Manager {
    pub config: Config,
    pub config_path: PathBuf,
}

impl Manager {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config: Config::default(),
            config_path,
        }
    }

    /// 配置文件存在则读取，不存在则用默认值落盘一份方便修改。
    pub fn load_or_default(&mut self) -> anyhow::Result<()> {
        if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            self.config = serde_json::from_str(&data)?;
        } else {
            self.save()?;
        }
        Ok(())
    }

    pub fn save(&mut self) -> anyhow::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.config_path, data)?;
        Ok(())
    }
}
