use futures_util::{stream, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler;
use crate::download::{self, FetchOutcome, Fetcher};
use crate::driver::PageDriver;
use crate::request::Client;
use crate::sites::{self, SiteError, SiteProfile};
use crate::task::{ChapterJob, ChapterRecord, ChapterResult, ChapterState, RunReport, RunTotals};

/// 整次运行的调度器。
///
/// 外层章节串行：页面驱动会话有状态，不能并发复用；
/// 内层图片并发：有界 worker 池，见 [`collect_bounded`]。
pub struct Runner {
    config: Config,
    profile: &'static SiteProfile,
    fetcher: Fetcher,
    output_root: PathBuf,
}

impl Runner {
    /// 解析站点配置并构建运行器。未知站点在这里直接失败，
    /// 属于配置错误，不会进入任何章节处理。
    pub fn new(config: Config, client: Client) -> Result<Self, SiteError> {
        let profile = sites::resolve_profile(&config.base_url)?;
        let fetcher = Fetcher::new(
            client,
            config.download.min_image_size,
            Duration::from_secs(config.download.fetch_timeout_secs),
        );
        let output_root = PathBuf::from(&config.output_dir);
        Ok(Self {
            config,
            profile,
            fetcher,
            output_root,
        })
    }

    /// 按章节区间顺序抓取并汇总。
    /// 单个章节弃置不会中断运行，只有配置错误才会走到这里的 Err。
    pub async fn run(&self, driver: &dyn PageDriver) -> anyhow::Result<RunReport> {
        let start = self.config.start_chapter;
        let end = self.effective_end_chapter()?;
        tokio::fs::create_dir_all(&self.output_root).await?;

        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut totals = RunTotals::default();
        let mut chapters = Vec::new();
        let mut abandoned = Vec::new();

        for number in start..=end {
            let url = sites::chapter_url(self.profile.chapter_url_template, &self.config.base_url, number);
            let (result, state) = self.run_chapter(driver, ChapterJob { number, url }).await;
            if state == ChapterState::Abandoned {
                abandoned.push(number);
            }
            totals.absorb(&result);
            chapters.push(ChapterRecord { result, state });
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            chapters = %format!("{}-{}", start, end),
            images = totals.total_downloaded,
            size_kb = %format!("{:.2}", totals.total_bytes as f64 / 1024.0),
            elapsed_secs = %format!("{:.2}", elapsed_secs),
            errors = totals.total_failed,
            "overall download complete"
        );

        let report = RunReport {
            started_at,
            elapsed_secs,
            start_chapter: start,
            end_chapter: end,
            totals,
            chapters,
            abandoned_chapters: abandoned,
        };
        self.write_report(&report).await;
        Ok(report)
    }

    // 报告落在输出根目录，写失败只告警，不影响运行结果
    async fn write_report(&self, report: &RunReport) {
        let path = self.output_root.join("run_report.json");
        let data = match serde_json::to_vec_pretty(report) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "failed to serialize run report");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&path, data).await {
            warn!(path = %path.display(), error = %e, "failed to write run report");
        }
    }

    // 起始章节必须 >= 1；end < start 收敛成单章区间，只告警不报错
    fn effective_end_chapter(&self) -> anyhow::Result<u32> {
        let start = self.config.start_chapter;
        if start < 1 {
            anyhow::bail!("起始章节必须不小于 1");
        }
        let end = self.config.end_chapter;
        if end < start {
            warn!(start, end, "end chapter is less than start chapter, clamping to start");
            return Ok(start);
        }
        Ok(end)
    }

    /// 带重试地处理一个章节，返回最终结果与终态。
    /// 每次重试都是完整的一轮：重新导航、稳定、定位、抓取全部图片。
    /// 文件路径是确定的，重复成功只是原地覆盖。
    pub async fn run_chapter(
        &self,
        driver: &dyn PageDriver,
        job: ChapterJob,
    ) -> (ChapterResult, ChapterState) {
        let retry_limit = self.config.download.retry_limit.max(1);
        let mut result = ChapterResult {
            chapter_number: job.number,
            ..Default::default()
        };

        info!(chapter = job.number, url = %job.url, "downloading chapter");
        for attempt in 1..=retry_limit {
            let attempt_started = Instant::now();
            let (bytes, downloaded, failed) = self.attempt_chapter(driver, &job).await;
            result.total_bytes = bytes;
            result.downloaded_count = downloaded;
            result.failed_count = failed;
            result.attempts = attempt;

            info!(
                chapter = job.number,
                downloaded,
                failed,
                size_kb = %format!("{:.2}", bytes as f64 / 1024.0),
                elapsed_secs = %format!("{:.2}", attempt_started.elapsed().as_secs_f64()),
                "chapter attempt complete"
            );

            if failed == 0 {
                return (result, ChapterState::Succeeded);
            }
            if attempt < retry_limit {
                debug!(chapter = job.number, state = ?ChapterState::Retrying, "restarting chapter attempt");
                warn!(
                    chapter = job.number,
                    attempt,
                    retry_limit,
                    "errors occurred during chapter download, retrying"
                );
            }
        }

        error!(
            chapter = job.number,
            attempts = retry_limit,
            "chapter abandoned after retries, skipping"
        );
        (result, ChapterState::Abandoned)
    }

    /// 单次章节尝试：导航 → 稳定 → 定位 → 并发抓取。
    /// 返回 (字节数, 成功数, 失败数)。页面层失败按一个失败单位计，
    /// 不进入抓取阶段。
    async fn attempt_chapter(&self, driver: &dyn PageDriver, job: &ChapterJob) -> (u64, u32, u32) {
        debug!(chapter = job.number, state = ?ChapterState::Loading, "navigating chapter page");
        let refs = match crawler::crawl_chapter_page(
            driver,
            &job.url,
            self.profile.image_selector,
            &self.config.crawl,
        )
        .await
        {
            Ok(refs) => refs,
            Err(e) => {
                warn!(chapter = job.number, error = %e, "chapter page failed to load");
                return (0, 0, 1);
            }
        };
        debug!(chapter = job.number, state = ?ChapterState::Extracting, images = refs.len(), "images located");

        let dir = download::chapter_dir(&self.output_root, job.number);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(chapter = job.number, error = %e, "failed to create chapter directory");
            return (0, 0, 1);
        }

        debug!(chapter = job.number, state = ?ChapterState::Fetching, "dispatching image fetches");
        // 序号在派发时就绑定到路径上，worker 完成顺序不影响文件名
        let futures: Vec<_> = refs
            .iter()
            .map(|image| {
                let fetcher = self.fetcher.clone();
                let dest = dir.join(download::image_file_name(job.number, image.ordinal));
                async move { fetcher.fetch_image(image, &dest).await }
            })
            .collect();
        let outcomes = collect_bounded(futures, self.config.download.workers).await;

        let mut bytes = 0u64;
        let mut downloaded = 0u32;
        let mut failed = 0u32;
        for outcome in outcomes {
            if outcome.success {
                downloaded += 1;
                bytes += outcome.bytes_written;
            } else {
                failed += 1;
            }
        }
        (bytes, downloaded, failed)
    }
}

/// 有界并发执行一组抓取任务，全部完成后返回结果。
/// 任意时刻在飞的任务数不超过 workers。
pub(crate) async fn collect_bounded<F>(futures: Vec<F>, workers: usize) -> Vec<FetchOutcome>
where
    F: Future<Output = FetchOutcome>,
{
    stream::iter(futures)
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}
