pub mod runner;

pub use runner::Runner;

use serde::Serialize;

/// 一个待抓取的章节，章节完成后即丢弃。
#[derive(Debug, Clone)]
pub struct ChapterJob {
    pub number: u32,
    pub url: String,
}

/// 章节处理状态。终态只有 Succeeded / Abandoned，
/// 其余状态只在单次尝试内出现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterState {
    Pending,
    Loading,
    Extracting,
    Fetching,
    Succeeded,
    Retrying,
    Abandoned,
}

/// 一个章节的最终结果。重试时 attempts 累计，
/// 计数字段总是最后一次尝试的数字。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterResult {
    pub chapter_number: u32,
    pub total_bytes: u64,
    pub downloaded_count: u32,
    pub failed_count: u32,
    pub attempts: u32,
}

/// 全程累计，只增不减。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub chapters_processed: u32,
    pub total_bytes: u64,
    pub total_downloaded: u32,
    pub total_failed: u32,
}

impl RunTotals {
    pub fn absorb(&mut self, result: &ChapterResult) {
        self.chapters_processed += 1;
        self.total_bytes += result.total_bytes;
        self.total_downloaded += result.downloaded_count;
        self.total_failed += result.failed_count;
    }
}

/// 汇总报告里的单章记录：最终结果加终态。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    #[serde(flatten)]
    pub result: ChapterResult,
    pub state: ChapterState,
}

/// 整次运行的汇总报告。运行结束后落盘一份 JSON 方便核对。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: String,
    pub elapsed_secs: f64,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub totals: RunTotals,
    pub chapters: Vec<ChapterRecord>,
    pub abandoned_chapters: Vec<u32>,
}
