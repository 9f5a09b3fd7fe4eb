use base64::Engine;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::crawler::ImageRef;
use crate::request::Client;

/// 单张图片的抓取结果。解码失败、网络错误、尺寸不足
/// 统一折叠成 success=false，上层只按数量聚合。
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOutcome {
    pub bytes_written: u64,
    pub success: bool,
}

impl FetchOutcome {
    fn failed() -> Self {
        Self {
            bytes_written: 0,
            success: false,
        }
    }

    fn ok(bytes: u64) -> Self {
        Self {
            bytes_written: bytes,
            success: true,
        }
    }
}

/// 图片抓取单元。可克隆，章节内多个 worker 各持一份并发工作。
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    min_image_size: usize,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: Client, min_image_size: usize, timeout: Duration) -> Self {
        Self {
            client,
            min_image_size,
            timeout,
        }
    }

    /// 抓取一张图片写入 dest。目录由调用方预先创建。
    /// 错误不向上抛，折叠成失败结果并记日志。
    pub async fn fetch_image(&self, image: &ImageRef, dest: &Path) -> FetchOutcome {
        match self.try_fetch(image, dest).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(ordinal = image.ordinal, error = %e, "image fetch failed");
                FetchOutcome::failed()
            }
        }
    }

    async fn try_fetch(&self, image: &ImageRef, dest: &Path) -> anyhow::Result<FetchOutcome> {
        let bytes = self.obtain_bytes(&image.source).await?;
        // 占位图尺寸判定：不足阈值按失败处理，不落盘
        if bytes.len() < self.min_image_size {
            warn!(
                ordinal = image.ordinal,
                size = bytes.len(),
                min = self.min_image_size,
                "undersized image treated as failed"
            );
            return Ok(FetchOutcome::failed());
        }
        tokio::fs::write(dest, &bytes).await?;
        info!(
            ordinal = image.ordinal,
            size = bytes.len(),
            file = %dest.display(),
            "image saved"
        );
        Ok(FetchOutcome::ok(bytes.len() as u64))
    }

    async fn obtain_bytes(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        if source.is_empty() {
            anyhow::bail!("图片缺少 src");
        }
        // 内嵌图片：data:...;base64,<payload>
        if source.starts_with("data:") {
            let payload = source
                .split_once(',')
                .map(|(_, p)| p)
                .ok_or_else(|| anyhow::anyhow!("data URL 缺少负载部分"))?;
            return base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| anyhow::anyhow!("base64 解码失败: {e}"));
        }
        let resp = self.client.get_with_timeout(source, self.timeout).await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("bad status: {status}");
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// 章节目录：<root>/Chapter_<n>
pub fn chapter_dir(root: &Path, chapter: u32) -> PathBuf {
    root.join(format!("Chapter_{}", chapter))
}

/// 落盘文件名：<章节:3位>_<序号:3位>.png
pub fn image_file_name(chapter: u32, ordinal: usize) -> String {
    format!("{:03}_{:03}.png", chapter, ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(min_size: usize) -> Fetcher {
        Fetcher::new(Client::new(None).unwrap(), min_size, Duration::from_secs(2))
    }

    fn image_ref(source: &str) -> ImageRef {
        ImageRef {
            ordinal: 1,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_file_naming() {
        assert_eq!(image_file_name(7, 12), "007_012.png");
        let dir = chapter_dir(Path::new("/tmp/out"), 7);
        assert_eq!(dir, PathBuf::from("/tmp/out/Chapter_7"));
    }

    #[tokio::test]
    async fn test_inline_payload_written() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let bytes = vec![0xABu8; 200];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let source = format!("data:image/png;base64,{encoded}");

        let outcome = fetcher(100).fetch_image(&image_ref(&source), &dest).await;
        assert!(outcome.success);
        assert_eq!(outcome.bytes_written, 200);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_undersized_inline_payload_fails_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8; 10]);
        let source = format!("data:image/png;base64,{encoded}");

        let outcome = fetcher(100).fetch_image(&image_ref(&source), &dest).await;
        assert!(!outcome.success);
        assert_eq!(outcome.bytes_written, 0);
        assert!(!dest.exists(), "不足阈值的图片不应落盘");
    }

    #[tokio::test]
    async fn test_inline_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let outcome = fetcher(100)
            .fetch_image(&image_ref("data:image/png;base64,@@不是base64@@"), &dest)
            .await;
        assert!(!outcome.success);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_empty_source_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let outcome = fetcher(100).fetch_image(&image_ref(""), &dest).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_remote_fetch_success() {
        let server = MockServer::start().await;
        let body = vec![0x42u8; 300];
        Mock::given(method("GET"))
            .and(path("/img/1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let url = format!("{}/img/1.png", server.uri());
        let outcome = fetcher(100).fetch_image(&image_ref(&url), &dest).await;
        assert!(outcome.success);
        assert_eq!(outcome.bytes_written, 300);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_remote_error_status_fails_without_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/404.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let url = format!("{}/img/404.png", server.uri());
        let outcome = fetcher(100).fetch_image(&image_ref(&url), &dest).await;
        assert!(!outcome.success);
        assert!(!dest.exists(), "失败的抓取不应产生文件");
    }

    #[tokio::test]
    async fn test_remote_undersized_body_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/blank.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let url = format!("{}/img/blank.png", server.uri());
        let outcome = fetcher(100).fetch_image(&image_ref(&url), &dest).await;
        assert!(!outcome.success);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_inclusive() {
        // 恰好等于阈值算成功
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; 100]);
        let source = format!("data:image/png;base64,{encoded}");
        let outcome = fetcher(100).fetch_image(&image_ref(&source), &dest).await;
        assert!(outcome.success);
        assert_eq!(outcome.bytes_written, 100);
    }

    #[tokio::test]
    async fn test_remote_timeout_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 300])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("001_001.png");
        let url = format!("{}/img/slow.png", server.uri());
        let fetcher = Fetcher::new(
            Client::new(None).unwrap(),
            100,
            Duration::from_millis(200),
        );
        let outcome = fetcher.fetch_image(&image_ref(&url), &dest).await;
        assert!(!outcome.success);
        assert!(!dest.exists());
    }
}
