use anyhow::Context;
use tracing::warn;

use super::ImageRef;
use crate::driver::PageDriver;

// 选择器经 JSON 序列化变成合法的 JS 字符串字面量，避免引号注入
pub(crate) fn locate_images_js(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "Array.from(document.querySelectorAll({quoted})).map((el) => el.getAttribute('src') || '')"
    )
}

/// 按站点选择器取出页面上的图片地址，文档顺序即序号顺序。
/// src 缺失的元素保留为空串，由下载层快速判失败，保证序号连续。
pub async fn locate_images(
    driver: &dyn PageDriver,
    selector: &str,
) -> anyhow::Result<Vec<ImageRef>> {
    let value = driver.execute_script(&locate_images_js(selector)).await?;
    let sources: Vec<String> = serde_json::from_value(value).context("无法解析图片地址列表")?;
    if sources.is_empty() {
        warn!(selector, "selector matched no images");
    }
    Ok(sources
        .into_iter()
        .enumerate()
        .map(|(idx, source)| ImageRef {
            ordinal: idx + 1,
            source,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedPage {
        sources: Vec<&'static str>,
    }

    #[async_trait]
    impl crate::driver::PageDriver for FixedPage {
        async fn navigate(&self, _url: &str, _timeout_ms: u64) -> anyhow::Result<()> {
            Ok(())
        }
        async fn execute_script(&self, script: &str) -> anyhow::Result<serde_json::Value> {
            assert!(script.contains("querySelectorAll"), "未预期的脚本: {script}");
            Ok(serde_json::json!(self.sources))
        }
        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ordinals_follow_document_order() {
        let page = FixedPage {
            sources: vec!["https://a/1.png", "https://a/2.png", "https://a/3.png"],
        };
        let refs = locate_images(&page, "img.page").await.unwrap();
        assert_eq!(refs.len(), 3);
        for (idx, r) in refs.iter().enumerate() {
            assert_eq!(r.ordinal, idx + 1, "序号必须从 1 连续");
        }
        assert_eq!(refs[2].source, "https://a/3.png");
    }

    #[tokio::test]
    async fn test_missing_src_kept_as_empty() {
        // 空 src 占位，序号不跳号
        let page = FixedPage {
            sources: vec!["https://a/1.png", "", "https://a/3.png"],
        };
        let refs = locate_images(&page, "img.page").await.unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[1].ordinal, 2);
        assert!(refs[1].source.is_empty());
    }

    #[test]
    fn test_selector_quoting() {
        let js = locate_images_js(r#"img[data-kind="page"]"#);
        assert!(js.contains(r#"querySelectorAll("img[data-kind=\"page\"]")"#));
    }
}
