//! 页面驱动抽象。
//!
//! 章节页面靠浏览器会话渲染出来，滚动和取图都通过执行脚本完成。
//! 这里只约定能力接口，具体实现见 `chromium`，测试里用脚本化的替身。

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;

/// 渲染页面的外部能力：导航、执行脚本、关闭会话。
///
/// 同一个会话内允许反复执行脚本而不重新加载页面，
/// 会话是有状态的，调用方必须串行使用。
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到目标地址，超时按错误处理。
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()>;
    /// 在页面上下文执行脚本并返回结果值。
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;
    /// 关闭会话。
    async fn close(self: Box<Self>) -> Result<()>;
}
