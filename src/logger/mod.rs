use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// 初始化全局日志：按天滚动的文件输出 + 终端输出。
/// 返回的 guard 必须在进程存活期间持有，否则文件日志会丢失。
pub fn init(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_level(true)
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    info!("logger initialized at {:?}", log_dir);
    Ok(guard)
}

pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("manga-chapter-dl").join("logs")
}
