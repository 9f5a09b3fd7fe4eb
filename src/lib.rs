pub mod config;
pub mod crawler;
pub mod download;
pub mod driver;
pub mod logger;
pub mod request;
pub mod sites;
pub mod task;

pub use config::Config;
pub use driver::PageDriver;
pub use request::Client;
pub use task::{ChapterResult, ChapterState, RunReport, RunTotals, Runner};
