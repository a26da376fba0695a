pub mod config;
pub mod crawler;
pub mod logger;
pub mod utils;

pub use config::Config;
pub use crawler::{ComicCrawler, CrawlReport, StopReason};
pub use utils::display_elapsed_time;
