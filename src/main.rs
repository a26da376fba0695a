use std::time::Instant;

use anyhow::Result;

use comic_fetch::{ComicCrawler, Config, StopReason, display_elapsed_time, logger};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logger::init();

    let config = Config::load()?;
    let crawler = ComicCrawler::new(&config)?;

    let start = Instant::now();
    let report = crawler.run().await?;
    display_elapsed_time(start.elapsed());

    if let StopReason::PageFailed { page, error } = report.stop {
        anyhow::bail!("crawl stopped early at page {}: {}", page, error);
    }
    Ok(())
}
