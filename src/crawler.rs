pub mod downloader;
pub mod parser;
pub mod processor;
pub mod task;

pub use task::TaskManager;

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::Config;

pub use downloader::{Downloader, FetchError, ImageOutcome, download_image};
pub use parser::Parser;
pub use processor::Processor;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to inspect output directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The archive answered 404 for `page`.
    EndOfArchive { page: u32 },
    /// Any other page-level failure. The crawl is incomplete.
    PageFailed { page: u32, error: String },
    /// `max_pages` pages were visited, or no page number follows `page`.
    PageLimit { page: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    Running,
    Stopped(StopReason),
}

/// Per-image outcome counts, for one page or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTally {
    pub found: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl ImageTally {
    fn record(&mut self, outcome: ImageOutcome) {
        match outcome {
            ImageOutcome::Downloaded => self.downloaded += 1,
            ImageOutcome::AlreadyPresent => self.already_present += 1,
            ImageOutcome::Failed => self.failed += 1,
        }
    }

    fn merge(&mut self, other: ImageTally) {
        self.found += other.found;
        self.downloaded += other.downloaded;
        self.already_present += other.already_present;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Files for the page were already on disk; nothing was fetched.
    Skipped,
    Processed(ImageTally),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Every page number visited, in order, including the one that stopped the crawl.
    pub pages: Vec<u32>,
    pub skipped_pages: Vec<u32>,
    pub images: ImageTally,
    pub stop: StopReason,
}

impl CrawlReport {
    /// False when a page failure cut the crawl short.
    pub fn is_complete(&self) -> bool {
        !matches!(self.stop, StopReason::PageFailed { .. })
    }
}

pub struct ComicCrawler {
    parser: Parser,
    downloader: Downloader,
    processor: Processor,
    start_page: u32,
    inter_request_delay: Duration,
    max_pages: Option<u32>,
}

impl ComicCrawler {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            parser: Parser,
            downloader: Downloader::new(config.base_url()?)?,
            processor: Processor::new(config.output_dir.clone()),
            start_page: config.start_page,
            inter_request_delay: config.inter_request_delay(),
            max_pages: config.max_pages,
        })
    }

    /// Walks the archive from the start page until a page is missing, a page
    /// fails, or the page limit is reached. Pauses after every page.
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<CrawlReport> {
        self.processor.prepare().await?;
        info!(
            "Saving images to {} starting at page {}",
            self.processor.output_dir().display(),
            self.start_page
        );

        let mut pages = Vec::new();
        let mut skipped_pages = Vec::new();
        let mut images = ImageTally::default();
        let mut page = self.start_page;

        let stop = loop {
            info!("Processing page {}...", page);
            pages.push(page);

            let mut state = match self.process_page(page).await {
                Ok(PageOutcome::Skipped) => {
                    skipped_pages.push(page);
                    CrawlState::Running
                }
                Ok(PageOutcome::Processed(tally)) => {
                    images.merge(tally);
                    CrawlState::Running
                }
                Err(PageError::Fetch(e)) if e.is_not_found() => {
                    info!("Page {} does not exist.", page);
                    CrawlState::Stopped(StopReason::EndOfArchive { page })
                }
                Err(e) => {
                    error!("Failed to process page {}: {}", page, e);
                    CrawlState::Stopped(StopReason::PageFailed {
                        page,
                        error: e.to_string(),
                    })
                }
            };

            if state == CrawlState::Running
                && self.max_pages.is_some_and(|max| pages.len() >= max as usize)
            {
                info!("Reached the limit of {} pages", pages.len());
                state = CrawlState::Stopped(StopReason::PageLimit { page });
            }

            match page.checked_add(1) {
                Some(next) => page = next,
                None if state == CrawlState::Running => {
                    info!("Page {} is the last addressable page", page);
                    state = CrawlState::Stopped(StopReason::PageLimit { page });
                }
                None => (),
            }
            sleep(self.inter_request_delay).await;

            if let CrawlState::Stopped(reason) = state {
                break reason;
            }
        };

        let report = CrawlReport {
            pages,
            skipped_pages,
            images,
            stop,
        };
        if report.is_complete() {
            info!(
                "Crawl finished: {} pages visited, {} downloaded, {} already present, {} failed",
                report.pages.len(),
                report.images.downloaded,
                report.images.already_present,
                report.images.failed
            );
        } else {
            warn!(
                "Crawl stopped early after {} pages: {:?}",
                report.pages.len(),
                report.stop
            );
        }
        Ok(report)
    }

    /// Fetches one page and downloads its images. All downloads for the page
    /// finish before this returns.
    #[instrument(skip(self))]
    pub async fn process_page(&self, page: u32) -> Result<PageOutcome, PageError> {
        if self.processor.page_exists(page).await? {
            info!("Images from page {} already exist. Skipping...", page);
            return Ok(PageOutcome::Skipped);
        }

        let page_url = self.downloader.page_url(page);
        let page_html = self.downloader.page(page).await?;
        let srcs = self.parser.image_srcs(&page_html);

        let mut tally = ImageTally {
            found: srcs.len(),
            ..ImageTally::default()
        };
        if srcs.is_empty() {
            info!("No images found on page {}.", page_url);
            return Ok(PageOutcome::Processed(tally));
        }

        let mut tasks = TaskManager::new();
        let mut filenames = HashSet::new();
        for src in srcs {
            let src = match page_url.join(&src) {
                Ok(url) => url,
                Err(e) => {
                    error!("Failed to download image from page {}: bad url {}: {}", page, src, e);
                    tally.failed += 1;
                    continue;
                }
            };
            // One download per target file name.
            if let Some(filename) = Processor::filename(page, &src) {
                if !filenames.insert(filename.clone()) {
                    info!("Already downloaded: {}", filename);
                    tally.record(ImageOutcome::AlreadyPresent);
                    continue;
                }
            }
            let downloader = self.downloader.clone();
            let processor = self.processor.clone();
            tasks.spawn(async move { download_image(&downloader, &processor, page, &src).await });
        }

        let spawned = tasks.len();
        let outcomes = tasks.wait().await;
        tally.failed += spawned - outcomes.len();
        for outcome in outcomes {
            tally.record(outcome);
        }

        Ok(PageOutcome::Processed(tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_merges_counts() {
        let mut total = ImageTally::default();
        let mut page = ImageTally {
            found: 3,
            ..ImageTally::default()
        };
        page.record(ImageOutcome::Downloaded);
        page.record(ImageOutcome::AlreadyPresent);
        page.record(ImageOutcome::Failed);
        total.merge(page);
        total.merge(page);

        assert_eq!(
            total,
            ImageTally {
                found: 6,
                downloaded: 2,
                already_present: 2,
                failed: 2,
            }
        );
    }

    #[test]
    fn only_page_failures_are_incomplete() {
        let report = |stop| CrawlReport {
            pages: vec![2],
            skipped_pages: Vec::new(),
            images: ImageTally::default(),
            stop,
        };
        assert!(report(StopReason::EndOfArchive { page: 2 }).is_complete());
        assert!(report(StopReason::PageLimit { page: 2 }).is_complete());
        assert!(
            !report(StopReason::PageFailed {
                page: 2,
                error: "boom".to_owned()
            })
            .is_complete()
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config {
            start_page: 0,
            ..Config::default()
        };
        assert!(ComicCrawler::new(&config).is_err());
    }
}
