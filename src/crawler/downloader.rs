use anyhow::Result;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{error, info, instrument};
use url::Url;

use super::processor::Processor;

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    /// The archive has no such page (HTTP 404). Ends the crawl normally.
    #[error("not found: {0}")]
    NotFound(Url),
    #[error("unexpected status {status} for {url}")]
    Status { url: Url, status: StatusCode },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Downloaded,
    AlreadyPresent,
    Failed,
}

#[derive(Clone)]
pub struct Downloader {
    client: Client,
    base_url: Url,
}

impl Downloader {
    pub fn new(base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            anyhow::bail!("base url {} cannot carry a page path", base_url);
        }
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, base_url })
    }

    /// `<base>/<page>`, without doubling a trailing slash on the base.
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&page.to_string());
        }
        url
    }

    #[instrument(skip(self))]
    pub async fn page(&self, page: u32) -> Result<String, FetchError> {
        let url = self.page_url(page);
        let response = self.get(&url).await?;
        Ok(response.text().await?)
    }

    pub async fn image(&self, url: &Url) -> Result<Bytes, FetchError> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?)
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(url.clone())),
            status if !status.is_success() => Err(FetchError::Status {
                url: url.clone(),
                status,
            }),
            _ => Ok(response),
        }
    }
}

/// Downloads one image into the output directory as `page<N>_<basename>`.
///
/// Never fails: an existing target is left untouched and any fetch or write
/// error is logged and reported as [`ImageOutcome::Failed`].
#[instrument(skip(downloader, processor, src), fields(src = %src))]
pub async fn download_image(
    downloader: &Downloader,
    processor: &Processor,
    page: u32,
    src: &Url,
) -> ImageOutcome {
    let Some(filename) = Processor::filename(page, src) else {
        error!("Failed to download image from page {}: no file name in {}", page, src);
        return ImageOutcome::Failed;
    };

    match processor.image_exists(&filename).await {
        Ok(true) => {
            info!("Already downloaded: {}", filename);
            return ImageOutcome::AlreadyPresent;
        }
        Ok(false) => (),
        Err(e) => {
            error!("Failed to download image from page {}: {}", page, e);
            return ImageOutcome::Failed;
        }
    }

    let image_bytes = match downloader.image(src).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to download image from page {}: {}", page, e);
            return ImageOutcome::Failed;
        }
    };

    match processor.write_image(&filename, image_bytes).await {
        Ok(_) => {
            info!("Downloaded: {}", filename);
            ImageOutcome::Downloaded
        }
        Err(e) => {
            error!("Failed to save image from page {}: {}", page, e);
            ImageOutcome::Failed
        }
    }
}
