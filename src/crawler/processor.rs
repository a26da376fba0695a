use std::path::{Path, PathBuf};

use anyhow::Result;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

static PARTIAL_SUFFIX: &str = ".part";

/// Owns the output directory. A file's presence there is the only record
/// that an image was already downloaded.
#[derive(Clone)]
pub struct Processor {
    output_dir: PathBuf,
}

impl Processor {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[instrument(skip_all)]
    pub async fn prepare(&self) -> Result<()> {
        if !fs::try_exists(&self.output_dir).await? {
            info!("Creating output directory: {}", self.output_dir.display());
        }
        fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// `page<N>_<basename>`, where the basename is the last path segment of
    /// `src`. Query and fragment never become part of the name.
    pub fn filename(page: u32, src: &Url) -> Option<String> {
        let basename = src
            .path_segments()?
            .next_back()
            .filter(|segment| !segment.is_empty())?;
        Some(format!("{}{}", Self::page_marker(page), basename))
    }

    pub fn page_marker(page: u32) -> String {
        format!("page{}_", page)
    }

    /// Whether any finished file in the output directory carries the page's
    /// marker. In-progress `.part` files are ignored.
    pub async fn page_exists(&self, page: u32) -> std::io::Result<bool> {
        let marker = Self::page_marker(page);
        let mut entries = fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.contains(&marker) && !name.ends_with(PARTIAL_SUFFIX) {
                debug!("Page {} matched by {}", page, name);
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn image_exists(&self, filename: &str) -> std::io::Result<bool> {
        fs::try_exists(self.output_dir.join(filename)).await
    }

    /// Writes to a `.part` sibling first and renames it into place, so the
    /// final name only ever holds complete content.
    pub async fn write_image(&self, filename: &str, image_bytes: Bytes) -> Result<PathBuf> {
        let image_path = self.output_dir.join(filename);
        let partial_path = self
            .output_dir
            .join(format!("{}{}", filename, PARTIAL_SUFFIX));

        if let Err(e) = fs::write(&partial_path, &image_bytes).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(anyhow::anyhow!(
                "failed to write {}: {}",
                partial_path.display(),
                e
            ));
        }
        if let Err(e) = fs::rename(&partial_path, &image_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(anyhow::anyhow!(
                "failed to move {} into place: {}",
                image_path.display(),
                e
            ));
        }

        debug!("Image saved to: {}", image_path.display());
        Ok(image_path)
    }
}
