use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use serde::Deserialize;
use url::Url;

static CONFIG_FILE: &str = "comic-fetch.toml";
static ENV_PREFIX: &str = "COMIC_FETCH";

static DEFAULT_BASE_URL: &str = "https://garfieldminusgarfield.net/page";
static DEFAULT_OUTPUT_DIR: &str = "comics";

/// Crawl settings. Every field has a default, so an absent config file is fine.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Archive root; the page number is appended as a path segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Page 1 of the archive is skipped by default.
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,
    /// Stop after visiting this many pages. Unbounded when absent.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_start_page() -> u32 {
    2
}

fn default_inter_request_delay_ms() -> u64 {
    1500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            output_dir: default_output_dir(),
            start_page: default_start_page(),
            inter_request_delay_ms: default_inter_request_delay_ms(),
            max_pages: None,
        }
    }
}

impl Config {
    /// Reads `comic-fetch.toml` from the working directory (if present) and
    /// applies `COMIC_FETCH_*` environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("failed to deserialize {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_page == 0 {
            anyhow::bail!("start_page must be at least 1");
        }
        if self.max_pages == Some(0) {
            anyhow::bail!("max_pages must be at least 1 when set");
        }
        self.base_url()?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid base_url '{}': {}", self.base_url, e))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("base_url '{}' cannot carry a page path", self.base_url);
        }
        Ok(url)
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_archive_layout() {
        let config = Config::default();
        assert_eq!(config.base_url, "https://garfieldminusgarfield.net/page");
        assert_eq!(config.output_dir, PathBuf::from("comics"));
        assert_eq!(config.start_page, 2);
        assert_eq!(config.inter_request_delay(), Duration::from_millis(1500));
        assert!(config.max_pages.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comic-fetch.toml");
        std::fs::write(
            &path,
            "base_url = \"http://localhost:8080/archive\"\nstart_page = 5\nmax_pages = 3\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/archive");
        assert_eq!(config.start_page, 5);
        assert_eq!(config.max_pages, Some(3));
        assert_eq!(config.output_dir, PathBuf::from("comics"));
        assert_eq!(config.inter_request_delay_ms, 1500);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.start_page, 2);
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config {
            start_page: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            base_url: "mailto:someone@example.com".to_owned(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            base_url: "not a url".to_owned(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
