pub mod downloader;
pub mod fetcher;
pub mod parser;
pub mod processor;

pub use downloader::ImageDownloader;
pub use fetcher::{Fetcher, HttpFetcher};
pub use parser::CatalogResolver;
pub use processor::ChapterPager;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::ChapterArchiver;
use crate::config::{DownloadOptions, SiteSchema};
use crate::error::ResolveError;
use crate::models::{ChapterCatalog, ChapterKey, ChapterLocator, DownloadRange};

/// Outcome of a download run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<ChapterKey>,
    pub skipped: Vec<ChapterKey>,
    pub images: usize,
}

pub struct MangaCrawler {
    resolver: CatalogResolver,
    pager: ChapterPager,
    image_downloader: ImageDownloader,
    archiver: ChapterArchiver,
    options: DownloadOptions,
    separator: char,
}

impl MangaCrawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, schema: SiteSchema, options: DownloadOptions) -> Self {
        Self {
            resolver: CatalogResolver::new(fetcher.clone(), schema.clone()),
            pager: ChapterPager::new(fetcher.clone(), schema.clone()),
            image_downloader: ImageDownloader::new(fetcher),
            archiver: ChapterArchiver::new(),
            options,
            separator: schema.name_separator,
        }
    }

    pub async fn fetch_catalog(&self, series: &str) -> Result<ChapterCatalog, ResolveError> {
        self.resolver.resolve(series).await
    }

    /// `<output>/<normalized series>`
    pub fn series_dir(&self, series: &str) -> PathBuf {
        self.options
            .output_dir
            .join(crate::utils::normalize_series_name(series, self.separator))
    }

    /// Downloads every chapter of `series` inside `range`. Only resolution
    /// failures and an invalid range abort the run; a failing chapter is
    /// logged and skipped.
    pub async fn crawl_series(&self, series: &str, range: &DownloadRange) -> Result<RunSummary> {
        let catalog = self.fetch_catalog(series).await?;
        let selected = catalog.select(range)?;
        info!(
            "{} of {} chapters selected ({})",
            selected.len(),
            catalog.len(),
            range
        );

        let series_dir = self.series_dir(series);
        let mut summary = RunSummary::default();

        for (key, locator) in selected {
            info!("{}", "=".repeat(48));
            info!("Chapter {}", key);
            info!("{}", "=".repeat(48));

            match self.crawl_chapter(key, locator, &series_dir).await {
                Ok(images) => {
                    summary.images += images;
                    summary.completed.push(key.clone());
                }
                Err(e) => {
                    warn!("chapter {} skipped: {:#}", key, e);
                    summary.skipped.push(key.clone());
                }
            }
        }

        info!(
            "done: {} chapters, {} images, {} skipped",
            summary.completed.len(),
            summary.images,
            summary.skipped.len()
        );
        Ok(summary)
    }

    async fn crawl_chapter(
        &self,
        key: &ChapterKey,
        locator: &ChapterLocator,
        series_dir: &std::path::Path,
    ) -> Result<usize> {
        let images = self.pager.resolve_pages(locator).await?;
        let chapter_dir = series_dir.join(key.dir_name());
        let saved = self.image_downloader.download_chapter(&images, &chapter_dir).await?;
        info!("chapter {}: {} images in {}", key, saved, chapter_dir.display());

        if self.options.archive {
            self.archiver.compress_chapter(&chapter_dir)?;
            if self.options.delete_after_archive {
                self.archiver.remove_sources(&chapter_dir)?;
            }
        }

        Ok(saved)
    }
}
