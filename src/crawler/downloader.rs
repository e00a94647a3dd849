use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::fetcher::Fetcher;
use crate::models::PageImageUrl;
use crate::utils::image_extension;

pub struct ImageDownloader {
    fetcher: Arc<dyn Fetcher>,
}

impl ImageDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Saves one image. Returns `false` when the image could not be fetched;
    /// write failures are errors.
    pub async fn download_image(&self, image_url: &PageImageUrl, filepath: &Path) -> Result<bool> {
        debug!("downloading {} to {}", image_url, filepath.display());

        let bytes = match self.fetcher.fetch(image_url.as_str()).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                debug!("image missing, skipping: {}", e);
                return Ok(false);
            }
            Err(e) => {
                warn!("giving up on image: {}", e);
                return Ok(false);
            }
        };

        fs::write(filepath, &bytes)
            .with_context(|| format!("writing {}", filepath.display()))?;
        Ok(true)
    }

    /// Downloads a chapter's images into `chapter_dir` as `000.jpg`,
    /// `001.jpg`, ... in page order. Images that cannot be fetched are left
    /// out and the numbering stays contiguous. Anything already in
    /// `chapter_dir` is removed first. Returns the number saved.
    pub async fn download_chapter(&self, images: &[PageImageUrl], chapter_dir: &Path) -> Result<usize> {
        if chapter_dir.exists() {
            fs::remove_dir_all(chapter_dir)
                .with_context(|| format!("clearing {}", chapter_dir.display()))?;
        }
        fs::create_dir_all(chapter_dir)
            .with_context(|| format!("creating {}", chapter_dir.display()))?;

        let mut saved = 0;
        for image_url in images {
            let filename = format!("{:03}.{}", saved, image_extension(image_url.as_str()));
            if self.download_image(image_url, &chapter_dir.join(&filename)).await? {
                saved += 1;
            }
        }

        Ok(saved)
    }
}
