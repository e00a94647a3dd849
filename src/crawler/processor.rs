use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fetcher::Fetcher;
use crate::config::{SiteSchema, compile_selector};
use crate::error::{MarkupError, PagerError};
use crate::markup::Document;
use crate::models::{ChapterLocator, PageImageUrl};

/// Walks a chapter's page selector and resolves every page to its image.
pub struct ChapterPager {
    fetcher: Arc<dyn Fetcher>,
    schema: SiteSchema,
}

impl ChapterPager {
    pub fn new(fetcher: Arc<dyn Fetcher>, schema: SiteSchema) -> Self {
        Self { fetcher, schema }
    }

    pub async fn resolve_pages(
        &self,
        locator: &ChapterLocator,
    ) -> Result<Vec<PageImageUrl>, PagerError> {
        let base_url = chapter_base_url(&self.schema.base_url, locator)?;
        debug!("chapter base: {}", base_url);

        let body = self.fetcher.fetch(&base_url).await?;
        let pages = parse_page_numbers(&body, &self.schema)?.ok_or_else(|| {
            PagerError::MissingPageSelector {
                url: base_url.clone(),
            }
        })?;
        info!("{} pages in {}", pages.len(), base_url);

        let mut images = Vec::with_capacity(pages.len());
        for page in pages {
            let page_url = format!("{}{}.html", base_url, page);

            let body = match self.fetcher.fetch(&page_url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("skipping page {}: {}", page, e);
                    continue;
                }
            };

            match parse_page_image(&body, &self.schema, &page_url) {
                Ok(Some(src)) => {
                    debug!("page {} -> {}", page, src);
                    images.push(PageImageUrl::new(src));
                }
                Ok(None) => warn!("no image on page {} ({}), skipping", page, page_url),
                Err(e) => warn!("skipping page {}: {}", page, e),
            }
        }

        Ok(images)
    }
}

/// Absolute directory URL of a chapter, ending in `/`. A trailing page file
/// such as `1.html` is dropped; query and fragment are removed.
pub fn chapter_base_url(site_base: &str, locator: &ChapterLocator) -> Result<String, PagerError> {
    let invalid = || PagerError::InvalidUrl(locator.to_string());
    let base = Url::parse(site_base).map_err(|_| PagerError::InvalidUrl(site_base.to_string()))?;
    let mut url = base.join(locator.as_str()).map_err(|_| invalid())?;
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().to_string();
    if !path.ends_with('/') {
        let directory = match path.rsplit_once('/') {
            Some((head, last)) if is_page_file(last) => format!("{}/", head),
            _ => format!("{}/", path),
        };
        url.set_path(&directory);
    }

    Ok(url.to_string())
}

// `1.html` is a page, `c010.5` is a chapter directory.
fn is_page_file(segment: &str) -> bool {
    segment
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Content page numbers from the page selector, ascending from its smallest
/// to its largest numeric option. `None` when there is no usable selector.
pub fn parse_page_numbers(body: &[u8], schema: &SiteSchema) -> Result<Option<Vec<u32>>, MarkupError> {
    let doc = Document::parse(body);
    let Some(select) = doc.first(&schema.page_selector)? else {
        return Ok(None);
    };

    let option = compile_selector("option")?;
    let values: Vec<u32> = select
        .select(&option)
        .filter_map(|opt| opt.value().attr("value"))
        .filter_map(|value| value.trim().parse().ok())
        .filter(|value| !schema.skip_page_values.contains(value))
        .collect();

    let (Some(first), Some(last)) = (values.iter().min(), values.iter().max()) else {
        return Ok(None);
    };

    Ok(Some(
        (*first..=*last)
            .filter(|value| !schema.skip_page_values.contains(value))
            .collect(),
    ))
}

/// `src` of the first image inside the viewer, made absolute against the page.
pub fn parse_page_image(
    body: &[u8],
    schema: &SiteSchema,
    page_url: &str,
) -> Result<Option<String>, MarkupError> {
    let doc = Document::parse(body);
    let Some(viewer) = doc.first(&schema.image_viewer)? else {
        return Ok(None);
    };

    let image = if viewer.value().name() == "img" {
        Some(viewer)
    } else {
        viewer.select(&compile_selector("img")?).next()
    };

    let Some(src) = image
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
    else {
        return Ok(None);
    };

    let absolute = Url::parse(page_url)
        .and_then(|page| page.join(src))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| src.to_string());
    Ok(Some(absolute))
}
