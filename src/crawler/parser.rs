use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use super::fetcher::Fetcher;
use crate::config::{ChapterNumbering, SiteSchema, compile_pattern};
use crate::error::{MarkupError, ResolveError};
use crate::markup::{Document, has_class, text_of};
use crate::models::{ChapterCatalog, ChapterKey, ChapterLocator};
use crate::utils::normalize_series_name;

/// Most similar titles reported for an unknown series.
pub const MAX_CANDIDATES: usize = 10;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)").expect("static regex"));

/// What a catalog page turned out to be.
#[derive(Debug)]
pub enum ListingPage {
    /// The site fell back to its search page.
    SearchPage,
    Blocked(String),
    Chapters(ChapterCatalog),
}

/// Turns a series name into its ordered chapter catalog.
pub struct CatalogResolver {
    fetcher: Arc<dyn Fetcher>,
    schema: SiteSchema,
}

impl CatalogResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, schema: SiteSchema) -> Self {
        Self { fetcher, schema }
    }

    pub fn normalize(&self, series: &str) -> String {
        normalize_series_name(series, self.schema.name_separator)
    }

    pub async fn resolve(&self, series: &str) -> Result<ChapterCatalog, ResolveError> {
        let normalized = self.normalize(series);
        let url = self.schema.catalog_url(&normalized);
        info!("fetching chapter list: {}", url);

        let body = self.fetcher.fetch(&url).await?;
        match parse_listing(&body, &self.schema, &normalized)? {
            ListingPage::Chapters(catalog) if catalog.is_empty() => Err(ResolveError::Empty {
                series: series.to_string(),
                url,
            }),
            ListingPage::Chapters(catalog) => {
                info!("found {} chapters for '{}'", catalog.len(), series);
                Ok(catalog)
            }
            ListingPage::Blocked(warning) => Err(ResolveError::Blocked {
                series: series.to_string(),
                warning,
            }),
            ListingPage::SearchPage => {
                let candidates = self.search(&normalized).await;
                Err(ResolveError::NotFound {
                    series: series.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Similar titles from the site search. The series is already known to be
    /// missing, so a failed search only costs the suggestions.
    async fn search(&self, normalized: &str) -> Vec<String> {
        let url = self.schema.search_url(normalized);
        info!("series not found, searching: {}", url);

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("search for similar titles failed: {}", e);
                return Vec::new();
            }
        };
        parse_search_results(&body, &self.schema).unwrap_or_else(|e| {
            warn!("could not read search results: {}", e);
            Vec::new()
        })
    }
}

/// Classifies a catalog page and extracts its chapters.
pub fn parse_listing(
    body: &[u8],
    schema: &SiteSchema,
    normalized_series: &str,
) -> Result<ListingPage, MarkupError> {
    let doc = Document::parse(body);

    if doc.contains(&schema.search_marker)? && !doc.contains(&schema.chapter_list_marker)? {
        return Ok(ListingPage::SearchPage);
    }

    for warning in doc.select(&schema.warning)? {
        let text = text_of(&warning);
        let lowered = text.to_lowercase();
        if schema
            .blocked_keywords
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_lowercase()))
        {
            return Ok(ListingPage::Blocked(text));
        }
    }

    let rule = &schema.chapter_link;
    let links = match (&rule.class, &rule.href_pattern) {
        (Some(class), _) => doc.find_by_tag_and_class(&rule.tag, class)?,
        (None, Some(pattern)) => doc.find_by_href_pattern(&rule.tag, &compile_pattern(pattern)?)?,
        (None, None) => doc.select(&rule.tag)?,
    };

    let url_pattern = match &schema.chapter_number {
        ChapterNumbering::UrlSegment { pattern } => Some(compile_pattern(pattern)?),
        ChapterNumbering::LinkText => None,
    };

    let mut catalog = ChapterCatalog::new();
    for link in links {
        if let Some(excluded) = &rule.exclude_class {
            if has_class(&link, excluded) {
                continue;
            }
        }
        let Some(href) = link.value().attr("href").filter(|h| !h.trim().is_empty()) else {
            warn!("chapter link without href: '{}'", text_of(&link));
            continue;
        };

        let key = match &url_pattern {
            Some(pattern) => key_from_url(href, pattern),
            None => key_from_link_text(&text_of(&link), normalized_series, schema.name_separator),
        };

        match key {
            Some(key) => catalog.insert(key, ChapterLocator::new(href.trim())),
            None => warn!(
                "no chapter number in link '{}' ({}), skipping",
                text_of(&link),
                href
            ),
        }
    }

    Ok(ListingPage::Chapters(catalog))
}

/// Titles offered by the site search, deduplicated, at most [`MAX_CANDIDATES`].
pub fn parse_search_results(body: &[u8], schema: &SiteSchema) -> Result<Vec<String>, MarkupError> {
    let doc = Document::parse(body);
    let mut titles: Vec<String> = Vec::new();

    for result in doc.select(&schema.search_result)? {
        let title = text_of(&result);
        if !title.is_empty() && !titles.contains(&title) {
            titles.push(title);
        }
        if titles.len() == MAX_CANDIDATES {
            break;
        }
    }

    Ok(titles)
}

pub fn key_from_url(href: &str, pattern: &Regex) -> Option<ChapterKey> {
    pattern
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `"Naruto 700"`, `"Chapter 10.5"` and `"naruto ch.3: Title"` all carry a
/// number once the series name and a chapter label are removed.
pub fn key_from_link_text(text: &str, normalized_series: &str, separator: char) -> Option<ChapterKey> {
    let normalized = normalize_series_name(text, separator);
    let trim = |s: &str| s.trim_start_matches(separator).to_string();

    let mut rest = match normalized.strip_prefix(normalized_series) {
        Some(rest) if !normalized_series.is_empty() => trim(rest),
        _ => normalized.clone(),
    };

    for label in ["chapter", "ch."] {
        if let Some(stripped) = rest.strip_prefix(label) {
            rest = trim(stripped);
            break;
        }
    }
    if let Some(stripped) = rest.strip_prefix("ch") {
        if stripped.starts_with(|c: char| c.is_ascii_digit() || c == separator) {
            rest = trim(stripped);
        }
    }

    LEADING_NUMBER
        .captures(&rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().trim_end_matches('.').parse().ok())
}
