use anyhow::{Context, Result};
use regex::Regex;
use scraper::Selector;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MarkupError;

/// Everything that differs between revisions of the site: URLs, markup
/// conventions and how chapter numbers are read. Missing fields in a schema
/// file fall back to the current revision.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSchema {
    pub base_url: String,
    /// Relative to `base_url`; `{series}` is replaced by the normalized name.
    pub catalog_path: String,
    /// Relative to `base_url`; `{query}` is replaced by the search terms.
    pub search_path: String,
    pub name_separator: char,
    /// Present on the search page the site falls back to for unknown series.
    pub search_marker: String,
    /// Present on a real catalog page.
    pub chapter_list_marker: String,
    pub search_result: String,
    pub warning: String,
    pub blocked_keywords: Vec<String>,
    pub chapter_link: LinkRule,
    pub chapter_number: ChapterNumbering,
    pub page_selector: String,
    /// Option values that are not content pages.
    pub skip_page_values: Vec<u32>,
    pub image_viewer: String,
}

impl Default for SiteSchema {
    fn default() -> Self {
        Self {
            base_url: "http://mangafox.me/".to_string(),
            catalog_path: "manga/{series}/?no_warning=1".to_string(),
            search_path: "search.php?name_method=cw&name={query}&advopts=1".to_string(),
            name_separator: '_',
            search_marker: "#searchform".to_string(),
            chapter_list_marker: "#chapters".to_string(),
            search_result: "a.series_preview".to_string(),
            warning: "div.warning".to_string(),
            blocked_keywords: vec!["licensed".to_string(), "not available".to_string()],
            chapter_link: LinkRule::default(),
            chapter_number: ChapterNumbering::default(),
            page_selector: "select.m".to_string(),
            skip_page_values: vec![0],
            image_viewer: "#viewer".to_string(),
        }
    }
}

/// Which anchors on the catalog page are chapter links.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkRule {
    pub tag: String,
    /// Match by class. Takes precedence over `href_pattern`.
    pub class: Option<String>,
    pub href_pattern: Option<String>,
    /// Anchors carrying this class are buttons, not chapter links.
    pub exclude_class: Option<String>,
}

impl Default for LinkRule {
    fn default() -> Self {
        Self {
            tag: "a".to_string(),
            class: Some("tips".to_string()),
            href_pattern: None,
            exclude_class: None,
        }
    }
}

/// How a chapter number is derived from a chapter link. One strategy per
/// schema; they are never mixed within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChapterNumbering {
    /// Strip the series name from the link text and read the number after it.
    LinkText,
    /// First capture group of `pattern` applied to the link's href.
    UrlSegment { pattern: String },
}

impl Default for ChapterNumbering {
    fn default() -> Self {
        ChapterNumbering::UrlSegment {
            pattern: r"/c(\d+(?:\.\d+)?)(?:/|$)".to_string(),
        }
    }
}

impl SiteSchema {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading site schema {}", path.display()))?;
        let schema: SiteSchema = serde_json::from_str(&raw)
            .with_context(|| format!("parsing site schema {}", path.display()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Checks that every selector and pattern compiles.
    pub fn validate(&self) -> Result<(), MarkupError> {
        for selector in [
            &self.search_marker,
            &self.chapter_list_marker,
            &self.search_result,
            &self.warning,
            &self.page_selector,
            &self.image_viewer,
            &self.chapter_link.tag,
        ] {
            compile_selector(selector)?;
        }
        if let Some(pattern) = &self.chapter_link.href_pattern {
            compile_pattern(pattern)?;
        }
        if let ChapterNumbering::UrlSegment { pattern } = &self.chapter_number {
            compile_pattern(pattern)?;
        }
        Ok(())
    }

    pub fn catalog_url(&self, normalized: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.catalog_path.replace("{series}", normalized)
        )
    }

    pub fn search_url(&self, normalized: &str) -> String {
        let query = normalized.replace(self.name_separator, "+");
        format!("{}{}", self.base_url, self.search_path.replace("{query}", &query))
    }
}

pub fn compile_selector(selector: &str) -> Result<Selector, MarkupError> {
    Selector::parse(selector).map_err(|e| MarkupError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

pub fn compile_pattern(pattern: &str) -> Result<Regex, MarkupError> {
    Regex::new(pattern).map_err(|source| MarkupError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// How the fetcher talks to the site.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Minimum gap between two requests.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Where chapters go and what happens to them afterwards.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub archive: bool,
    pub delete_after_archive: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            archive: false,
            delete_after_archive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(3));
        assert_eq!(policy.delay_for(40), Duration::from_secs(3));
    }

    #[test]
    fn default_schema_is_valid() {
        SiteSchema::default().validate().unwrap();
    }

    #[test]
    fn partial_schema_file_keeps_defaults() {
        let json = r#"{
            "base_url": "http://fanfox.example/",
            "page_selector": "select.middle",
            "skip_page_values": [],
            "chapter_number": { "kind": "link_text" }
        }"#;
        let schema: SiteSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.base_url, "http://fanfox.example/");
        assert_eq!(schema.page_selector, "select.middle");
        assert!(schema.skip_page_values.is_empty());
        assert_eq!(schema.chapter_number, ChapterNumbering::LinkText);
        assert_eq!(schema.chapter_link.class.as_deref(), Some("tips"));
        assert_eq!(schema.image_viewer, "#viewer");
    }

    #[test]
    fn invalid_selector_is_reported() {
        let schema = SiteSchema {
            page_selector: "select[".to_string(),
            ..SiteSchema::default()
        };
        assert!(matches!(
            schema.validate(),
            Err(MarkupError::Selector { .. })
        ));
    }

    #[test]
    fn urls_embed_the_normalized_name() {
        let schema = SiteSchema::default();
        assert_eq!(
            schema.catalog_url("one_piece"),
            "http://mangafox.me/manga/one_piece/?no_warning=1"
        );
        assert_eq!(
            schema.search_url("one_piece"),
            "http://mangafox.me/search.php?name_method=cw&name=one+piece&advopts=1"
        );
    }
}
