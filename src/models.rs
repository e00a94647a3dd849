use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Exact decimal chapter number such as `12` or `10.5`.
///
/// The whole and fractional parts are stored separately with trailing zeros
/// removed from the fraction, so the derived ordering is numeric ordering and
/// `10.50 == 10.5`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChapterKey {
    whole: u64,
    fraction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a chapter number")]
pub struct ParseChapterKeyError(pub String);

impl ChapterKey {
    pub fn whole(whole: u64) -> Self {
        Self {
            whole,
            fraction: String::new(),
        }
    }

    pub fn is_fractional(&self) -> bool {
        !self.fraction.is_empty()
    }

    /// Directory-friendly form, whole part padded to three digits: `003`, `010.5`.
    pub fn dir_name(&self) -> String {
        if self.fraction.is_empty() {
            format!("{:03}", self.whole)
        } else {
            format!("{:03}.{}", self.whole, self.fraction)
        }
    }
}

impl FromStr for ChapterKey {
    type Err = ParseChapterKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseChapterKeyError(s.to_string());

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let whole = whole.parse::<u64>().map_err(|_| err())?;
        Ok(Self {
            whole,
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction.is_empty() {
            write!(f, "{}", self.whole)
        } else {
            write!(f, "{}.{}", self.whole, self.fraction)
        }
    }
}

impl Serialize for ChapterKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a chapter's first page lives, exactly as the listing gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChapterLocator(String);

impl ChapterLocator {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChapterLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved, directly fetchable page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageImageUrl(String);

impl PageImageUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All chapters of one series, keyed and iterated in ascending chapter order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ChapterCatalog {
    chapters: BTreeMap<ChapterKey, ChapterLocator>,
}

impl ChapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a chapter. A later locator for an existing key replaces the
    /// earlier one.
    pub fn insert(&mut self, key: ChapterKey, locator: ChapterLocator) {
        if let Some(previous) = self.chapters.insert(key.clone(), locator.clone()) {
            if previous != locator {
                warn!(
                    "chapter {} listed twice, using {} instead of {}",
                    key, locator, previous
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, key: &ChapterKey) -> Option<&ChapterLocator> {
        self.chapters.get(key)
    }

    pub fn first_key(&self) -> Option<&ChapterKey> {
        self.chapters.keys().next()
    }

    pub fn last_key(&self) -> Option<&ChapterKey> {
        self.chapters.keys().next_back()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ChapterKey> {
        self.chapters.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChapterKey, &ChapterLocator)> {
        self.chapters.iter()
    }

    /// Chapters falling inside `range`, ascending.
    pub fn select(
        &self,
        range: &DownloadRange,
    ) -> Result<Vec<(&ChapterKey, &ChapterLocator)>, RangeError> {
        let Some(max) = self.last_key() else {
            return Ok(Vec::new());
        };
        let (start, end) = range.bounds(max)?;
        Ok(self.chapters.range(start..=end).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chapter range start {start} is after end {end}")]
pub struct RangeError {
    pub start: ChapterKey,
    pub end: ChapterKey,
}

/// Closed interval of chapters to download. An open end means "up to the
/// newest chapter in the catalog".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRange {
    pub start: ChapterKey,
    pub end: Option<ChapterKey>,
}

impl Default for DownloadRange {
    fn default() -> Self {
        Self {
            start: ChapterKey::whole(1),
            end: None,
        }
    }
}

impl DownloadRange {
    pub fn new(start: ChapterKey, end: Option<ChapterKey>) -> Result<Self, RangeError> {
        if let Some(end) = &end {
            if &start > end {
                return Err(RangeError {
                    start,
                    end: end.clone(),
                });
            }
        }
        Ok(Self { start, end })
    }

    pub fn single(key: ChapterKey) -> Self {
        Self {
            start: key.clone(),
            end: Some(key),
        }
    }

    /// Concrete `(start, end)` once the catalog maximum is known.
    pub fn bounds(&self, max: &ChapterKey) -> Result<(ChapterKey, ChapterKey), RangeError> {
        let end = self.end.clone().unwrap_or_else(|| max.clone());
        if self.start > end {
            return Err(RangeError {
                start: self.start.clone(),
                end,
            });
        }
        Ok((self.start.clone(), end))
    }
}

impl fmt::Display for DownloadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) if end == &self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}..={}", self.start, end),
            None => write!(f, "{}..", self.start),
        }
    }
}
