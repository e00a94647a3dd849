use regex::Regex;
use scraper::{ElementRef, Html};

use crate::config::compile_selector;
use crate::error::MarkupError;
use crate::utils::clean_text;

/// A parsed HTML page exposing only the lookups the crawler needs.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &[u8]) -> Self {
        Self::parse_str(&String::from_utf8_lossy(body))
    }

    pub fn parse_str(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// All elements matching a CSS selector, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, MarkupError> {
        let selector = compile_selector(selector)?;
        Ok(self.html.select(&selector).collect())
    }

    pub fn first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, MarkupError> {
        let selector = compile_selector(selector)?;
        Ok(self.html.select(&selector).next())
    }

    pub fn contains(&self, selector: &str) -> Result<bool, MarkupError> {
        Ok(self.first(selector)?.is_some())
    }

    /// `<tag class="... class ...">` elements.
    pub fn find_by_tag_and_class(
        &self,
        tag: &str,
        class: &str,
    ) -> Result<Vec<ElementRef<'_>>, MarkupError> {
        Ok(self
            .select(tag)?
            .into_iter()
            .filter(|el| has_class(el, class))
            .collect())
    }

    /// `<tag href="...">` elements whose href matches `pattern`.
    pub fn find_by_href_pattern(
        &self,
        tag: &str,
        pattern: &Regex,
    ) -> Result<Vec<ElementRef<'_>>, MarkupError> {
        Ok(self
            .select(tag)?
            .into_iter()
            .filter(|el| el.value().attr("href").is_some_and(|href| pattern.is_match(href)))
            .collect())
    }
}

pub fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Visible text of an element with whitespace collapsed.
pub fn text_of(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}
