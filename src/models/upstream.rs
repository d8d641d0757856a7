//! Request models for the upstream reader and search APIs.

use serde::{Deserialize, Serialize};

/// Default number of search results requested from the upstream
pub const DEFAULT_SEARCH_LIMIT: i64 = 5;

/// Request for converting a URL to markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderRequest {
    /// Page to read
    pub url: String,

    /// Append a summary of the links found on the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_links_summary: Option<bool>,

    /// Include page metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_metadata: Option<bool>,

    /// Highlight the main content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_highlight: Option<bool>,

    /// Render shadow DOM content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_shadow_dom: Option<bool>,
}

impl ReaderRequest {
    /// Create a new reader request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            with_links_summary: None,
            with_metadata: None,
            with_highlight: None,
            with_shadow_dom: None,
        }
    }

    /// Set the links summary flag
    pub fn links_summary(mut self, enabled: bool) -> Self {
        self.with_links_summary = Some(enabled);
        self
    }

    /// Set the metadata flag
    pub fn metadata(mut self, enabled: bool) -> Self {
        self.with_metadata = Some(enabled);
        self
    }

    /// Set the highlight flag
    pub fn highlight(mut self, enabled: bool) -> Self {
        self.with_highlight = Some(enabled);
        self
    }

    /// Set the shadow DOM flag
    pub fn shadow_dom(mut self, enabled: bool) -> Self {
        self.with_shadow_dom = Some(enabled);
        self
    }

    /// Upstream option headers for the flags that are set
    pub fn option_headers(&self) -> Vec<(&'static str, String)> {
        [
            ("X-With-Links-Summary", self.with_links_summary),
            ("X-With-Metadata", self.with_metadata),
            ("X-With-Highlight", self.with_highlight),
            ("X-With-Shadow-Dom", self.with_shadow_dom),
        ]
        .into_iter()
        .filter_map(|(name, flag)| flag.map(|f| (name, f.to_string())))
        .collect()
    }
}

/// Web search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Search query string
    pub q: String,

    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Include images in results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_images: Option<bool>,

    /// Include site favicons in results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_favicons: Option<bool>,

    /// Locale hint, e.g. "en-US"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

impl SearchRequest {
    /// Create a new search request with the default limit
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            with_images: None,
            with_favicons: None,
            locale: None,
        }
    }

    /// Set maximum results
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the images flag
    pub fn images(mut self, enabled: bool) -> Self {
        self.with_images = Some(enabled);
        self
    }

    /// Set the favicons flag
    pub fn favicons(mut self, enabled: bool) -> Self {
        self.with_favicons = Some(enabled);
        self
    }

    /// Set the locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Upstream option headers for the options that are set
    pub fn option_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers: Vec<(&'static str, String)> = [
            ("X-With-Images", self.with_images),
            ("X-With-Favicons", self.with_favicons),
        ]
        .into_iter()
        .filter_map(|(name, flag)| flag.map(|f| (name, f.to_string())))
        .collect();

        if let Some(ref locale) = self.locale {
            headers.push(("X-Locale", locale.clone()));
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_headers_only_for_set_flags() {
        let request = ReaderRequest::new("https://example.com")
            .links_summary(true)
            .shadow_dom(false);

        assert_eq!(
            request.option_headers(),
            vec![
                ("X-With-Links-Summary", "true".to_string()),
                ("X-With-Shadow-Dom", "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_defaults() {
        let request = SearchRequest::new("rust");
        assert_eq!(request.limit, 5);
        assert!(request.option_headers().is_empty());

        let parsed: SearchRequest = serde_json::from_str(r#"{"q":"rust"}"#).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_search_locale_header() {
        let request = SearchRequest::new("rust").images(true).locale("de-DE");
        assert_eq!(
            request.option_headers(),
            vec![
                ("X-With-Images", "true".to_string()),
                ("X-Locale", "de-DE".to_string()),
            ]
        );
    }
}
