//! External links: metainfo-stored references to data outside platform
//! storage. Only a closed set of URL schemes is accepted; anything else is
//! rejected when the link is built.

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

/// URL schemes the platform downloader understands. `raw` points at another
/// platform-managed file rather than an outside location.
pub const ACCEPTED_SCHEMES: [&str; 6] = ["http", "https", "ftp", "ascp", "s3", "raw"];

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("invalid link URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("unsupported link scheme {scheme:?} in {url:?}")]
    UnsupportedScheme { scheme: String, url: String },
}

/// A validated external link: display text, URL, and an optional format map
/// describing the linked data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    text: String,
    url: String,
    scheme: String,
    format: Option<IndexMap<String, String>>,
}

impl ExternalLink {
    /// Build a link with explicit display text.
    pub fn new(
        text: impl Into<String>,
        url: &str,
        format: Option<IndexMap<String, String>>,
    ) -> Result<Self, LinkError> {
        Self::build(Some(text.into()), url, format)
    }

    /// Build a link whose display text is derived from the URL's last path
    /// segment (percent-decoded), falling back to the full URL.
    pub fn from_url(url: &str) -> Result<Self, LinkError> {
        Self::build(None, url, None)
    }

    pub(crate) fn build(
        text: Option<String>,
        url: &str,
        format: Option<IndexMap<String, String>>,
    ) -> Result<Self, LinkError> {
        let parsed = Url::parse(url).map_err(|source| LinkError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let scheme = parsed.scheme().to_string();
        if !ACCEPTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(LinkError::UnsupportedScheme {
                scheme,
                url: url.to_string(),
            });
        }
        let text = text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| derive_text(&parsed));
        Ok(ExternalLink {
            text,
            url: url.to_string(),
            scheme,
            format,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn format(&self) -> Option<&IndexMap<String, String>> {
        self.format.as_ref()
    }

    /// True for `raw:` links, which name another platform-managed file.
    pub fn is_platform_reference(&self) -> bool {
        self.scheme == "raw"
    }
}

impl std::fmt::Display for ExternalLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn derive_text(url: &Url) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back());
    match last_segment {
        Some(segment) => percent_decode_str(segment)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string()),
        None => url.as_str().to_string(),
    }
}
