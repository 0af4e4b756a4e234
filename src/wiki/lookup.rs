//! The boundary between the resolver and the remote wiki API.

use crate::wiki::site::{SiteInfo, Wiki};
use thiserror::Error;

/// Why a request to a wiki failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("wiki does not exist")]
    NoWiki,

    #[error("HTTP {status}: {}", info.as_deref().unwrap_or("unexpected response"))]
    Status { status: u16, info: Option<String> },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryInfo {
    pub size: u64,
    pub pages: u64,
    pub files: u64,
    pub subcats: u64,
}

/// A page as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRecord {
    pub title: String,
    pub ns: i64,
    pub pageid: Option<u64>,
    pub missing: bool,
    pub known: bool,
    pub invalid: bool,
    pub special: bool,
    pub displaytitle: Option<String>,
    pub description: Option<String>,
    pub disambiguation: bool,
    pub extract: Option<String>,
    pub categoryinfo: Option<CategoryInfo>,
}

impl PageRecord {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            ..Self::default()
        }
    }
}

/// The first redirect the API followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    pub from: String,
    pub to: String,
    pub tofragment: Option<String>,
}

/// The API could not find the title locally and points at another wiki instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterwikiTarget {
    pub prefix: String,
    pub url: String,
    pub title: String,
}

/// Classified answer to a page lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PageLookup {
    Found {
        site: SiteInfo,
        page: PageRecord,
        redirect: Option<RedirectInfo>,
    },
    Interwiki {
        site: SiteInfo,
        target: InterwikiTarget,
        redirect: Option<RedirectInfo>,
    },
    /// No title was asked for; the site info is all there is.
    MainPage { site: SiteInfo },
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOptions {
    pub uselang: String,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchWhat {
    /// The wiki's default search mode.
    Default,
    /// Full-text search.
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub pageid: u64,
    pub ns: i64,
    pub title: String,
    pub redirecttitle: Option<String>,
    pub sectiontitle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub totalhits: Option<u64>,
}

#[serenity::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Site info plus whatever the API knows about `title`. An empty title asks
    /// for site info only.
    async fn lookup(&self, wiki: &Wiki, title: &str, options: &LookupOptions) -> PageLookup;

    async fn search(
        &self,
        wiki: &Wiki,
        term: &str,
        namespaces: &[i64],
        limit: usize,
        what: SearchWhat,
    ) -> Result<SearchResults, FetchError>;

    /// Title of a random page in one of `namespaces`.
    async fn random_title(&self, wiki: &Wiki, namespaces: &[i64]) -> Result<String, FetchError>;
}
