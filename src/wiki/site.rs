//! A reference to one MediaWiki installation.

use crate::wiki::encoding::{encode_title, to_section};
use crate::wiki::query::QueryParams;
use anyhow::{anyhow, Result};
use std::fmt;
use url::Url;

/// Namespace ID of the special namespace.
pub const NS_SPECIAL: i64 = -1;

/// A namespace as reported by site info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub id: i64,
    pub name: String,
    pub canonical: Option<String>,
    pub content: bool,
}

/// Site metadata from a site-info query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInfo {
    pub sitename: String,
    pub mainpage: String,
    /// Server, possibly protocol-relative (`//example.org`).
    pub server: String,
    pub articlepath: String,
    pub scriptpath: String,
    pub lang: String,
    pub namespaces: Vec<Namespace>,
    /// (namespace id, alias)
    pub namespace_aliases: Vec<(i64, String)>,
    /// (canonical special page name, localized aliases)
    pub special_page_aliases: Vec<(String, Vec<String>)>,
}

/// A wiki reference. Constructed once per target wiki and refreshed from site info.
#[derive(Debug, Clone)]
pub struct Wiki {
    /// Script path URL, always ending in `/`.
    base: Url,
    /// Article path relative to the server, containing `$1`.
    articlepath: String,
    pub space_replacement: String,
    pub sitename: String,
    pub mainpage: String,
    pub lang: String,
    pub namespaces: Vec<Namespace>,
    pub namespace_aliases: Vec<(i64, String)>,
    pub special_page_aliases: Vec<(String, Vec<String>)>,
}

impl Wiki {
    /// Build a wiki reference from its script path URL, e.g. `https://en.wikipedia.org/w/`.
    pub fn new(script_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(script_url).map_err(|e| anyhow!("Invalid wiki URL `{}`: {}", script_url, e))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(anyhow!("Wiki URL `{}` is not an http(s) URL", script_url));
        }
        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let articlepath = format!("{}index.php?title=$1", base.path());

        Ok(Self {
            base,
            articlepath,
            space_replacement: "_".to_owned(),
            sitename: String::new(),
            mainpage: String::new(),
            lang: String::new(),
            namespaces: Vec::new(),
            namespace_aliases: Vec::new(),
            special_page_aliases: Vec::new(),
        })
    }

    /// Build a wiki reference with a known article path such as `/wiki/$1`.
    pub fn with_article_path(script_url: &str, articlepath: &str) -> Result<Self> {
        let mut wiki = Self::new(script_url)?;
        wiki.set_article_path(articlepath);
        Ok(wiki)
    }

    fn set_article_path(&mut self, articlepath: &str) {
        self.articlepath = if articlepath.contains("$1") {
            articlepath.to_owned()
        } else {
            format!("{}$1", articlepath)
        };
    }

    /// Refresh from a site-info response. Site info is idempotent metadata.
    pub fn update(&mut self, site: &SiteInfo) {
        if !site.server.is_empty() {
            let server = if site.server.starts_with("//") {
                format!("{}:{}", self.base.scheme(), site.server)
            } else {
                site.server.clone()
            };
            if let Ok(base) = Url::parse(&format!("{}{}/", server, site.scriptpath)) {
                self.base = base;
            }
        }
        if !site.articlepath.is_empty() {
            self.set_article_path(&site.articlepath);
        }
        self.sitename = site.sitename.clone();
        self.mainpage = site.mainpage.clone();
        self.lang = site.lang.clone();
        self.namespaces = site.namespaces.clone();
        self.namespace_aliases = site.namespace_aliases.clone();
        self.special_page_aliases = site.special_page_aliases.clone();
    }

    /// Script path URL, e.g. `https://en.wikipedia.org/w/`.
    pub fn href(&self) -> &str {
        self.base.as_str()
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// Host plus explicit port, as in `Url::host` + `:port` in a browser.
    pub fn authority(&self) -> String {
        match self.base.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_owned(),
        }
    }

    /// Short name used in logs and prompts.
    pub fn name(&self) -> String {
        format!("{}{}", self.host(), self.base.path().trim_end_matches('/'))
    }

    pub fn api_url(&self) -> String {
        format!("{}api.php", self.base)
    }

    pub fn index_url(&self) -> String {
        format!("{}index.php", self.base)
    }

    pub fn articlepath(&self) -> &str {
        &self.articlepath
    }

    /// Article path without its query and without `$1`, e.g. `/wiki/`.
    pub fn article_prefix(&self) -> String {
        self.articlepath
            .split('?')
            .next()
            .unwrap_or_default()
            .replace("$1", "")
    }

    /// Full article URL template, e.g. `https://example.org/wiki/$1`.
    pub fn article_url(&self) -> Option<Url> {
        self.base.join(&self.articlepath).ok()
    }

    /// Canonical link to `title` with extra query parameters and a section.
    pub fn to_link(&self, title: &str, query: &QueryParams, fragment: &str) -> String {
        let encoded = encode_title(title, &self.space_replacement);
        let Some(mut link) = self.article_url() else {
            return format!("{}index.php?title={}", self.base, encoded);
        };

        let path = link.path().replace("$1", &encoded).replace("%241", &encoded);
        link.set_path(&path);
        if link.query().is_some() {
            let template = QueryParams::from_url(&link);
            link.set_query(None);
            let filled: QueryParams = template
                .iter()
                .map(|(name, value)| (name, value.replace("$1", title)))
                .collect();
            filled.append_to(&mut link);
        }
        query.append_to(&mut link);
        if !fragment.is_empty() {
            link.set_fragment(Some(&to_section(fragment, &self.space_replacement)));
        }
        link.to_string()
    }

    pub fn namespace(&self, id: i64) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.id == id)
    }

    /// Localized name of the special namespace.
    pub fn special_namespace(&self) -> &str {
        self.namespace(NS_SPECIAL)
            .map(|ns| ns.name.as_str())
            .unwrap_or("Special")
    }

    /// First localized alias of a special page, falling back to its canonical name.
    pub fn special_alias<'a>(&'a self, realname: &'a str) -> &'a str {
        self.special_page_aliases
            .iter()
            .find(|(name, _)| name == realname)
            .and_then(|(_, aliases)| aliases.first())
            .map(String::as_str)
            .unwrap_or(realname)
    }

    /// Content namespace IDs, defaulting to the main namespace.
    pub fn content_namespaces(&self) -> Vec<i64> {
        let ids: Vec<i64> = self
            .namespaces
            .iter()
            .filter(|ns| ns.content)
            .map(|ns| ns.id)
            .collect();
        if ids.is_empty() {
            vec![0]
        } else {
            ids
        }
    }

    /// Whether a failed request indicates the wiki does not exist at all.
    pub fn no_wiki(&self, status: Option<u16>, final_url: Option<&str>) -> bool {
        if matches!(status, Some(404) | Some(410)) {
            return true;
        }
        final_url.is_some_and(|url| {
            url.contains("Not_a_valid_community") || url.contains("/wiki/Special:NotAValidWiki")
        })
    }
}

impl fmt::Display for Wiki {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.href())
    }
}

impl PartialEq for Wiki {
    fn eq(&self, other: &Self) -> bool {
        self.href() == other.href()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn site_info(server: &str, scriptpath: &str, articlepath: &str) -> SiteInfo {
        SiteInfo {
            sitename: "Example Wiki".to_owned(),
            mainpage: "Main Page".to_owned(),
            server: server.to_owned(),
            articlepath: articlepath.to_owned(),
            scriptpath: scriptpath.to_owned(),
            lang: "en".to_owned(),
            namespaces: vec![
                Namespace {
                    id: -1,
                    name: "Special".to_owned(),
                    canonical: Some("Special".to_owned()),
                    content: false,
                },
                Namespace {
                    id: 0,
                    name: String::new(),
                    canonical: None,
                    content: true,
                },
                Namespace {
                    id: 2,
                    name: "User".to_owned(),
                    canonical: Some("User".to_owned()),
                    content: false,
                },
            ],
            namespace_aliases: vec![],
            special_page_aliases: vec![(
                "Contributions".to_owned(),
                vec!["Contributions".to_owned(), "Contribs".to_owned()],
            )],
        }
    }

    #[test]
    fn test_new_normalizes_trailing_slash() {
        let wiki = Wiki::new("https://example.wiki/w").unwrap();
        assert_eq!(wiki.href(), "https://example.wiki/w/");
        assert_eq!(wiki.articlepath(), "/w/index.php?title=$1");
        assert_eq!(wiki.api_url(), "https://example.wiki/w/api.php");
        assert!(Wiki::new("not a url").is_err());
        assert!(Wiki::new("ftp://example.wiki/").is_err());
    }

    #[test]
    fn test_update_from_site_info() {
        let mut wiki = Wiki::new("https://example.wiki/").unwrap();
        wiki.update(&site_info("//example.wiki", "/w", "/wiki/$1"));
        assert_eq!(wiki.href(), "https://example.wiki/w/");
        assert_eq!(wiki.article_prefix(), "/wiki/");
        assert_eq!(wiki.mainpage, "Main Page");
        assert_eq!(wiki.special_namespace(), "Special");
        assert_eq!(wiki.special_alias("Contributions"), "Contributions");
        assert_eq!(wiki.special_alias("Search"), "Search");
        assert_eq!(wiki.content_namespaces(), vec![0]);
    }

    #[test]
    fn test_to_link_article_path() {
        let wiki = Wiki::with_article_path("https://example.wiki/w/", "/wiki/$1").unwrap();
        assert_eq!(
            wiki.to_link("Main Page", &QueryParams::new(), ""),
            "https://example.wiki/wiki/Main_Page"
        );
        assert_eq!(
            wiki.to_link("A/B", &QueryParams::parse("action=history"), "Early life"),
            "https://example.wiki/wiki/A/B?action=history#Early_life"
        );
    }

    #[test]
    fn test_to_link_query_article_path() {
        let wiki = Wiki::new("https://example.wiki/").unwrap();
        assert_eq!(
            wiki.to_link("Foo Bar", &QueryParams::new(), ""),
            "https://example.wiki/index.php?title=Foo+Bar"
        );
    }

    #[test]
    fn test_no_wiki() {
        let wiki = Wiki::new("https://example.wiki/").unwrap();
        assert!(wiki.no_wiki(Some(404), None));
        assert!(wiki.no_wiki(
            Some(200),
            Some("https://community.fandom.com/wiki/Community_Central:Not_a_valid_community")
        ));
        assert!(!wiki.no_wiki(Some(500), Some("https://example.wiki/api.php")));
    }
}
