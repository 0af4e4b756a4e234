//! MediaWiki action API client

use crate::wiki::lookup::{
    CategoryInfo, FetchError, InterwikiTarget, LookupOptions, PageFetcher, PageLookup, PageRecord,
    RedirectInfo, SearchHit, SearchResults, SearchWhat,
};
use crate::wiki::site::{Namespace, SiteInfo, Wiki};
use crate::{log_internal, log_warning};
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Warnings the API emits for nearly every request. Not worth logging.
const IGNORED_WARNINGS: &[&str] = &[
    "Unrecognized parameter",
    "\"exlimit\" was too large",
    "exintro",
    "extract",
    "uselang",
];

#[derive(Deserialize)]
struct ApiResponse {
    batchcomplete: Option<serde_json::Value>,
    query: Option<ApiQuery>,
    warnings: Option<HashMap<String, serde_json::Value>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    info: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiQuery {
    general: Option<ApiGeneral>,
    namespaces: HashMap<String, ApiNamespace>,
    namespacealiases: Vec<ApiNamespaceAlias>,
    specialpagealiases: Vec<ApiSpecialPageAlias>,
    interwiki: Vec<ApiInterwiki>,
    redirects: Vec<ApiRedirect>,
    pages: Vec<ApiPage>,
    search: Vec<ApiSearchHit>,
    searchinfo: Option<ApiSearchInfo>,
    random: Vec<ApiRandom>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiGeneral {
    sitename: String,
    mainpage: String,
    server: String,
    articlepath: String,
    scriptpath: String,
    lang: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiNamespace {
    id: i64,
    name: String,
    canonical: Option<String>,
    content: bool,
}

#[derive(Deserialize)]
struct ApiNamespaceAlias {
    id: i64,
    alias: String,
}

#[derive(Deserialize)]
struct ApiSpecialPageAlias {
    realname: String,
    aliases: Vec<String>,
}

#[derive(Deserialize)]
struct ApiInterwiki {
    title: String,
    iw: String,
    url: String,
}

#[derive(Deserialize)]
struct ApiRedirect {
    from: String,
    to: String,
    tofragment: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiPage {
    pageid: Option<u64>,
    ns: i64,
    title: String,
    missing: bool,
    known: bool,
    invalid: bool,
    special: bool,
    pageprops: Option<ApiPageProps>,
    extract: Option<String>,
    categoryinfo: Option<ApiCategoryInfo>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiPageProps {
    displaytitle: Option<String>,
    description: Option<String>,
    disambiguation: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiCategoryInfo {
    size: u64,
    pages: u64,
    files: u64,
    subcats: u64,
}

#[derive(Deserialize)]
struct ApiSearchHit {
    #[serde(default)]
    pageid: u64,
    #[serde(default)]
    ns: i64,
    title: String,
    redirecttitle: Option<String>,
    sectiontitle: Option<String>,
}

#[derive(Deserialize)]
struct ApiSearchInfo {
    totalhits: Option<u64>,
}

#[derive(Deserialize)]
struct ApiRandom {
    title: String,
}

impl From<ApiPage> for PageRecord {
    fn from(page: ApiPage) -> Self {
        let props = page.pageprops.unwrap_or_default();
        PageRecord {
            title: page.title,
            ns: page.ns,
            pageid: page.pageid.filter(|&id| id != 0),
            missing: page.missing,
            known: page.known,
            invalid: page.invalid,
            special: page.special,
            displaytitle: props.displaytitle,
            description: props.description,
            disambiguation: props.disambiguation.is_some(),
            extract: page.extract.filter(|extract| !extract.trim().is_empty()),
            categoryinfo: page.categoryinfo.map(|info| CategoryInfo {
                size: info.size,
                pages: info.pages,
                files: info.files,
                subcats: info.subcats,
            }),
        }
    }
}

impl From<ApiRedirect> for RedirectInfo {
    fn from(redirect: ApiRedirect) -> Self {
        RedirectInfo {
            from: redirect.from,
            to: redirect.to,
            tofragment: redirect.tofragment,
        }
    }
}

fn site_info(query: &mut ApiQuery) -> SiteInfo {
    let general = query.general.take().unwrap_or_default();
    let mut namespaces: Vec<Namespace> = query
        .namespaces
        .drain()
        .map(|(_, ns)| Namespace {
            id: ns.id,
            name: ns.name,
            canonical: ns.canonical,
            content: ns.content,
        })
        .collect();
    namespaces.sort_by_key(|ns| ns.id);

    SiteInfo {
        sitename: general.sitename,
        mainpage: general.mainpage,
        server: general.server,
        articlepath: general.articlepath,
        scriptpath: general.scriptpath,
        lang: general.lang,
        namespaces,
        namespace_aliases: query
            .namespacealiases
            .drain(..)
            .map(|alias| (alias.id, alias.alias))
            .collect(),
        special_page_aliases: query
            .specialpagealiases
            .drain(..)
            .map(|alias| (alias.realname, alias.aliases))
            .collect(),
    }
}

fn namespace_list(namespaces: &[i64]) -> String {
    namespaces
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Reqwest-backed `PageFetcher`.
pub struct MediaWikiClient {
    client: reqwest::Client,
}

impl MediaWikiClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Could not build HTTP client: {}", e))?;
        Ok(Self { client })
    }

    /// Run one API query and return its `query` object, or why there is none.
    async fn query(&self, wiki: &Wiki, params: &[(&str, &str)]) -> Result<ApiQuery, FetchError> {
        let response = match self
            .client
            .get(wiki.api_url())
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let final_url = e.url().map(|url| url.to_string());
                if wiki.no_wiki(e.status().map(|s| s.as_u16()), final_url.as_deref()) {
                    return Err(FetchError::NoWiki);
                }
                log_internal!("Request to {} failed: {}", wiki.name(), e);
                return Err(FetchError::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = match response.json::<ApiResponse>().await {
            Ok(body) => Some(body),
            Err(e) => {
                if status == 200 {
                    log_internal!("Unreadable response from {}: {}", wiki.name(), e);
                }
                None
            }
        };

        let Some(body) = body else {
            if wiki.no_wiki(Some(status), Some(&final_url)) {
                return Err(FetchError::NoWiki);
            }
            return Err(if status == 200 {
                FetchError::Malformed("response is not an API result".to_owned())
            } else {
                FetchError::Status { status, info: None }
            });
        };

        if let Some(warnings) = &body.warnings {
            log_api_warnings(wiki, warnings);
        }

        match (status, body.batchcomplete, body.query) {
            (200, Some(_), Some(query)) => Ok(query),
            (_, _, query) => {
                if wiki.no_wiki(Some(status), Some(&final_url)) {
                    return Err(FetchError::NoWiki);
                }
                let info = body.error.map(|error| error.info);
                if status == 200 && info.is_none() {
                    // Valid JSON without a complete batch, nothing usable.
                    return Err(FetchError::Malformed(match query {
                        Some(_) => "incomplete batch".to_owned(),
                        None => "missing query".to_owned(),
                    }));
                }
                Err(FetchError::Status { status, info })
            }
        }
    }
}

fn log_api_warnings(wiki: &Wiki, warnings: &HashMap<String, serde_json::Value>) {
    for (module, warning) in warnings {
        let text = warning
            .get("warnings")
            .or_else(|| warning.get("*"))
            .and_then(|text| text.as_str())
            .unwrap_or_default();
        let interesting = text
            .lines()
            .filter(|line| !IGNORED_WARNINGS.iter().any(|ignored| line.contains(ignored)))
            .collect::<Vec<_>>();
        if !interesting.is_empty() {
            log_warning!("{} API warning in {}: {}", wiki.name(), module, interesting.join(" | "));
        }
    }
}

#[serenity::async_trait]
impl PageFetcher for MediaWikiClient {
    async fn lookup(&self, wiki: &Wiki, title: &str, options: &LookupOptions) -> PageLookup {
        let mut params = vec![
            ("meta", "siteinfo"),
            (
                "siprop",
                "general|namespaces|namespacealiases|specialpagealiases",
            ),
            ("iwurl", "true"),
            ("uselang", options.uselang.as_str()),
        ];
        if options.follow_redirects {
            params.push(("redirects", "true"));
        }
        if !title.is_empty() {
            params.extend([
                ("titles", title),
                ("prop", "info|pageprops|extracts|categoryinfo"),
                ("ppprop", "description|displaytitle|disambiguation"),
                ("exsentences", "10"),
                ("exintro", "true"),
                ("explaintext", "true"),
                ("exsectionformat", "plain"),
                ("exlimit", "1"),
            ]);
        }

        let mut query = match self.query(wiki, &params).await {
            Ok(query) => query,
            Err(e) => return PageLookup::Failed(e),
        };
        let site = site_info(&mut query);
        let redirect = query.redirects.into_iter().next().map(RedirectInfo::from);

        if let Some(page) = query.pages.into_iter().next() {
            return PageLookup::Found {
                site,
                page: page.into(),
                redirect,
            };
        }
        if let Some(interwiki) = query.interwiki.into_iter().next() {
            return PageLookup::Interwiki {
                site,
                target: InterwikiTarget {
                    prefix: interwiki.iw,
                    url: interwiki.url,
                    title: interwiki.title,
                },
                redirect,
            };
        }
        PageLookup::MainPage { site }
    }

    async fn search(
        &self,
        wiki: &Wiki,
        term: &str,
        namespaces: &[i64],
        limit: usize,
        what: SearchWhat,
    ) -> Result<SearchResults, FetchError> {
        let namespaces = namespace_list(namespaces);
        let limit = limit.to_string();
        let mut params = vec![
            ("list", "search"),
            ("srsearch", term),
            ("srnamespace", namespaces.as_str()),
            ("srlimit", limit.as_str()),
            ("srinfo", "totalhits"),
            ("srprop", "redirecttitle|sectiontitle"),
        ];
        if what == SearchWhat::Text {
            params.push(("srwhat", "text"));
        }

        let query = self.query(wiki, &params).await?;
        Ok(SearchResults {
            hits: query
                .search
                .into_iter()
                .map(|hit| SearchHit {
                    pageid: hit.pageid,
                    ns: hit.ns,
                    title: hit.title,
                    redirecttitle: hit.redirecttitle,
                    sectiontitle: hit.sectiontitle,
                })
                .collect(),
            totalhits: query.searchinfo.and_then(|info| info.totalhits),
        })
    }

    async fn random_title(&self, wiki: &Wiki, namespaces: &[i64]) -> Result<String, FetchError> {
        let namespaces = namespace_list(namespaces);
        let query = self
            .query(
                wiki,
                &[
                    ("list", "random"),
                    ("rnnamespace", namespaces.as_str()),
                    ("rnlimit", "1"),
                ],
            )
            .await?;
        query
            .random
            .into_iter()
            .next()
            .map(|page| page.title)
            .ok_or_else(|| FetchError::Malformed("no random page returned".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_response_deserializes() {
        let body = r#"{
            "batchcomplete": true,
            "query": {
                "redirects": [{"from": "Rust lang", "to": "Rust (programming language)", "tofragment": "History"}],
                "pages": [{
                    "pageid": 29414838, "ns": 0, "title": "Rust (programming language)",
                    "contentmodel": "wikitext",
                    "pageprops": {"description": "General-purpose programming language"},
                    "extract": "Rust is a general-purpose programming language."
                }],
                "general": {"sitename": "Wikipedia", "mainpage": "Main Page", "server": "//en.wikipedia.org",
                            "articlepath": "/wiki/$1", "scriptpath": "/w", "lang": "en"},
                "namespaces": {
                    "-1": {"id": -1, "case": "first-letter", "name": "Special", "canonical": "Special"},
                    "0": {"id": 0, "case": "first-letter", "name": "", "content": true}
                },
                "namespacealiases": [{"id": 4, "alias": "WP"}],
                "specialpagealiases": [{"realname": "Contributions", "aliases": ["Contributions", "Contribs"]}]
            }
        }"#;
        let response: ApiResponse = serde_json::from_str(body).unwrap();
        assert!(response.batchcomplete.is_some());
        let mut query = response.query.unwrap();
        let site = site_info(&mut query);
        assert_eq!(site.server, "//en.wikipedia.org");
        assert_eq!(site.namespaces.len(), 2);
        assert_eq!(site.namespaces[0].id, -1);
        assert_eq!(site.namespace_aliases, vec![(4, "WP".to_owned())]);

        let redirect: RedirectInfo = query.redirects.into_iter().next().unwrap().into();
        assert_eq!(redirect.tofragment.as_deref(), Some("History"));
        let page: PageRecord = query.pages.into_iter().next().unwrap().into();
        assert_eq!(page.pageid, Some(29414838));
        assert!(!page.missing);
        assert!(!page.disambiguation);
        assert_eq!(
            page.description.as_deref(),
            Some("General-purpose programming language")
        );
    }

    #[test]
    fn test_missing_page_flags() {
        let body = r#"{"batchcomplete": true, "query": {"pages": [
            {"ns": 6, "title": "File:Nope.png", "missing": true, "known": true,
             "pageprops": {"disambiguation": ""}}
        ]}}"#;
        let response: ApiResponse = serde_json::from_str(body).unwrap();
        let page: PageRecord = response.query.unwrap().pages.into_iter().next().unwrap().into();
        assert!(page.missing && page.known);
        assert!(page.disambiguation);
        assert_eq!(page.pageid, None);
    }

    #[test]
    fn test_error_response_deserializes() {
        let body = r#"{"error": {"code": "readapidenied", "info": "You need read permission."}}"#;
        let response: ApiResponse = serde_json::from_str(body).unwrap();
        assert!(response.query.is_none());
        assert_eq!(response.error.unwrap().info, "You need read permission.");
    }

    #[test]
    fn test_namespace_list() {
        assert_eq!(namespace_list(&[0, 14, 3000]), "0|14|3000");
        assert_eq!(namespace_list(&[]), "");
    }
}
