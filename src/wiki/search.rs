//! Title search with a full-text top-up.

use crate::wiki::lookup::{
    FetchError, LookupOptions, PageFetcher, PageLookup, SearchHit, SearchResults, SearchWhat,
};
use crate::wiki::normalize::MAX_TITLE_LENGTH;
use crate::wiki::query::QueryParams;
use crate::wiki::site::Wiki;

/// Project, help and category namespaces are always searched.
const EXTRA_NAMESPACES: &[i64] = &[4, 12, 14];

/// What a lookup of the search term itself found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactMatch {
    Page {
        title: String,
        ns: i64,
        redirect_from: Option<String>,
        section: Option<String>,
    },
    Interwiki {
        link: String,
    },
}

/// One line of a search answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub title: String,
    pub link: String,
    /// This is the page the term names exactly.
    pub exact: bool,
    pub redirect: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub wiki: Wiki,
    pub term: String,
    pub entries: Vec<SearchEntry>,
    pub totalhits: Option<u64>,
    /// Link to the wiki's own search page for the term.
    pub link: String,
    pub truncated: bool,
}

fn fold(title: &str) -> String {
    title.replace(['_', '-'], " ").to_lowercase()
}

/// Search `wiki` for `term`.
///
/// The term is looked up as a title first. Its namespace joins the searched ones and
/// the page it names is highlighted or, if search missed it, put first.
pub async fn search(
    fetcher: &dyn PageFetcher,
    mut wiki: Wiki,
    term: &str,
    limit: usize,
    uselang: &str,
) -> Result<SearchReport, FetchError> {
    let truncated = term.chars().count() > MAX_TITLE_LENGTH;
    let term: String = term.chars().take(MAX_TITLE_LENGTH).collect();

    let options = LookupOptions {
        uselang: uselang.to_owned(),
        follow_redirects: true,
    };
    let exact = match fetcher.lookup(&wiki, &term, &options).await {
        PageLookup::Failed(error) => return Err(error),
        PageLookup::Found {
            site,
            page,
            redirect,
        } => {
            wiki.update(&site);
            (!page.invalid && (!page.missing || page.known)).then(|| ExactMatch::Page {
                title: page.title,
                ns: page.ns,
                section: redirect.as_ref().and_then(|r| r.tofragment.clone()),
                redirect_from: redirect.map(|r| r.from),
            })
        }
        PageLookup::Interwiki { site, target, .. } => {
            wiki.update(&site);
            Some(ExactMatch::Interwiki { link: target.url })
        }
        PageLookup::MainPage { site } => {
            wiki.update(&site);
            None
        }
    };

    let mut namespaces: Vec<i64> = EXTRA_NAMESPACES.to_vec();
    if let Some(ExactMatch::Page { ns, .. }) = &exact {
        if *ns >= 0 {
            namespaces.push(*ns);
        }
    }
    namespaces.extend(wiki.content_namespaces());
    namespaces.sort_unstable();
    namespaces.dedup();

    let mut results = fetcher
        .search(&wiki, &term, &namespaces, limit, SearchWhat::Default)
        .await?;
    if results.hits.len() < limit {
        // The first page of results is still worth showing if the top-up fails.
        if let Ok(text) = fetcher
            .search(&wiki, &term, &namespaces, limit, SearchWhat::Text)
            .await
        {
            results = merge(results, text, limit);
        }
    }

    let search_query: QueryParams = [("search", term.as_str())].into_iter().collect();
    Ok(SearchReport {
        entries: entries(&wiki, &results.hits, exact.as_ref()),
        link: wiki.to_link("Special:Search", &search_query, ""),
        totalhits: results.totalhits,
        term,
        truncated,
        wiki,
    })
}

/// Turn hits into lines, marking or prepending the exact match.
pub fn entries(wiki: &Wiki, hits: &[SearchHit], exact: Option<&ExactMatch>) -> Vec<SearchEntry> {
    let exact_title = match exact {
        Some(ExactMatch::Page { title, .. }) => Some(fold(title)),
        _ => None,
    };
    let mut found_exact = false;

    let mut entries: Vec<SearchEntry> = hits
        .iter()
        .map(|hit| {
            let is_exact = exact_title.as_deref() == Some(fold(&hit.title).as_str());
            found_exact |= is_exact;
            let (redirect, section) = match exact {
                Some(ExactMatch::Page {
                    redirect_from,
                    section,
                    ..
                }) if is_exact => (redirect_from.clone(), section.clone()),
                _ => (hit.redirecttitle.clone(), hit.sectiontitle.clone()),
            };
            SearchEntry {
                link: wiki.to_link(&hit.title, &QueryParams::new(), section.as_deref().unwrap_or_default()),
                title: hit.title.clone(),
                exact: is_exact,
                redirect,
                section,
            }
        })
        .collect();

    if !found_exact {
        let first = match exact {
            Some(ExactMatch::Page {
                title,
                redirect_from,
                section,
                ..
            }) => Some(SearchEntry {
                link: wiki.to_link(title, &QueryParams::new(), section.as_deref().unwrap_or_default()),
                title: title.clone(),
                exact: true,
                redirect: redirect_from.clone(),
                section: section.clone(),
            }),
            Some(ExactMatch::Interwiki { link }) => Some(SearchEntry {
                title: link.clone(),
                link: link.clone(),
                exact: true,
                redirect: None,
                section: None,
            }),
            None => None,
        };
        if let Some(first) = first {
            entries.insert(0, first);
        }
    }
    entries
}

/// Append `second` to `first`, skipping pages already present, capped at `limit`.
pub fn merge(first: SearchResults, second: SearchResults, limit: usize) -> SearchResults {
    let totalhits = match (first.totalhits, second.totalhits) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    };

    let mut hits: Vec<SearchHit> = first.hits;
    for hit in second.hits {
        if hits.len() >= limit {
            break;
        }
        if !hits.iter().any(|known| known.pageid == hit.pageid) {
            hits.push(hit);
        }
    }
    hits.truncate(limit);

    SearchResults { hits, totalhits }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(pageid: u64, title: &str) -> SearchHit {
        SearchHit {
            pageid,
            title: title.to_owned(),
            ..SearchHit::default()
        }
    }

    fn wiki() -> Wiki {
        Wiki::with_article_path("https://example.wiki/w/", "/wiki/$1").unwrap()
    }

    #[test]
    fn test_merge_dedupes_by_page_id() {
        let first = SearchResults {
            hits: vec![hit(1, "Rust"), hit(2, "Rustacean")],
            totalhits: Some(2),
        };
        let second = SearchResults {
            hits: vec![hit(2, "Rustacean"), hit(3, "Ferris"), hit(4, "Cargo")],
            totalhits: Some(30),
        };
        let merged = merge(first, second, 3);
        let titles: Vec<&str> = merged.hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust", "Rustacean", "Ferris"]);
        assert_eq!(merged.totalhits, Some(32));
    }

    #[test]
    fn test_merge_without_totals() {
        let merged = merge(SearchResults::default(), SearchResults::default(), 5);
        assert!(merged.hits.is_empty());
        assert_eq!(merged.totalhits, None);
    }

    #[test]
    fn test_exact_match_is_marked_in_place() {
        let exact = ExactMatch::Page {
            title: "Rust (programming language)".to_owned(),
            ns: 0,
            redirect_from: Some("Rust-lang".to_owned()),
            section: None,
        };
        let hits = [hit(1, "Rust"), hit(2, "Rust_(Programming_Language)")];
        let lines = entries(&wiki(), &hits, Some(&exact));
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].exact);
        assert!(lines[1].exact);
        assert_eq!(lines[1].redirect.as_deref(), Some("Rust-lang"));
    }

    #[test]
    fn test_missed_exact_match_is_prepended() {
        let exact = ExactMatch::Page {
            title: "Ferris".to_owned(),
            ns: 0,
            redirect_from: None,
            section: Some("Origin".to_owned()),
        };
        let lines = entries(&wiki(), &[hit(1, "Rust")], Some(&exact));
        assert_eq!(lines[0].title, "Ferris");
        assert_eq!(lines[0].link, "https://example.wiki/wiki/Ferris#Origin");
        assert!(lines[0].exact);

        let interwiki = ExactMatch::Interwiki {
            link: "https://other.example/wiki/Ferris".to_owned(),
        };
        let lines = entries(&wiki(), &[], Some(&interwiki));
        assert_eq!(lines[0].link, "https://other.example/wiki/Ferris");
    }
}
