//! Splitting raw user input into title, query parameters and section.

use crate::wiki::encoding::partial_decode;
use crate::wiki::query::QueryParams;
use crate::wiki::site::Wiki;
use regex::Regex;
use std::sync::LazyLock;

/// Longest title sent to the API. Longer titles are cut and a warning is raised.
pub const MAX_TITLE_LENGTH: usize = 250;

static QUERY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?[A-Za-z0-9_]+=").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTitle {
    pub title: String,
    pub query: QueryParams,
    pub fragment: String,
    /// The title was longer than `MAX_TITLE_LENGTH` and has been cut.
    pub truncated: bool,
}

/// Split `raw` into title, query and fragment.
///
/// `query` and `fragment` are what the caller already knows, e.g. from a followed link.
/// A `#` in `raw` replaces the fragment; a `?key=` in `raw` adds to the query.
pub fn normalize(raw: &str, wiki: &Wiki, mut query: QueryParams, mut fragment: String) -> NormalizedTitle {
    let mut title = raw;
    if let Some((head, section)) = raw.split_once('#') {
        fragment = partial_decode(section.trim());
        title = head;
    }

    if let Some(found) = QUERY_START.find(title) {
        query.extend(&QueryParams::parse(&title[found.start() + 1..]));
        title = &title[..found.start()];
    }

    let mut title = title.to_owned();
    if title.is_empty() {
        title = title_from_article_url(wiki, &mut query);
    }
    if title.is_empty() {
        if let Some(value) = query.remove("title") {
            title = value;
        }
    }

    let mut title = partial_decode(&title);
    let truncated = title.chars().count() > MAX_TITLE_LENGTH;
    if truncated {
        title = title.chars().take(MAX_TITLE_LENGTH).collect();
    }

    NormalizedTitle {
        title,
        query,
        fragment,
        truncated,
    }
}

/// Pull the title out of the query parameter the wiki's article URL puts it in.
fn title_from_article_url(wiki: &Wiki, query: &mut QueryParams) -> String {
    let Some(article_url) = wiki.article_url() else {
        return String::new();
    };

    let mut title = String::new();
    for (name, template) in QueryParams::from_url(&article_url).iter() {
        if !template.contains("$1") {
            continue;
        }
        let Some(value) = query.remove(name) else {
            continue;
        };
        title = value;
        if template != "$1" {
            let pattern = format!("^{}$", regex::escape(template).replace(r"\$1", "(.*?)"));
            if let Some(inner) = Regex::new(&pattern)
                .ok()
                .and_then(|regex| regex.captures(&title))
                .and_then(|captures| captures.get(1))
            {
                title = inner.as_str().to_owned();
            }
        }
    }
    title
}
