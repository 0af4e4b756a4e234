//! Following a user-supplied title or link across wikis until it lands on a page.
//!
//! Resolution is a loop over a request state. Each pass issues at most one lookup
//! and either ends with an `Outcome` or produces the request for the next wiki.
//! Every cross-wiki hop costs one unit of depth, whether it came from a pasted link
//! or from an interwiki answer of the API. Hops that stay on the same wiki are free
//! but capped by `MAX_SAME_WIKI_HOPS`.

use crate::wiki::encoding::{partial_decode, strict_decode, to_section};
use crate::wiki::lookup::{
    FetchError, InterwikiTarget, LookupOptions, PageFetcher, PageLookup, PageRecord, RedirectInfo,
};
use crate::wiki::normalize::normalize;
use crate::wiki::project::ProjectRegistry;
use crate::wiki::query::QueryParams;
use crate::wiki::site::{Wiki, NS_SPECIAL};
use crate::wiki::tracker::{IssueLink, IssueTrackers};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use url::Url;

/// Same-wiki canonicalisations allowed in one resolution.
pub const MAX_SAME_WIKI_HOPS: u32 = 5;

/// Namespaces whose pages are shown as user profiles.
const USER_NAMESPACES: &[i64] = &[2, 200, 202, 1200];

/// Query keys that may accompany `diff` for a link to be shown as a diff.
const DIFF_KEYS: &[&str] = &["diff", "oldid", "curid", "title"];

static IP_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\d{1,3}\.){3}\d{1,3}/\d{2}|(?:[\dA-Fa-f]{1,4}:){1,7}[\dA-Fa-f]{0,4}/\d{2,3})$")
        .expect("static regex")
});

/// What the person asking may do.
#[derive(Debug, Clone, Default)]
pub struct CallerScope {
    /// Wikis (script path URLs) resolution may end up on. Empty allows all.
    pub allowlist: Vec<String>,
    /// Cross-wiki hops taken on behalf of the API's interwiki answers.
    pub max_depth: u32,
    /// Language for messages in API responses.
    pub lang: String,
    pub pause: Option<Arc<AtomicBool>>,
}

impl CallerScope {
    fn is_paused(&self) -> bool {
        self.pause
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn permits(&self, wiki: &Wiki) -> bool {
        let target = wiki.href().trim_end_matches('/');
        self.allowlist.is_empty()
            || self
                .allowlist
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == target)
    }
}

/// One step of a resolution chain.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub title: String,
    pub wiki: Wiki,
    pub query: QueryParams,
    pub fragment: String,
    /// The link that led here, used as the answer if this wiki cannot be reached.
    pub interwiki: Option<String>,
    pub depth: u32,
    pub same_wiki_hops: u32,
}

impl ResolutionRequest {
    pub fn new(title: &str, wiki: Wiki) -> Self {
        Self {
            title: title.to_owned(),
            wiki,
            query: QueryParams::new(),
            fragment: String::new(),
            interwiki: None,
            depth: 0,
            same_wiki_hops: 0,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpecialTarget {
    /// Any page in the special namespace, or a redirect out of it.
    Generic { title: String },
    User { title: String, username: String },
    Contributions { username: String },
    Diff { diff: String, oldid: Option<String> },
}

/// Terminal result of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Page {
        wiki: Wiki,
        page: PageRecord,
        link: String,
        fragment: String,
        main_page: bool,
    },
    Redirect {
        wiki: Wiki,
        page: PageRecord,
        from: String,
        link: String,
        fragment: String,
    },
    SpecialPage {
        wiki: Wiki,
        target: SpecialTarget,
        page: Option<PageRecord>,
        link: String,
    },
    NotFound {
        wiki: Wiki,
        title: String,
        link: String,
    },
    /// The target wiki is not on the caller's allowlist. `link` goes through the
    /// current wiki's interwiki page when there is one.
    NotPermitted {
        target: String,
        link: Option<String>,
    },
    ServerError {
        wiki: Wiki,
        link: String,
        error: FetchError,
    },
    NoWiki {
        wiki: Wiki,
    },
    /// A contributions page for a name the wiki does not take as a user name.
    InvalidUser {
        wiki: Wiki,
        username: String,
    },
    /// An interwiki link that was not followed. `limit_reached` marks the depth limit
    /// as the reason.
    InterwikiFallback {
        link: String,
        limit_reached: bool,
    },
    IssueTracker(IssueLink),
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Some title on the way was cut to the maximum title length.
    pub truncated: bool,
    pub depth: u32,
}

enum Step {
    Next(ResolutionRequest),
    Done(Outcome),
}

/// Whether `input` should be tried as a link before being taken as a title.
fn looks_like_url(input: &str) -> bool {
    (input.starts_with("http://") || input.starts_with("https://")) && input.split('/').count() > 3
}

/// Whether the request is a plain diff view.
fn diff_target(query: &QueryParams, fragment: &str) -> Option<SpecialTarget> {
    let diff = query.last("diff")?;
    if !fragment.is_empty() || !query.keys().all(|key| DIFF_KEYS.contains(&key)) {
        return None;
    }
    Some(SpecialTarget::Diff {
        diff: diff.to_owned(),
        oldid: query.last("oldid").map(str::to_owned),
    })
}

pub struct Resolver<'a> {
    fetcher: &'a dyn PageFetcher,
    projects: &'a ProjectRegistry,
    trackers: &'a IssueTrackers,
    scope: &'a CallerScope,
}

impl<'a> Resolver<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        projects: &'a ProjectRegistry,
        trackers: &'a IssueTrackers,
        scope: &'a CallerScope,
    ) -> Self {
        Self {
            fetcher,
            projects,
            trackers,
            scope,
        }
    }

    /// Resolve until something terminal happens. Never fails.
    pub async fn resolve(&self, mut request: ResolutionRequest) -> Resolution {
        let mut truncated = false;
        let mut first = true;
        loop {
            if !first && self.scope.is_paused() {
                return Resolution {
                    outcome: Outcome::Paused,
                    truncated,
                    depth: request.depth,
                };
            }
            first = false;

            let depth = request.depth;
            match self.step(request, &mut truncated).await {
                Step::Next(next) => request = next,
                Step::Done(outcome) => {
                    return Resolution {
                        outcome,
                        truncated,
                        depth,
                    }
                }
            }
        }
    }

    async fn step(&self, request: ResolutionRequest, truncated: &mut bool) -> Step {
        if request.depth == 0 && request.interwiki.is_none() && looks_like_url(&request.title) {
            if let Some(step) = self.follow_pasted_link(&request) {
                return step;
            }
        }

        let ResolutionRequest {
            title,
            mut wiki,
            query,
            fragment,
            interwiki,
            depth,
            same_wiki_hops,
        } = request;
        let normalized = normalize(&title, &wiki, query, fragment);
        *truncated |= normalized.truncated;
        let state = ResolutionRequest {
            title: normalized.title,
            wiki: wiki.clone(),
            query: normalized.query,
            fragment: normalized.fragment,
            interwiki,
            depth,
            same_wiki_hops,
        };

        if let Some(target) = diff_target(&state.query, &state.fragment) {
            return Step::Done(Outcome::SpecialPage {
                link: format!("{}?{}", wiki.index_url(), state.query),
                wiki,
                target,
                page: None,
            });
        }

        let options = self.lookup_options(&state.query);
        match self.fetcher.lookup(&wiki, &state.title, &options).await {
            PageLookup::Failed(error) => Step::Done(self.failure(error, state)),
            PageLookup::Found {
                site,
                page,
                redirect,
            } => {
                wiki.update(&site);
                Step::Done(self.classify(wiki, page, redirect, &state, &options).await)
            }
            PageLookup::MainPage { site } => {
                wiki.update(&site);
                Step::Done(self.main_page(wiki, &state, &options).await)
            }
            PageLookup::Interwiki { site, target, .. } => {
                wiki.update(&site);
                let state = ResolutionRequest { wiki, ..state };
                self.follow_interwiki(&state, &target)
            }
        }
    }

    fn lookup_options(&self, query: &QueryParams) -> LookupOptions {
        let no_redirect = query.last("redirect") == Some("no")
            || query.last("action").is_some_and(|action| action != "view");
        let uselang = query
            .last("variant")
            .or_else(|| query.last("uselang"))
            .unwrap_or(self.scope.lang.as_str());
        LookupOptions {
            uselang: uselang.to_owned(),
            follow_redirects: !no_redirect,
        }
    }

    /// Apply the request's query and fragment to a link relative to the current wiki.
    fn prepare_link(&self, raw: &str, request: &ResolutionRequest) -> Option<(Url, String)> {
        let sanitized = raw
            .replace('\\', "%5C")
            .replace("@here", "%40here")
            .replace("@everyone", "%40everyone");
        let mut url = request.wiki.base().join(&sanitized).ok()?;
        request.query.append_to(&mut url);

        let fragment = if request.fragment.is_empty() {
            url.fragment().map(partial_decode).unwrap_or_default()
        } else {
            url.set_fragment(Some(&to_section(
                &request.fragment,
                &request.wiki.space_replacement,
            )));
            request.fragment.clone()
        };
        Some((url, fragment))
    }

    /// Try to turn `url` into the next request. `None` means it is not a wiki link.
    fn hop(
        &self,
        url: &Url,
        fragment: &str,
        request: &ResolutionRequest,
        interwiki_title: Option<&str>,
    ) -> Option<Step> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        if let Some(project) = self.projects.find_for_url(url) {
            let found = project.match_link(url, &request.wiki.space_replacement)?;
            if !self.scope.permits(&found.wiki) {
                return Some(Step::Done(Outcome::NotPermitted {
                    target: found.wiki.href().to_owned(),
                    link: interwiki_title.map(|title| self.go_to_interwiki(request, title)),
                }));
            }
            return Some(Step::Next(ResolutionRequest {
                title: found.title,
                wiki: found.wiki,
                query: QueryParams::from_url(url),
                fragment: fragment.to_owned(),
                interwiki: Some(url.to_string()),
                depth: request.depth + 1,
                same_wiki_hops: request.same_wiki_hops,
            }));
        }

        let prefix = request.wiki.article_prefix();
        let host = url.host_str()?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_owned(),
        };
        if authority != request.wiki.authority() || !url.path().starts_with(&prefix) {
            return None;
        }
        if request.same_wiki_hops >= MAX_SAME_WIKI_HOPS {
            return Some(Step::Done(Outcome::InterwikiFallback {
                link: url.to_string(),
                limit_reached: true,
            }));
        }
        let space = match request.wiki.space_replacement.as_str() {
            "" => "_",
            space => space,
        };
        let title = strict_decode(&url.path()[prefix.len()..])?.replace(space, " ");
        Some(Step::Next(ResolutionRequest {
            title,
            wiki: request.wiki.clone(),
            query: QueryParams::from_url(url),
            fragment: fragment.to_owned(),
            interwiki: Some(url.to_string()),
            depth: request.depth,
            same_wiki_hops: request.same_wiki_hops + 1,
        }))
    }

    /// A pasted link. Falls through to title treatment when it is no known wiki link.
    fn follow_pasted_link(&self, request: &ResolutionRequest) -> Option<Step> {
        let (url, fragment) = self.prepare_link(&request.title, request)?;
        if let Some(issue) = self.trackers.classify(&url) {
            return Some(Step::Done(Outcome::IssueTracker(issue)));
        }
        self.hop(&url, &fragment, request, None)
    }

    /// The API answered with a link to another wiki.
    fn follow_interwiki(&self, request: &ResolutionRequest, target: &InterwikiTarget) -> Step {
        let Some((url, fragment)) = self.prepare_link(&target.url, request) else {
            return Step::Done(self.unfollowed(request, target, target.url.clone(), false));
        };
        if let Some(issue) = self.trackers.classify(&url) {
            return Step::Done(Outcome::IssueTracker(issue));
        }
        if request.depth >= self.scope.max_depth {
            return Step::Done(self.unfollowed(request, target, url.to_string(), true));
        }
        match self.hop(&url, &fragment, request, Some(&target.title)) {
            Some(step) => step,
            None => Step::Done(self.unfollowed(request, target, url.to_string(), false)),
        }
    }

    fn unfollowed(
        &self,
        request: &ResolutionRequest,
        target: &InterwikiTarget,
        link: String,
        limit_reached: bool,
    ) -> Outcome {
        if self.scope.allowlist.is_empty() {
            Outcome::InterwikiFallback {
                link,
                limit_reached,
            }
        } else {
            Outcome::NotPermitted {
                target: link,
                link: Some(self.go_to_interwiki(request, &target.title)),
            }
        }
    }

    fn go_to_interwiki(&self, request: &ResolutionRequest, title: &str) -> String {
        request.wiki.to_link(
            &format!("{}:GoToInterwiki/{}", request.wiki.special_namespace(), title),
            &request.query,
            &request.fragment,
        )
    }

    fn failure(&self, error: FetchError, request: ResolutionRequest) -> Outcome {
        if let Some(link) = request.interwiki {
            return Outcome::InterwikiFallback {
                link,
                limit_reached: false,
            };
        }
        if error == FetchError::NoWiki {
            return Outcome::NoWiki { wiki: request.wiki };
        }
        let link = if request.title.is_empty()
            || !request.query.is_empty()
            || !request.fragment.is_empty()
        {
            request
                .wiki
                .to_link(&request.title, &request.query, &request.fragment)
        } else {
            let search: QueryParams = [("search", request.title.as_str())].into_iter().collect();
            request.wiki.to_link("Special:Search", &search, "")
        };
        Outcome::ServerError {
            wiki: request.wiki,
            link,
            error,
        }
    }

    async fn classify(
        &self,
        wiki: Wiki,
        page: PageRecord,
        redirect: Option<RedirectInfo>,
        request: &ResolutionRequest,
        options: &LookupOptions,
    ) -> Outcome {
        if let Some(redirect) = &redirect {
            if self.is_special(&wiki, &redirect.from) {
                return Outcome::SpecialPage {
                    link: wiki.to_link(&redirect.from, &request.query, &request.fragment),
                    target: SpecialTarget::Generic {
                        title: redirect.from.clone(),
                    },
                    page: Some(page),
                    wiki,
                };
            }
        }

        if page.invalid || (page.missing && !page.known) {
            let title = if page.title.is_empty() {
                request.title.clone()
            } else {
                page.title.clone()
            };
            return Outcome::NotFound {
                link: wiki.to_link(&title, &request.query, &request.fragment),
                title,
                wiki,
            };
        }

        if USER_NAMESPACES.contains(&page.ns) {
            let name = page.title.split_once(':').map(|(_, name)| name).unwrap_or_default();
            if !name.contains('/') || IP_RANGE.is_match(name) {
                return Outcome::SpecialPage {
                    link: wiki.to_link(&page.title, &request.query, &request.fragment),
                    target: SpecialTarget::User {
                        title: page.title.clone(),
                        username: name.to_owned(),
                    },
                    page: Some(page),
                    wiki,
                };
            }
        }

        if page.ns == NS_SPECIAL {
            let contributions = format!(
                "{}:{}/",
                wiki.special_namespace(),
                wiki.special_alias("Contributions")
            );
            if let Some(username) = page
                .title
                .strip_prefix(&contributions)
                .filter(|username| !username.is_empty())
            {
                let username = username.to_owned();
                return self
                    .contributions(wiki, page, &contributions, username, request, options)
                    .await;
            }
            return Outcome::SpecialPage {
                link: wiki.to_link(&page.title, &request.query, &request.fragment),
                target: SpecialTarget::Generic {
                    title: page.title.clone(),
                },
                page: Some(page),
                wiki,
            };
        }

        match redirect {
            Some(redirect) => {
                let fragment = if request.fragment.is_empty() {
                    redirect.tofragment.unwrap_or_default()
                } else {
                    request.fragment.clone()
                };
                Outcome::Redirect {
                    link: wiki.to_link(&page.title, &request.query, &fragment),
                    from: redirect.from,
                    fragment,
                    page,
                    wiki,
                }
            }
            None => Outcome::Page {
                link: wiki.to_link(&page.title, &request.query, &request.fragment),
                fragment: request.fragment.clone(),
                main_page: false,
                page,
                wiki,
            },
        }
    }

    /// Canonicalise the user name of a contributions page through its user page.
    async fn contributions(
        &self,
        wiki: Wiki,
        mut page: PageRecord,
        prefix: &str,
        username: String,
        request: &ResolutionRequest,
        options: &LookupOptions,
    ) -> Outcome {
        let user_page = format!("User:{}", username);
        match self.fetcher.lookup(&wiki, &user_page, options).await {
            PageLookup::Found { page: user, .. } if user.ns == 2 => {
                let username = user
                    .title
                    .split_once(':')
                    .map(|(_, name)| name.to_owned())
                    .unwrap_or(username);
                page.title = format!("{}{}", prefix, username);
                Outcome::SpecialPage {
                    link: wiki.to_link(&page.title, &request.query, &request.fragment),
                    target: SpecialTarget::Contributions { username },
                    page: Some(page),
                    wiki,
                }
            }
            PageLookup::Failed(error) => Outcome::ServerError {
                link: wiki.to_link(&page.title, &request.query, &request.fragment),
                wiki,
                error,
            },
            _ => Outcome::InvalidUser { wiki, username },
        }
    }

    fn is_special(&self, wiki: &Wiki, title: &str) -> bool {
        let Some((namespace, _)) = title.split_once(':') else {
            return false;
        };
        namespace == wiki.special_namespace()
            || namespace == "Special"
            || wiki
                .namespace_aliases
                .iter()
                .any(|(id, alias)| *id == NS_SPECIAL && alias == namespace)
    }

    /// No title was given. Look up the main page itself to describe it.
    async fn main_page(&self, wiki: Wiki, request: &ResolutionRequest, options: &LookupOptions) -> Outcome {
        let mainpage = wiki.mainpage.clone();
        let page = if mainpage.is_empty() {
            PageRecord::default()
        } else {
            match self.fetcher.lookup(&wiki, &mainpage, options).await {
                PageLookup::Found { page, .. } => page,
                _ => PageRecord::titled(&mainpage),
            }
        };
        Outcome::Page {
            link: wiki.to_link(&mainpage, &request.query, &request.fragment),
            fragment: request.fragment.clone(),
            main_page: true,
            page,
            wiki,
        }
    }
}
