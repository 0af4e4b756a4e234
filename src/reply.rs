//! Turning resolution results into Discord replies

use crate::config::Emoji;
use crate::wiki::lookup::PageRecord;
use crate::wiki::resolver::{Outcome, Resolution, SpecialTarget};
use crate::wiki::search::SearchReport;
use crate::wiki::tracker::IssueLink;

/// Discord rejects longer messages.
const MAX_MESSAGE_LENGTH: usize = 2000;
const MAX_EXTRACT_LENGTH: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Reaction for the request message.
    pub reaction: Option<String>,
    /// Target of the "Open Wiki Page" button.
    pub button: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyStyle {
    /// Hide the whole reply behind a spoiler.
    pub spoiler: bool,
    /// No link previews and no button.
    pub no_embed: bool,
}

/// Escape Discord markdown in text taken from a wiki.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '|' | '`' | '>' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn link_line(link: &str, style: ReplyStyle) -> String {
    if style.no_embed {
        format!("<{}>", link)
    } else {
        link.to_owned()
    }
}

/// Title, description, extract and category counts of a page.
fn page_details(lines: &mut Vec<String>, page: &PageRecord) {
    if page.disambiguation {
        lines.push("*Disambiguation page*".to_owned());
    }
    if let Some(description) = &page.description {
        lines.push(format!("*{}*", escape_markdown(description)));
    }
    if let Some(extract) = &page.extract {
        let extract = truncate(extract.trim(), MAX_EXTRACT_LENGTH);
        for line in extract.lines().filter(|line| !line.trim().is_empty()) {
            lines.push(format!("> {}", escape_markdown(line)));
        }
    }
    if let Some(info) = &page.categoryinfo {
        lines.push(format!(
            "Category with {} pages, {} subcategories and {} files",
            info.pages, info.subcats, info.files
        ));
    }
}

fn finish(mut lines: Vec<String>, style: ReplyStyle) -> String {
    lines.retain(|line| !line.is_empty());
    let mut content = lines.join("\n");
    if style.spoiler {
        content = format!("||{}||", truncate(&content, MAX_MESSAGE_LENGTH - 4));
    }
    truncate(&content, MAX_MESSAGE_LENGTH)
}

/// The reply for a resolution, `None` if nothing should be said.
pub fn resolution_reply(resolution: &Resolution, emoji: &Emoji, style: ReplyStyle) -> Option<Reply> {
    let mut lines = Vec::new();
    let mut reaction = None;
    let mut button = None;

    match &resolution.outcome {
        Outcome::Paused => return None,
        Outcome::Page {
            wiki,
            page,
            link,
            main_page,
            ..
        } => {
            let heading = if *main_page && !wiki.sitename.is_empty() {
                &wiki.sitename
            } else {
                &page.title
            };
            if !heading.is_empty() {
                lines.push(format!("**{}**", escape_markdown(heading)));
            }
            lines.push(link_line(link, style));
            page_details(&mut lines, page);
            button = Some(link.clone());
        }
        Outcome::Redirect {
            page, from, link, ..
        } => {
            lines.push(format!(
                "**{}** (redirected from *{}*)",
                escape_markdown(&page.title),
                escape_markdown(from)
            ));
            lines.push(link_line(link, style));
            page_details(&mut lines, page);
            button = Some(link.clone());
        }
        Outcome::SpecialPage { target, link, .. } => {
            let heading = match target {
                SpecialTarget::Generic { title } | SpecialTarget::User { title, .. } => {
                    escape_markdown(title)
                }
                SpecialTarget::Contributions { username } => {
                    format!("Contributions of {}", escape_markdown(username))
                }
                SpecialTarget::Diff { diff, oldid } => match oldid {
                    Some(oldid) => format!("Diff {} (from {})", escape_markdown(diff), escape_markdown(oldid)),
                    None => format!("Diff {}", escape_markdown(diff)),
                },
            };
            lines.push(format!("**{}**", heading));
            lines.push(link_line(link, style));
            button = Some(link.clone());
        }
        Outcome::NotFound { wiki, title, link } => {
            let site = if wiki.sitename.is_empty() {
                wiki.name()
            } else {
                wiki.sitename.clone()
            };
            lines.push(format!(
                "There is no page **{}** on {}.",
                escape_markdown(title),
                escape_markdown(&site)
            ));
            lines.push(link_line(link, style));
            reaction = Some(emoji.shrug.clone());
        }
        Outcome::NotPermitted { target, link } => {
            lines.push(format!(
                "Links to `{}` are not allowed here.",
                target.replace('`', "")
            ));
            if let Some(link) = link {
                lines.push(link_line(link, style));
            }
            reaction = Some(emoji.warning.clone());
        }
        Outcome::ServerError { link, .. } => {
            lines.push(link_line(link, style));
            reaction = Some(emoji.error.clone());
        }
        Outcome::NoWiki { wiki } => {
            lines.push(format!("`{}` is not a wiki.", wiki.name().replace('`', "")));
            reaction = Some(emoji.nowiki.clone());
        }
        Outcome::InvalidUser { .. } => reaction = Some(emoji.error.clone()),
        Outcome::InterwikiFallback {
            link,
            limit_reached,
        } => {
            lines.push(link_line(link, style));
            reaction = Some(if *limit_reached {
                emoji.warning.clone()
            } else {
                emoji.link.clone()
            });
            button = Some(link.clone());
        }
        Outcome::IssueTracker(issue) => {
            let label = match issue {
                IssueLink::Phabricator { task, .. } => task.clone(),
                IssueLink::Jira { key, .. } => Some(key.clone()),
            };
            if let Some(label) = label {
                lines.push(format!("**{}**", escape_markdown(&label)));
            }
            lines.push(link_line(issue.url(), style));
            button = Some(issue.url().to_owned());
        }
    }

    if resolution.truncated && reaction.is_none() {
        reaction = Some(emoji.warning.clone());
    }

    Some(Reply {
        content: finish(lines, style),
        reaction,
        button: button.filter(|_| !style.no_embed),
    })
}

/// The reply for a search.
pub fn search_reply(report: &SearchReport, emoji: &Emoji, style: ReplyStyle) -> Reply {
    let mut lines = Vec::new();
    for entry in &report.entries {
        let mut line = format!("[{}](<{}>)", escape_markdown(&entry.title), entry.link);
        if entry.exact {
            line = format!("**{}**", line);
        }
        if let Some(redirect) = &entry.redirect {
            line.push_str(&format!(" (from *{}*)", escape_markdown(redirect)));
        }
        if let Some(section) = &entry.section {
            line.push_str(&format!(" § {}", escape_markdown(section)));
        }
        lines.push(format!("• {}", line));
    }

    let summary = match report.totalhits {
        Some(1) => "**1** result".to_owned(),
        Some(total) => format!("**{}** results", total),
        None if report.entries.is_empty() => "No results".to_owned(),
        None => String::new(),
    };
    lines.push(format!("{} {}", summary, link_line(&report.link, style)).trim().to_owned());

    let reaction = if report.truncated {
        Some(emoji.warning.clone())
    } else if report.entries.is_empty() {
        Some(emoji.shrug.clone())
    } else {
        None
    };

    Reply {
        content: finish(lines, style),
        reaction,
        button: (!style.no_embed).then(|| report.link.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::lookup::FetchError;
    use crate::wiki::search::SearchEntry;
    use crate::wiki::site::Wiki;

    fn wiki() -> Wiki {
        Wiki::with_article_path("https://example.wiki/w/", "/wiki/$1").unwrap()
    }

    fn resolved(outcome: Outcome) -> Resolution {
        Resolution {
            outcome,
            truncated: false,
            depth: 0,
        }
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a*b_c|d"), "a\\*b\\_c\\|d");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_page_reply() {
        let page = PageRecord {
            description: Some("A language".to_owned()),
            extract: Some("Rust is fast.\n\nIt is safe.".to_owned()),
            ..PageRecord::titled("Rust")
        };
        let outcome = Outcome::Page {
            wiki: wiki(),
            page,
            link: "https://example.wiki/wiki/Rust".to_owned(),
            fragment: String::new(),
            main_page: false,
        };
        let reply = resolution_reply(&resolved(outcome), &Emoji::default(), ReplyStyle::default()).unwrap();
        assert_eq!(
            reply.content,
            "**Rust**\nhttps://example.wiki/wiki/Rust\n*A language*\n> Rust is fast.\n> It is safe."
        );
        assert_eq!(reply.button.as_deref(), Some("https://example.wiki/wiki/Rust"));
        assert_eq!(reply.reaction, None);
    }

    #[test]
    fn test_no_embed_and_spoiler() {
        let outcome = Outcome::InterwikiFallback {
            link: "https://other.example/wiki/X".to_owned(),
            limit_reached: true,
        };
        let style = ReplyStyle {
            spoiler: true,
            no_embed: true,
        };
        let emoji = Emoji::default();
        let reply = resolution_reply(&resolved(outcome), &emoji, style).unwrap();
        assert_eq!(reply.content, "||<https://other.example/wiki/X>||");
        assert_eq!(reply.button, None);
        assert_eq!(reply.reaction, Some(emoji.warning));
    }

    #[test]
    fn test_error_reactions() {
        let emoji = Emoji::default();
        let reply = resolution_reply(
            &resolved(Outcome::ServerError {
                wiki: wiki(),
                link: "https://example.wiki/wiki/Special:Search?search=X".to_owned(),
                error: FetchError::Status {
                    status: 500,
                    info: None,
                },
            }),
            &emoji,
            ReplyStyle::default(),
        )
        .unwrap();
        assert_eq!(reply.reaction.as_deref(), Some(emoji.error.as_str()));

        let reply = resolution_reply(
            &resolved(Outcome::NoWiki { wiki: wiki() }),
            &emoji,
            ReplyStyle::default(),
        )
        .unwrap();
        assert_eq!(reply.content, "`example.wiki/w` is not a wiki.");
        assert_eq!(reply.reaction.as_deref(), Some(emoji.nowiki.as_str()));

        let reply = resolution_reply(
            &resolved(Outcome::InvalidUser {
                wiki: wiki(),
                username: "Nobody".to_owned(),
            }),
            &emoji,
            ReplyStyle::default(),
        )
        .unwrap();
        assert!(reply.content.is_empty());
        assert_eq!(reply.reaction.as_deref(), Some(emoji.error.as_str()));

        assert!(resolution_reply(&resolved(Outcome::Paused), &emoji, ReplyStyle::default()).is_none());
    }

    #[test]
    fn test_truncated_title_warns() {
        let emoji = Emoji::default();
        let resolution = Resolution {
            truncated: true,
            ..resolved(Outcome::Page {
                wiki: wiki(),
                page: PageRecord::titled("Long"),
                link: "https://example.wiki/wiki/Long".to_owned(),
                fragment: String::new(),
                main_page: false,
            })
        };
        let reply = resolution_reply(&resolution, &emoji, ReplyStyle::default()).unwrap();
        assert_eq!(reply.reaction, Some(emoji.warning));
    }

    #[test]
    fn test_search_reply() {
        let report = SearchReport {
            wiki: wiki(),
            term: "rust".to_owned(),
            entries: vec![
                SearchEntry {
                    title: "Rust".to_owned(),
                    link: "https://example.wiki/wiki/Rust".to_owned(),
                    exact: true,
                    redirect: None,
                    section: None,
                },
                SearchEntry {
                    title: "Cargo".to_owned(),
                    link: "https://example.wiki/wiki/Cargo".to_owned(),
                    exact: false,
                    redirect: Some("Crates".to_owned()),
                    section: None,
                },
            ],
            totalhits: Some(12),
            link: "https://example.wiki/wiki/Special:Search?search=rust".to_owned(),
            truncated: false,
        };
        let reply = search_reply(&report, &Emoji::default(), ReplyStyle::default());
        assert_eq!(
            reply.content,
            "• **[Rust](<https://example.wiki/wiki/Rust>)**\n\
             • [Cargo](<https://example.wiki/wiki/Cargo>) (from *Crates*)\n\
             **12** results https://example.wiki/wiki/Special:Search?search=rust"
        );
        assert_eq!(reply.reaction, None);
    }

    #[test]
    fn test_long_replies_are_cut() {
        let page = PageRecord {
            description: Some("d".repeat(3000)),
            ..PageRecord::titled("Long")
        };
        let outcome = Outcome::Page {
            wiki: wiki(),
            page,
            link: "https://example.wiki/wiki/Long".to_owned(),
            fragment: String::new(),
            main_page: false,
        };
        let reply = resolution_reply(&resolved(outcome), &Emoji::default(), ReplyStyle::default()).unwrap();
        assert_eq!(reply.content.chars().count(), MAX_MESSAGE_LENGTH);
    }
}
