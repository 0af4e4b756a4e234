use crate::config::Emoji;
use crate::helper::MessageHelper;
use crate::logging::PrintColor;
use crate::reply::{resolution_reply, search_reply, Reply, ReplyStyle};
use crate::wiki::normalize::normalize;
use crate::wiki::{
    search, CallerScope, IssueTrackers, ProjectRegistry, QueryParams, ResolutionRequest, Resolver,
    Wiki,
};
use crate::{context::Context, event::*, log_internal, plugin::*};
use anyhow::Result;
use serenity::all::Message;

pub struct WikiLink;

/// Everything a wiki command needs from the configuration, copied out so no lock is
/// held while waiting on the network.
pub struct CommandSetup {
    pub wiki: Wiki,
    pub scope: CallerScope,
    pub projects: ProjectRegistry,
    pub trackers: IssueTrackers,
    pub emoji: Emoji,
    pub search_limit: usize,
    pub no_embed: bool,
}

impl CommandSetup {
    pub async fn new(ctx: &Context<'_>, msg: &Message) -> Result<Self> {
        let guild_id = msg.guild_id.map(|id| id.get());
        let pause = ctx.vstate.write().await.paused.flag(msg.guild_id);
        let cfg = ctx.cfg.read().await;
        Ok(Self {
            wiki: cfg.guild_wiki(guild_id)?,
            scope: cfg.scope(guild_id, Some(pause)),
            projects: cfg.registry.clone(),
            trackers: cfg.trackers.clone(),
            emoji: cfg.emoji.clone(),
            search_limit: cfg.search_limit(guild_id),
            no_embed: cfg.no_embed(guild_id),
        })
    }

    /// Resolve `request` and answer `msg` with the outcome.
    pub async fn resolve_and_reply(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
        request: ResolutionRequest,
        style: ReplyStyle,
    ) -> Result<()> {
        log_internal!(
            "Resolving \"{}\" on {}",
            request.title,
            request.wiki.color()
        );
        let typing = msg.channel_id.start_typing(ctx.http);
        let resolver = Resolver::new(ctx.fetcher, &self.projects, &self.trackers, &self.scope);
        let resolution = resolver.resolve(request).await;
        typing.stop();
        log_internal!("Resolved after {} cross-wiki hop(s)", resolution.depth);
        match resolution_reply(&resolution, &self.emoji, style) {
            Some(reply) => msg.send_reply(ctx, reply).await,
            None => Ok(()),
        }
    }
}

/// Strip `||spoiler||` and `<no embed>` wrappers off command arguments.
pub fn unwrap_args(mut args: &str, no_embed: bool) -> (&str, ReplyStyle) {
    let mut style = ReplyStyle {
        spoiler: false,
        no_embed,
    };
    loop {
        args = args.trim();
        if let Some(inner) = args
            .strip_prefix("||")
            .and_then(|rest| rest.strip_suffix("||"))
        {
            style.spoiler = true;
            args = inner;
        } else if let Some(inner) = args
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        {
            style.no_embed = true;
            args = inner;
        } else {
            return (args, style);
        }
    }
}

/// Link to the wiki's own search page, used when no results can be shown.
pub fn search_page_reply(wiki: &Wiki, term: &str, style: ReplyStyle) -> Reply {
    let mut query = QueryParams::new();
    if !term.is_empty() {
        query.append("search", term);
    }
    let link = wiki.to_link("Special:Search", &query, "");
    let content = if style.no_embed {
        format!("<{}>", link)
    } else {
        link.clone()
    };
    Reply {
        content: if style.spoiler {
            format!("||{}||", content)
        } else {
            content
        },
        reaction: None,
        button: (!style.no_embed).then_some(link),
    }
}

#[serenity::async_trait]
impl Plugin for WikiLink {
    fn name(&self) -> &'static str {
        "wiki"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}{1} <title|link> - link a wiki page\n\
             {0}{1} search <term> - search the wiki\n\
             {0}{1} page <title> - link a page without looking it up\n\
             {0}{1} random - link a random page",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        if ctx.vstate.read().await.paused.is_paused(msg.guild_id) {
            return Ok(EventHandled::Yes);
        }

        let setup = CommandSetup::new(ctx, msg).await?;
        let (args, style) = unwrap_args(args, setup.no_embed);
        let (subcommand, rest) = args
            .split_once(char::is_whitespace)
            .map(|(subcommand, rest)| (subcommand, rest.trim()))
            .unwrap_or((args, ""));

        match subcommand.to_lowercase().as_str() {
            "search" if !rest.is_empty() => {
                log_internal!("Searching \"{}\" on {}", rest, setup.wiki.color());
                let typing = msg.channel_id.start_typing(ctx.http);
                let report = search::search(
                    ctx.fetcher,
                    setup.wiki.clone(),
                    rest,
                    setup.search_limit,
                    &setup.scope.lang,
                )
                .await;
                typing.stop();
                match report {
                    Ok(report) => {
                        msg.send_reply(ctx, search_reply(&report, &setup.emoji, style))
                            .await?
                    }
                    Err(err) => {
                        log_internal!("Search on {} failed: {}", setup.wiki.color(), err);
                        let mut reply = search_page_reply(&setup.wiki, rest, style);
                        reply.reaction = Some(setup.emoji.error.clone());
                        msg.send_reply(ctx, reply).await?
                    }
                }
            }
            "search" => {
                msg.send_reply(ctx, search_page_reply(&setup.wiki, "", style))
                    .await?
            }
            "page" if !rest.is_empty() => {
                let normalized = normalize(rest, &setup.wiki, QueryParams::new(), String::new());
                let link = setup
                    .wiki
                    .to_link(&normalized.title, &normalized.query, &normalized.fragment);
                let reply = Reply {
                    content: if style.no_embed { format!("<{}>", link) } else { link.clone() },
                    reaction: normalized.truncated.then(|| setup.emoji.warning.clone()),
                    button: (!style.no_embed).then_some(link),
                };
                msg.send_reply(ctx, reply).await?
            }
            "random" if rest.is_empty() => {
                match ctx.fetcher.random_title(&setup.wiki, &[0]).await {
                    Ok(title) => {
                        let request = ResolutionRequest::new(&title, setup.wiki.clone());
                        setup.resolve_and_reply(ctx, msg, request, style).await?
                    }
                    Err(err) => {
                        log_internal!("Random page on {} failed: {}", setup.wiki.color(), err);
                        let reply = Reply {
                            reaction: Some(setup.emoji.error.clone()),
                            ..Default::default()
                        };
                        msg.send_reply(ctx, reply).await?
                    }
                }
            }
            _ => {
                let request = ResolutionRequest::new(args, setup.wiki.clone());
                setup.resolve_and_reply(ctx, msg, request, style).await?
            }
        }

        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_args() {
        assert_eq!(unwrap_args(" Main Page ", false), ("Main Page", ReplyStyle::default()));
        assert_eq!(
            unwrap_args("||<Secret>||", false),
            (
                "Secret",
                ReplyStyle {
                    spoiler: true,
                    no_embed: true
                }
            )
        );
        let (args, style) = unwrap_args("<https://example.org/wiki/X>", false);
        assert_eq!(args, "https://example.org/wiki/X");
        assert!(style.no_embed && !style.spoiler);
        let (_, style) = unwrap_args("Title", true);
        assert!(style.no_embed);
    }

    #[test]
    fn test_search_page_reply() {
        let wiki = Wiki::with_article_path("https://example.wiki/w/", "/wiki/$1").unwrap();
        let reply = search_page_reply(&wiki, "", ReplyStyle::default());
        assert_eq!(reply.content, "https://example.wiki/wiki/Special:Search");
        assert_eq!(reply.button.as_deref(), Some("https://example.wiki/wiki/Special:Search"));

        let style = ReplyStyle {
            spoiler: true,
            no_embed: true,
        };
        let reply = search_page_reply(&wiki, "red stone", style);
        assert_eq!(
            reply.content,
            "||<https://example.wiki/wiki/Special:Search?search=red+stone>||"
        );
        assert_eq!(reply.button, None);
        assert_eq!(reply.reaction, None);
    }
}
