use super::wiki::{unwrap_args, CommandSetup};
use crate::helper::MessageHelper;
use crate::logging::PrintColor;
use crate::reply::Reply;
use crate::wiki::ResolutionRequest;
use crate::{context::Context, event::*, log_internal, plugin::*};
use anyhow::Result;

/// Link a page on a wiki named by host or project, e.g. `;interwiki de.wikipedia.org Haus`
pub struct Interwiki;

#[serenity::async_trait]
impl Plugin for Interwiki {
    fn name(&self) -> &'static str {
        "interwiki"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} <wiki> <title> - link a page on another wiki",
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
        let (target, title) = args
            .split_once(char::is_whitespace)
            .map(|(target, title)| (target, title.trim()))
            .unwrap_or((args, ""));

        let Some(wiki) = setup.projects.wiki_for(target) else {
            log_internal!("Unknown wiki \"{}\"", target);
            let reply = Reply {
                reaction: Some(setup.emoji.nowiki.clone()),
                ..Default::default()
            };
            msg.send_reply(ctx, reply).await?;
            return Ok(EventHandled::Yes);
        };

        if !setup.scope.permits(&wiki) {
            log_internal!("{} is not allowed here", wiki.color());
            let reply = Reply {
                reaction: Some(setup.emoji.error.clone()),
                ..Default::default()
            };
            msg.send_reply(ctx, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let request = ResolutionRequest::new(title, wiki);
        setup.resolve_and_reply(ctx, msg, request, style).await?;
        Ok(EventHandled::Yes)
    }
}
