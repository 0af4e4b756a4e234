use crate::helper::MessageHelper;
use crate::logging::AsyncPrintColor;
use crate::reply::Reply;
use crate::{context::Context, event::*, log_internal, plugin::*};
use anyhow::Result;

/// Stop or resume link resolution in the current guild (bot owner only)
pub struct Pause;

#[serenity::async_trait]
impl Plugin for Pause {
    fn name(&self) -> &'static str {
        "pause"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} - pause or resume wiki links here (bot owner only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let content = if msg.is_from_owner(ctx).await {
            let paused = ctx.vstate.write().await.paused.toggle(msg.guild_id);
            log_internal!(
                "Wiki links {} in {}",
                if paused { "paused" } else { "resumed" },
                msg.guild_id.color(ctx.http).await
            );
            if paused {
                "Wiki links paused"
            } else {
                "Wiki links resumed"
            }
        } else {
            "Only bot owners can pause the bot"
        };

        let reply = Reply {
            content: content.to_owned(),
            ..Default::default()
        };
        msg.send_reply(ctx, reply).await?;
        Ok(EventHandled::Yes)
    }
}
