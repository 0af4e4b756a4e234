use crate::helper::MessageHelper;
use crate::reply::Reply;
use crate::{context::Context, event::*, log_internal, plugin::*};
use anyhow::Result;

pub struct Reload;

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} - reload config (bot owner only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let content = if !msg.is_from_owner(ctx).await {
            "Only bot owners can reload the configuration".to_owned()
        } else {
            match ctx.cfg.write().await.reload().await {
                Ok(()) => "Configuration reloaded successfully".to_owned(),
                // The previous configuration stays in effect.
                Err(err) => {
                    log_internal!("Reloading configuration failed: {}", err);
                    format!("Reloading configuration failed: {}", err)
                }
            }
        };

        let reply = Reply {
            content,
            ..Default::default()
        };
        msg.send_reply(ctx, reply).await?;
        Ok(EventHandled::Yes)
    }
}
