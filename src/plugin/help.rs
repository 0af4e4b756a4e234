use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Help;

/// Help message listing every command's usage line.
fn help_text(usages: &[String]) -> String {
    let mut reply = String::new();
    reply.push_str("I link wiki pages. Paste a title or link after a command:\n");
    reply.push_str("```\n");
    for usage in usages {
        reply.push_str(usage);
        reply.push('\n');
    }
    reply.push_str("```");
    reply
}

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} - show this help message",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let mut usages = Vec::new();
        for plugin in crate::plugin::plugins() {
            if let Some(usage) = plugin.usage(ctx).await {
                usages.push(usage);
            }
        }

        msg.reply(ctx.cache_http, help_text(&usages)).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text() {
        let text = help_text(&[
            ";help - show this help message".to_owned(),
            ";wiki <title|link> - link a wiki page".to_owned(),
        ]);
        assert!(text.starts_with("I link wiki pages."));
        assert!(text.contains("```\n;help - show this help message\n;wiki <title|link> - link a wiki page\n```"));
    }
}
