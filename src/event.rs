//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::{context::Context, log_internal};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_internal!("Error in plugin {}: {}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a special bot command.
    //
    // These are prefixed with the configured prefix, e. g. `;cmd foo bar baz`.  Returns the message
    // and everything after the command name.
    pub async fn is_bot_cmd<'e>(&'e self, ctx: &Context<'_>, cmd: &str) -> Option<(&'e Message, &'e str)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let args = parse_command(&msg.content, &prefix, cmd)?;
        Some((msg, args))
    }
}

/// Arguments of `content` if it is the command `cmd`. Command names are case-insensitive.
fn parse_command<'c>(content: &'c str, prefix: &str, cmd: &str) -> Option<&'c str> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let name_end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    let (name, args) = rest.split_at(name_end);
    name.eq_ignore_ascii_case(cmd).then(|| args.trim())
}

pub enum EventHandled {
    Yes,
    No,
}
