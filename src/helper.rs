//! Miscellaneous convenience methods

use crate::{context::Context, log_warning, reply::Reply};
use anyhow::Result;
use serenity::all::{
    CreateActionRow, CreateAllowedMentions, CreateButton, CreateMessage, GuildId, ReactionType,
};
use std::collections::HashMap;

#[serenity::async_trait]
pub trait UserIdHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserIdHelper for serenity::all::UserId {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let user = match self.to_user(ctx.cache_http).await {
            Ok(user) => user,
            Err(_) => return format!("<unknown-user-{}", *self),
        };

        user.nick_in_guild(ctx, guild_id).await
    }
}

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global username.
        match nick_in_guild {
            Some(nick_in_guild) => nick_in_guild,
            None => self.name.clone(),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn human_format_content(&self, ctx: &Context) -> Result<String>;
    async fn is_from_owner(&self, ctx: &Context) -> bool;
    async fn send_reply(&self, ctx: &Context, reply: Reply) -> Result<()>;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// Convert discord-formatted message content, which may contain non-user-friendly markup, to a
    /// human-friendly format.
    ///
    /// Serenity provides a message.content_safe() method which uses global discord names rather
    /// than our preferred per-server names.  Thus, we're reimplementing the logic here with the
    /// preferred name.
    async fn human_format_content(&self, ctx: &Context) -> Result<String> {
        let mut content = self.content.clone();

        // Create a mapping from mention strings to their names
        let mut mention_map: HashMap<String, String> = HashMap::new();

        // Map user mentions (e.g. `<@!1234567890>`)
        for user in &self.mentions {
            let user_id = user.id;
            let mention_with_nickname = format!("<@!{}>", user_id);
            let mention_without_nickname = format!("<@{}>", user_id);

            let name = user.id.nick_in_guild(ctx, self.guild_id).await;

            // Map both mention formats to the username
            mention_map.insert(mention_with_nickname, name.clone());
            mention_map.insert(mention_without_nickname, name.clone());
        }

        if let Some(guild) = self.guild(ctx.cache) {
            // Map role mentions (e.g. `<@&1234567890>`)
            for role_id in &self.mention_roles {
                let mention = format!("<@&{}>", role_id);

                if let Some(role) = guild.roles.get(role_id) {
                    let role_name = role.name.clone();
                    mention_map.insert(mention, format!("@{}", role_name));
                } else {
                    mention_map.insert(mention, "@UnknownRole".to_string());
                }
            }

            // Map channel mentions (e.g. `<@#1234567890>`)
            for channel in &self.mention_channels {
                let channel_id = channel.id;
                let mention = format!("<#{}>", channel_id);

                if let Some(channel) = guild.channels.get(&channel_id) {
                    let channel_name = format!("#{}", channel.name);
                    mention_map.insert(mention, channel_name);
                } else {
                    mention_map.insert(mention, "#UnknownChannel".to_string());
                }
            }
        }

        // Replace all mentions with their human-facing names
        for (mention, name) in mention_map {
            content = content.replace(&mention, &name);
        }

        Ok(content)
    }

    async fn is_from_owner(&self, ctx: &Context) -> bool {
        let owners = &ctx.cfg.read().await.general.bot_owners;
        let author_global_name = &self.author.name;

        owners.contains(author_global_name)
    }

    /// React to the request and answer it, with a link button when the reply has one.
    async fn send_reply(&self, ctx: &Context, reply: Reply) -> Result<()> {
        if let Some(reaction) = &reply.reaction {
            match ReactionType::try_from(reaction.as_str()) {
                Ok(reaction) => {
                    if let Err(err) = self.react(ctx.cache_http, reaction).await {
                        log_warning!("Could not react to message {}: {}", self.id, err);
                    }
                }
                Err(err) => log_warning!("Invalid reaction `{}`: {}", reaction, err),
            }
        }

        if reply.content.is_empty() {
            return Ok(());
        }

        let mut message = CreateMessage::new()
            .content(reply.content)
            .reference_message(self)
            .allowed_mentions(CreateAllowedMentions::new());
        if let Some(url) = reply.button {
            message = message.components(vec![CreateActionRow::Buttons(vec![
                CreateButton::new_link(url).label("Open Wiki Page"),
            ])]);
        }

        self.channel_id.send_message(ctx.cache_http, message).await?;
        Ok(())
    }
}
