mod config;
mod context;
mod event;
mod handler;
mod helper;
mod logging;
mod plugin;
mod reply;
mod volatile_state;
mod wiki;

use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();
    let client = crate::wiki::MediaWikiClient::new(&cfg.general.user_agent, cfg.request_timeout())?;
    let vstate = crate::volatile_state::VolatileState::new().await;
    let handler = handler::Handler::new(cfg, vstate, client);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
