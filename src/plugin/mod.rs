use crate::context::Context;
use crate::event::{Event, EventHandled};
use anyhow::Result;

mod debug;
mod help;
mod ignore_bots;
mod interwiki;
mod pause;
mod reload;
mod wiki;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used as the command name and for debug
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(help::Help),
        Box::new(reload::Reload),
        Box::new(pause::Pause),
        // Wiki links
        Box::new(wiki::WikiLink),
        Box::new(interwiki::Interwiki),
    ]
}
