use serenity::all::GuildId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State which is lost across sessions
pub struct VolatileState {
    pub paused: PausedGuilds,
}

/// Per-guild pause flags. A resolution holds its guild's flag and checks it between hops,
/// so pausing takes effect on chains already in flight.
pub struct PausedGuilds(HashMap<Option<GuildId>, Arc<AtomicBool>>);

impl VolatileState {
    pub async fn new() -> Self {
        Self {
            paused: PausedGuilds::new(),
        }
    }
}

impl PausedGuilds {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// The flag for `guild_id`, created unpaused on first use.
    pub fn flag(&mut self, guild_id: Option<GuildId>) -> Arc<AtomicBool> {
        self.0.entry(guild_id).or_default().clone()
    }

    pub fn is_paused(&self, guild_id: Option<GuildId>) -> bool {
        self.0
            .get(&guild_id)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&mut self, guild_id: Option<GuildId>) -> bool {
        let flag = self.flag(guild_id);
        !flag.fetch_xor(true, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_seen_through_held_flag() {
        let mut paused = PausedGuilds::new();
        let guild = Some(GuildId::new(42));
        let held = paused.flag(guild);
        assert!(!paused.is_paused(guild));

        assert!(paused.toggle(guild));
        assert!(held.load(Ordering::Relaxed));
        assert!(paused.is_paused(guild));
        assert!(!paused.is_paused(Some(GuildId::new(7))));

        assert!(!paused.toggle(guild));
        assert!(!held.load(Ordering::Relaxed));
    }
}
