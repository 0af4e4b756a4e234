use crate::wiki::project::{ProjectPattern, ProjectRegistry};
use crate::wiki::resolver::CallerScope;
use crate::wiki::site::Wiki;
use crate::wiki::tracker::{IssueTrackerConfig, IssueTrackers};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/wikibot/config.toml";

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "WIKIBOT";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub wiki: WikiSettings,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub emoji: Emoji,
    #[serde(default)]
    pub guilds: Vec<GuildSettings>,
    #[serde(default)]
    pub projects: Vec<ProjectPattern>,
    #[serde(default)]
    pub issue_trackers: IssueTrackerConfig,

    // Compiled from the sections above when the configuration is parsed.
    #[serde(skip)]
    pub registry: ProjectRegistry,
    #[serde(skip)]
    pub trackers: IssueTrackers,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct General {
    pub discord_token: String,
    pub bot_owners: Vec<String>,
    pub command_prefix: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            bot_owners: Vec::new(),
            command_prefix: ";".to_owned(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WikiSettings {
    /// Script path URL of the wiki used when a guild has none.
    pub default_wiki: String,
    pub default_article_path: Option<String>,
    /// Language for API messages.
    pub lang: String,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            default_wiki: "https://en.wikipedia.org/w/".to_owned(),
            default_article_path: Some("/wiki/$1".to_owned()),
            lang: "en".to_owned(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Limits {
    pub interwiki_default: u32,
    pub interwiki_elevated: u32,
    pub search_default: usize,
    pub search_elevated: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            interwiki_default: 5,
            interwiki_elevated: 10,
            search_default: 10,
            search_elevated: 25,
        }
    }
}

/// Reactions put on requests. Unicode emoji or `<:name:id>` custom emoji.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Emoji {
    pub error: String,
    pub nowiki: String,
    pub warning: String,
    pub link: String,
    pub shrug: String,
}

impl Default for Emoji {
    fn default() -> Self {
        Self {
            error: "❌".to_owned(),
            nowiki: "⛔".to_owned(),
            warning: "⚠️".to_owned(),
            link: "🔗".to_owned(),
            shrug: "🤷".to_owned(),
        }
    }
}

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GuildSettings {
    pub id: u64,
    /// Script path URL of the guild's wiki.
    pub wiki: Option<String>,
    /// Wikis links may resolve to. Empty allows every wiki.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Use the elevated limits.
    #[serde(default)]
    pub elevated: bool,
    /// Send replies without link buttons and embeds.
    #[serde(default)]
    pub no_embed: bool,
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return Ok(PathBuf::from(path));
        }
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut config = Self::from_toml_str(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;
        config.apply_overrides(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }

    /// Parse and validate a configuration file's contents.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.compile()?;
        Ok(config)
    }

    fn compile(&mut self) -> Result<()> {
        self.registry = ProjectRegistry::new(&self.projects)?;
        self.trackers = IssueTrackers::new(&self.issue_trackers)?;
        self.default_wiki()?;
        for guild in &self.guilds {
            if let Some(wiki) = &guild.wiki {
                self.wiki_from_url(wiki)
                    .map_err(|e| anyhow!("Invalid wiki for guild {}: {}", guild.id, e))?;
            }
        }
        Ok(())
    }

    /// Apply `WIKIBOT_*` overrides. `lookup` reads one variable.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = lookup(&format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
            self.general.discord_token = token;
        }
        if let Some(wiki) = lookup(&format!("{}_DEFAULT_WIKI", ENV_PREFIX)) {
            self.wiki.default_wiki = wiki;
            self.wiki.default_article_path = None;
            self.default_wiki()?;
        }
        Ok(())
    }

    fn wiki_from_url(&self, url: &str) -> Result<Wiki> {
        let wiki = Wiki::new(url)?;
        Ok(self.registry.wiki_for(url).unwrap_or(wiki))
    }

    pub fn default_wiki(&self) -> Result<Wiki> {
        let wiki = match &self.wiki.default_article_path {
            Some(path) => Wiki::with_article_path(&self.wiki.default_wiki, path),
            None => self.wiki_from_url(&self.wiki.default_wiki),
        };
        wiki.map_err(|e| anyhow!("Invalid default wiki: {}", e))
    }

    pub fn guild(&self, guild_id: Option<u64>) -> Option<&GuildSettings> {
        let guild_id = guild_id?;
        self.guilds.iter().find(|guild| guild.id == guild_id)
    }

    /// The wiki commands in a guild resolve against.
    pub fn guild_wiki(&self, guild_id: Option<u64>) -> Result<Wiki> {
        match self.guild(guild_id).and_then(|guild| guild.wiki.as_deref()) {
            Some(url) => self.wiki_from_url(url),
            None => self.default_wiki(),
        }
    }

    pub fn scope(&self, guild_id: Option<u64>, pause: Option<Arc<AtomicBool>>) -> CallerScope {
        let guild = self.guild(guild_id);
        let elevated = guild.is_some_and(|guild| guild.elevated);
        CallerScope {
            allowlist: guild.map(|guild| guild.allowlist.clone()).unwrap_or_default(),
            max_depth: if elevated {
                self.limits.interwiki_elevated
            } else {
                self.limits.interwiki_default
            },
            lang: self.wiki.lang.clone(),
            pause,
        }
    }

    pub fn search_limit(&self, guild_id: Option<u64>) -> usize {
        if self.guild(guild_id).is_some_and(|guild| guild.elevated) {
            self.limits.search_elevated
        } else {
            self.limits.search_default
        }
    }

    pub fn no_embed(&self, guild_id: Option<u64>) -> bool {
        self.guild(guild_id).is_some_and(|guild| guild.no_embed)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [general]
        discord_token = "token"
        bot_owners = ["alice"]

        [wiki]
        default_wiki = "https://minecraft.wiki/"
        default_article_path = "/w/$1"

        [limits]
        interwiki_elevated = 20

        [[guilds]]
        id = 42
        wiki = "https://de.wikipedia.org/w/"
        allowlist = ["https://de.wikipedia.org/w/"]
        elevated = true
        no_embed = true

        [[projects]]
        name = "farm"
        regex = '(farm\.example)'
        article_path = "/wiki/"
        script_path = "/w/"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.general.command_prefix, ";");
        assert_eq!(config.limits.interwiki_default, 5);
        assert_eq!(config.limits.search_elevated, 25);
        assert_eq!(config.emoji.shrug, "🤷");
        let wiki = config.default_wiki().unwrap();
        assert_eq!(wiki.href(), "https://en.wikipedia.org/w/");
        assert_eq!(wiki.article_prefix(), "/wiki/");
    }

    #[test]
    fn test_guild_settings() {
        let config = Config::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.general.bot_owners, vec!["alice"]);

        let scope = config.scope(Some(42), None);
        assert_eq!(scope.max_depth, 20);
        assert_eq!(scope.allowlist, vec!["https://de.wikipedia.org/w/"]);
        assert_eq!(config.search_limit(Some(42)), 25);
        assert!(config.no_embed(Some(42)));
        assert_eq!(config.guild_wiki(Some(42)).unwrap().href(), "https://de.wikipedia.org/w/");

        let scope = config.scope(Some(7), None);
        assert_eq!(scope.max_depth, 5);
        assert!(scope.allowlist.is_empty());
        assert_eq!(config.search_limit(None), 10);
        let wiki = config.guild_wiki(None).unwrap();
        assert_eq!(wiki.href(), "https://minecraft.wiki/");
        assert_eq!(wiki.article_prefix(), "/w/");
    }

    #[test]
    fn test_extra_projects_are_registered() {
        let config = Config::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.registry.find("farm.example").unwrap().name(), "farm");
        assert!(config.registry.find("en.wikipedia.org").is_some());
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(Config::from_toml_str("[wiki]\ndefault_wiki = \"nope\"").is_err());
        assert!(Config::from_toml_str("[[projects]]\nname = \"x\"\nregex = \"(\"\narticle_path = \"/\"\nscript_path = \"/\"").is_err());
        assert!(Config::from_toml_str("[[guilds]]\nid = 1\nwiki = \"ftp://x.example/\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml_str(EXAMPLE).unwrap();
        config
            .apply_overrides(|name| match name {
                "WIKIBOT_DISCORD_TOKEN" => Some("from-env".to_owned()),
                "WIKIBOT_DEFAULT_WIKI" => Some("https://fr.wikipedia.org/wiki/".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.general.discord_token, "from-env");
        let wiki = config.default_wiki().unwrap();
        assert_eq!(wiki.href(), "https://fr.wikipedia.org/w/");
        assert_eq!(wiki.article_prefix(), "/wiki/");

        let mut config = Config::from_toml_str("").unwrap();
        assert!(config
            .apply_overrides(|name| (name == "WIKIBOT_DEFAULT_WIKI").then(|| "bad".to_owned()))
            .is_err());
    }
}
