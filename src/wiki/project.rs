//! Registry of known wiki-hosting projects and matching of URLs against them.

use crate::wiki::encoding::strict_decode;
use crate::wiki::site::Wiki;
use anyhow::{anyhow, Result};
use regex::Regex;
use url::Url;

/// A family of wiki installations sharing one URL layout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProjectPattern {
    pub name: String,
    /// Host (and optional path) pattern. Capture group 1 is the wiki's host part.
    pub regex: String,
    /// Article path, e.g. `/wiki/` or `/wiki/$1`.
    pub article_path: String,
    /// Script path, e.g. `/w/`. With `regex_paths`, `$N` refers to capture group N.
    pub script_path: String,
    #[serde(default)]
    pub regex_paths: bool,
}

fn pattern(name: &str, regex: &str, article_path: &str, script_path: &str) -> ProjectPattern {
    ProjectPattern {
        name: name.to_owned(),
        regex: regex.to_owned(),
        article_path: article_path.to_owned(),
        script_path: script_path.to_owned(),
        regex_paths: false,
    }
}

/// Projects known without any configuration.
pub fn builtin_patterns() -> Vec<ProjectPattern> {
    vec![
        pattern(
            "wikimedia",
            r"((?:[a-z\d-]{1,50}\.)?(?:wikipedia|wiktionary|wikibooks|wikiquote|wikisource|wikinews|wikiversity|wikivoyage)\.org)",
            "/wiki/",
            "/w/",
        ),
        pattern(
            "wikimedia-special",
            r"((?:commons|meta|species|incubator|outreach|wikimania|foundation)\.wikimedia\.org)",
            "/wiki/",
            "/w/",
        ),
        pattern("mediawiki", r"((?:www\.)?mediawiki\.org)", "/wiki/", "/w/"),
        pattern("wikidata", r"((?:www\.|test\.)?wikidata\.org)", "/wiki/", "/w/"),
        pattern(
            "fandom",
            r"([a-z\d-]{1,50}\.(?:fandom\.com|wikia\.org)(?:/[a-z]{2,3}(?:-[a-z]{2,4})?)?)",
            "/wiki/",
            "/",
        ),
        pattern("miraheze", r"([a-z\d-]{1,50}\.miraheze\.org)", "/wiki/", "/w/"),
        pattern(
            "wiki.gg",
            r"([a-z\d-]{1,50}\.wiki\.gg(?:/[a-z]{2,3}(?:-[a-z]{2,4})?)?)",
            "/wiki/",
            "/",
        ),
    ]
}

/// Strip a trailing `$1` title placeholder from a path template.
fn strip_title_placeholder(path: &str) -> &str {
    path.strip_suffix("$1").unwrap_or(path)
}

/// A project pattern with its regexes compiled.
#[derive(Debug, Clone)]
pub struct Project {
    pub pattern: ProjectPattern,
    host_regex: Regex,
    link_regex: Regex,
}

/// Result of matching a URL against a project.
#[derive(Debug, Clone)]
pub struct ProjectMatch {
    pub project: String,
    pub wiki: Wiki,
    /// Everything after the matched prefix, decoded, with spaces restored.
    pub title: String,
    /// Capture group 1, the wiki's host part (e.g. `de.wikipedia.org`).
    pub host_part: String,
}

impl Project {
    pub fn new(pattern: ProjectPattern) -> Result<Self> {
        let host_regex = Regex::new(&format!("^(?:{})(?:/|$)", pattern.regex))
            .map_err(|e| anyhow!("Invalid regex for project `{}`: {}", pattern.name, e))?;

        let prefix = if pattern.regex_paths {
            "/".to_owned()
        } else {
            let article = pattern.article_path.split('?').next().unwrap_or_default();
            strip_title_placeholder(article).to_owned()
        };
        let link_regex = Regex::new(&format!(
            "^{}(?:{}|/?$)",
            pattern.regex,
            regex::escape(&prefix)
        ))
        .map_err(|e| anyhow!("Invalid regex for project `{}`: {}", pattern.name, e))?;

        if link_regex.captures_len() < 2 {
            return Err(anyhow!(
                "Regex for project `{}` needs a capture group for the wiki host",
                pattern.name
            ));
        }

        Ok(Self {
            pattern,
            host_regex,
            link_regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.pattern.name
    }

    pub fn matches_host(&self, target: &str) -> bool {
        self.host_regex.is_match(target)
    }

    /// Match a full URL. `space_replacement` is the requesting wiki's space character.
    ///
    /// Returns `None` when the URL does not fit the project's layout or its title
    /// does not decode cleanly.
    pub fn match_link(&self, url: &Url, space_replacement: &str) -> Option<ProjectMatch> {
        let host = url.host_str()?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_owned(),
        };
        let target = format!("{}{}", authority, url.path());
        let captures = self.link_regex.captures(&target)?;
        let matched = captures.get(0)?;
        let host_part = captures.get(1)?.as_str().to_owned();

        let replacement = if space_replacement.is_empty() {
            "_"
        } else {
            space_replacement
        };
        let title = strict_decode(&target[matched.end()..])?.replace(replacement, " ");

        let wiki = if self.pattern.regex_paths {
            let mut script_path = self.pattern.script_path.clone();
            for index in (1..captures.len()).rev() {
                let value = captures.get(index).map(|m| m.as_str()).unwrap_or_default();
                script_path = script_path.replace(&format!("${}", index), value);
            }
            Wiki::new(&format!("https://{}{}", host_part, script_path)).ok()?
        } else {
            let script_path = strip_title_placeholder(&self.pattern.script_path);
            let article = self.pattern.article_path.split('?').next().unwrap_or_default();
            let path_prefix = host_part
                .find('/')
                .map(|index| &host_part[index..])
                .unwrap_or_default();
            Wiki::with_article_path(
                &format!("https://{}{}", host_part, script_path),
                &format!("{}{}", path_prefix, strip_title_placeholder(article)),
            )
            .ok()?
        };

        Some(ProjectMatch {
            project: self.pattern.name.clone(),
            wiki,
            title,
            host_part,
        })
    }
}

/// All known projects, built-in ones first.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    /// Built-in projects followed by `extra`.
    pub fn new(extra: &[ProjectPattern]) -> Result<Self> {
        let mut patterns = builtin_patterns();
        patterns.extend(extra.iter().cloned());
        Self::from_patterns(patterns)
    }

    pub fn from_patterns(patterns: Vec<ProjectPattern>) -> Result<Self> {
        let projects = patterns
            .into_iter()
            .map(Project::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { projects })
    }

    /// The project hosting `target`, a host optionally followed by a path.
    pub fn find(&self, target: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.matches_host(target))
    }

    pub fn find_for_url(&self, url: &Url) -> Option<&Project> {
        let host = url.host_str()?;
        match url.port() {
            Some(port) => self.find(&format!("{}:{}{}", host, port, url.path())),
            None => self.find(&format!("{}{}", host, url.path())),
        }
    }

    /// Wiki named by a bare host (`de.wikipedia.org`) or a URL.
    pub fn wiki_for(&self, input: &str) -> Option<Wiki> {
        let input = input.trim();
        let url = if input.contains("://") {
            Url::parse(input).ok()?
        } else {
            Url::parse(&format!("https://{}/", input.trim_end_matches('/'))).ok()?
        };
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        if let Some(project) = self.find_for_url(&url) {
            if let Some(found) = project.match_link(&url, "_") {
                return Some(found.wiki);
            }
        }
        if input.contains("://") {
            Wiki::new(url.as_str()).ok()
        } else {
            Wiki::new(&format!("https://{}/w/", url.host_str()?)).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_registry() -> ProjectRegistry {
        ProjectRegistry::from_patterns(vec![pattern(
            "example",
            r"(other\.wiki\.example)",
            "/wiki/$1",
            "/wiki/$1",
        )])
        .unwrap()
    }

    #[test]
    fn test_match_link_extracts_title_and_wiki() {
        let registry = example_registry();
        let url = Url::parse("https://other.wiki.example/wiki/Some_Page").unwrap();
        let project = registry.find(url.host_str().unwrap()).unwrap();
        let found = project.match_link(&url, "_").unwrap();
        assert_eq!(found.title, "Some Page");
        assert_eq!(found.wiki.href(), "https://other.wiki.example/wiki/");
        assert_eq!(found.host_part, "other.wiki.example");
    }

    #[test]
    fn test_match_link_bare_host() {
        let registry = example_registry();
        let url = Url::parse("https://other.wiki.example/").unwrap();
        let found = registry
            .find("other.wiki.example")
            .and_then(|project| project.match_link(&url, "_"))
            .unwrap();
        assert_eq!(found.title, "");
    }

    #[test]
    fn test_match_link_rejects_other_paths_and_bad_escapes() {
        let registry = example_registry();
        let project = registry.find("other.wiki.example").unwrap();
        let url = Url::parse("https://other.wiki.example/index.php?title=Foo").unwrap();
        assert!(project.match_link(&url, "_").is_none());
        let url = Url::parse("https://other.wiki.example/wiki/100%").unwrap();
        assert!(project.match_link(&url, "_").is_none());
    }

    #[test]
    fn test_builtin_wikipedia() {
        let registry = ProjectRegistry::new(&[]).unwrap();
        let url = Url::parse("https://de.wikipedia.org/wiki/Rust_(Programmiersprache)").unwrap();
        let project = registry.find("de.wikipedia.org").unwrap();
        assert_eq!(project.name(), "wikimedia");
        let found = project.match_link(&url, "_").unwrap();
        assert_eq!(found.title, "Rust (Programmiersprache)");
        assert_eq!(found.wiki.href(), "https://de.wikipedia.org/w/");
        assert_eq!(found.wiki.article_prefix(), "/wiki/");
    }

    #[test]
    fn test_builtin_fandom_language_path() {
        let registry = ProjectRegistry::new(&[]).unwrap();
        let url = Url::parse("https://minecraft.fandom.com/de/wiki/Creeper").unwrap();
        let found = registry
            .find("minecraft.fandom.com")
            .and_then(|project| project.match_link(&url, "_"))
            .unwrap();
        assert_eq!(found.title, "Creeper");
        assert_eq!(found.wiki.href(), "https://minecraft.fandom.com/de/");
        assert_eq!(found.wiki.article_prefix(), "/de/wiki/");

        let url = Url::parse("https://minecraft.fandom.com/wiki/Creeper").unwrap();
        let found = registry
            .find("minecraft.fandom.com")
            .and_then(|project| project.match_link(&url, "_"))
            .unwrap();
        assert_eq!(found.wiki.href(), "https://minecraft.fandom.com/");
    }

    #[test]
    fn test_regex_paths_fill_script_path() {
        let registry = ProjectRegistry::from_patterns(vec![ProjectPattern {
            name: "farm".to_owned(),
            regex: r"(farm\.example)/([a-z]+)".to_owned(),
            article_path: "/".to_owned(),
            script_path: "/$2/w/".to_owned(),
            regex_paths: true,
        }])
        .unwrap();
        let url = Url::parse("https://farm.example/games/Some_Page").unwrap();
        assert!(registry.find("farm.example").is_none());
        let found = registry
            .find_for_url(&url)
            .and_then(|project| project.match_link(&url, "_"))
            .unwrap();
        assert_eq!(found.title, "Some Page");
        assert_eq!(found.wiki.href(), "https://farm.example/games/w/");
    }

    #[test]
    fn test_find_requires_full_host() {
        let registry = ProjectRegistry::new(&[]).unwrap();
        assert!(registry.find("en.wikipedia.org").is_some());
        assert!(registry.find("en.wikipedia.org.evil.example").is_none());
        assert!(registry.find("example.org").is_none());
    }

    #[test]
    fn test_wiki_for_host_and_url() {
        let registry = ProjectRegistry::new(&[]).unwrap();
        let wiki = registry.wiki_for("fr.wikipedia.org").unwrap();
        assert_eq!(wiki.href(), "https://fr.wikipedia.org/w/");
        let wiki = registry.wiki_for("https://unknown.example/w/").unwrap();
        assert_eq!(wiki.href(), "https://unknown.example/w/");
        assert!(registry.wiki_for("ftp://x.example/").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(ProjectRegistry::from_patterns(vec![pattern("bad", "(", "/", "/")]).is_err());
        assert!(ProjectRegistry::from_patterns(vec![pattern("nocap", "x\\.example", "/", "/")]).is_err());
    }
}
