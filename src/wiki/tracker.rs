//! Third-party issue trackers that get a dedicated reply instead of wiki resolution.

use anyhow::{anyhow, Result};
use regex::Regex;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JiraTracker {
    pub host: String,
    /// Path pattern whose capture group 1 is the issue key.
    pub key_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IssueTrackerConfig {
    #[serde(default = "default_phabricator")]
    pub phabricator: Vec<String>,
    #[serde(default = "default_jira")]
    pub jira: Vec<JiraTracker>,
}

impl Default for IssueTrackerConfig {
    fn default() -> Self {
        Self {
            phabricator: default_phabricator(),
            jira: default_jira(),
        }
    }
}

fn default_phabricator() -> Vec<String> {
    vec![
        "phabricator.wikimedia.org".to_owned(),
        "issue-tracker.miraheze.org".to_owned(),
    ]
}

fn default_jira() -> Vec<JiraTracker> {
    vec![JiraTracker {
        host: "bugs.mojang.com".to_owned(),
        key_pattern: r"^/browse/([A-Z]{2,6}-\d+)$".to_owned(),
    }]
}

/// A link recognised as belonging to an issue tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueLink {
    Phabricator { url: String, task: Option<String> },
    Jira { host: String, key: String, url: String },
}

impl IssueLink {
    pub fn url(&self) -> &str {
        match self {
            IssueLink::Phabricator { url, .. } | IssueLink::Jira { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueTrackers {
    phabricator: Vec<String>,
    jira: Vec<(String, Regex)>,
}

impl IssueTrackers {
    pub fn new(config: &IssueTrackerConfig) -> Result<Self> {
        let jira = config
            .jira
            .iter()
            .map(|tracker| {
                Regex::new(&tracker.key_pattern)
                    .map(|regex| (tracker.host.clone(), regex))
                    .map_err(|e| anyhow!("Invalid key pattern for `{}`: {}", tracker.host, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            phabricator: config.phabricator.clone(),
            jira,
        })
    }

    /// Classify `url`. Jira links only count without query or fragment.
    pub fn classify(&self, url: &Url) -> Option<IssueLink> {
        let host = url.host_str()?;

        if self.phabricator.iter().any(|known| known == host) {
            let task = url
                .path()
                .strip_prefix("/T")
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                .map(|id| format!("T{}", id));
            return Some(IssueLink::Phabricator {
                url: url.to_string(),
                task,
            });
        }

        if url.query().is_some_and(|q| !q.is_empty()) || url.fragment().is_some_and(|f| !f.is_empty()) {
            return None;
        }
        self.jira
            .iter()
            .filter(|(known, _)| known == host)
            .find_map(|(_, pattern)| pattern.captures(url.path()))
            .and_then(|captures| captures.get(1))
            .map(|key| IssueLink::Jira {
                host: host.to_owned(),
                key: key.as_str().to_owned(),
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trackers() -> IssueTrackers {
        IssueTrackers::new(&IssueTrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_phabricator_task() {
        let url = Url::parse("https://phabricator.wikimedia.org/T12345").unwrap();
        assert_eq!(
            trackers().classify(&url),
            Some(IssueLink::Phabricator {
                url: "https://phabricator.wikimedia.org/T12345".to_owned(),
                task: Some("T12345".to_owned()),
            })
        );
    }

    #[test]
    fn test_jira_issue_key() {
        let url = Url::parse("https://bugs.mojang.com/browse/MC-4").unwrap();
        let link = trackers().classify(&url).unwrap();
        assert_eq!(
            link,
            IssueLink::Jira {
                host: "bugs.mojang.com".to_owned(),
                key: "MC-4".to_owned(),
                url: "https://bugs.mojang.com/browse/MC-4".to_owned(),
            }
        );
    }

    #[test]
    fn test_jira_needs_clean_url() {
        let trackers = trackers();
        for link in [
            "https://bugs.mojang.com/browse/MC-4?focus=1",
            "https://bugs.mojang.com/browse/MC-4#comment",
            "https://bugs.mojang.com/projects/MC",
            "https://example.org/browse/MC-4",
        ] {
            assert_eq!(trackers.classify(&Url::parse(link).unwrap()), None, "{}", link);
        }
    }
}
