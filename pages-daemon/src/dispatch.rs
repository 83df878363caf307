//! Matching webhook events to configured builders.

use regex::Regex;

use pages_core::{BranchName, BuildEvent, BuilderConfig, ServerConfig};

use crate::error::DaemonError;

/// Collection (user, organization or project) named by a clone URL prefix.
///
/// `git@github.com:Example-Org/` and `https://github.com/example-org` both
/// yield `example-org`.
pub fn collection_from_git_url_prefix(prefix: &str) -> String {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    trimmed
        .rsplit(|c: char| c == ':' || c == '/')
        .next()
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// One builder's matching rule.
#[derive(Debug, Clone)]
struct Route {
    collection: String,
    branch: Regex,
    builder: BuilderConfig,
}

/// Event-to-builder router built once from the server configuration.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

/// A builder selected for an event, with the branch it should build.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub branch: BranchName,
    pub builder: BuilderConfig,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig) -> Result<Self, DaemonError> {
        let mut routes = Vec::with_capacity(config.builders.len());
        for (index, builder) in config.builders.iter().enumerate() {
            let prefix = builder
                .git_url_prefix
                .as_deref()
                .or(config.git_url_prefix.as_deref())
                .unwrap_or_default();
            let pattern = builder.branch_pattern().unwrap_or_default();
            let branch = Regex::new(&format!("refs/heads/({pattern})$")).map_err(|source| {
                DaemonError::InvalidPattern {
                    index,
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            routes.push(Route {
                collection: collection_from_git_url_prefix(prefix),
                branch,
                builder: builder.clone(),
            });
        }
        Ok(Self { routes })
    }

    /// Every builder whose collection and branch pattern match `event`.
    pub fn matches(&self, event: &BuildEvent) -> Vec<Dispatch> {
        let collection = event.collection.to_lowercase();
        self.routes
            .iter()
            .filter(|route| route.collection == collection)
            .filter_map(|route| {
                let captures = route.branch.captures(&event.branch)?;
                let branch = captures.get(1)?.as_str();
                Some(Dispatch {
                    branch: BranchName::from(branch),
                    builder: route.builder.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pages_core::{config, CommitInfo, Person};
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("git@github.com:example-org", "example-org")]
    #[case("git@github.com:Example-Org/", "example-org")]
    #[case("https://github.com/example-org/", "example-org")]
    #[case("https://git.example.com/scm/DOCS", "docs")]
    #[case("example-org", "example-org")]
    fn collection_is_last_prefix_segment(#[case] prefix: &str, #[case] expected: &str) {
        assert_eq!(collection_from_git_url_prefix(prefix), expected);
    }

    fn event(collection: &str, git_ref: &str) -> BuildEvent {
        let person = Person {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
        };
        BuildEvent {
            branch: git_ref.to_string(),
            collection: collection.to_string(),
            repository: "hub".to_string(),
            commit: CommitInfo {
                id: "deadbeef".to_string(),
                message: "Build me".to_string(),
                timestamp: "2017-10-29 16:37:01".to_string(),
            },
            author: person,
            committer: None,
            pusher: None,
        }
    }

    fn dispatcher() -> Dispatcher {
        let yaml = "\
home: /srv/pages
git_url_prefix: git@github.com:example-org
builders:
  - branch: pages
    repository_dir: repos/pages
    generated_site_dir: sites/pages
  - branch: pages-internal
    repository_dir: repos/internal
    generated_site_dir: sites/internal
  - branch_in_url_pattern: 'v[0-9]+\\.[0-9]+'
    repository_dir: repos/versions
    generated_site_dir: sites/versions
    git_url_prefix: https://git.example.com/scm/docs
";
        let config = config::parse(yaml, Path::new("inline.yaml")).expect("config");
        Dispatcher::new(&config).expect("dispatcher")
    }

    #[test]
    fn exact_branch_selects_one_builder() {
        let hits = dispatcher().matches(&event("example-org", "refs/heads/pages"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].branch.as_str(), "pages");
        assert_eq!(hits[0].builder.generated_site_dir, Path::new("sites/pages"));
    }

    #[test]
    fn branch_pattern_is_anchored_at_the_end() {
        let hits = dispatcher().matches(&event("example-org", "refs/heads/pages-internal"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].branch.as_str(), "pages-internal");
    }

    #[test]
    fn url_pattern_captures_version_branch() {
        let hits = dispatcher().matches(&event("DOCS", "refs/heads/v1.2"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].branch.as_str(), "v1.2");
    }

    #[test]
    fn other_collection_or_branch_is_ignored() {
        let d = dispatcher();
        assert!(d.matches(&event("someone-else", "refs/heads/pages")).is_empty());
        assert!(d.matches(&event("example-org", "refs/heads/main")).is_empty());
        assert!(d.matches(&event("docs", "refs/heads/pages")).is_empty());
    }

    #[test]
    fn invalid_pattern_names_the_builder() {
        let yaml = "\
home: /srv/pages
git_url_prefix: git@github.com:example-org
builders:
  - branch_in_url_pattern: 'v[0-9'
    repository_dir: r
    generated_site_dir: s
";
        let config = config::parse(yaml, Path::new("inline.yaml")).expect("config");
        let err = Dispatcher::new(&config).unwrap_err();
        assert!(err.to_string().contains("builders[0]"), "got: {err}");
    }
}
