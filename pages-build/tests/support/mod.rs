//! Recording fakes and a temp-dir harness shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use pages_build::command::command_line;
use pages_build::{
    BuildError, BuildSettings, CommandRunner, Components, LockTable, Publisher, RepoLock,
    RepoSynchronizer, SiteBuilder,
};
use pages_core::{
    config, BranchName, BuildEvent, BuildLogger, BuilderOptions, CommitInfo, Person, RepoName,
    ServerConfig,
};
use pages_resolver::ConfigResolver;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Records every command line; fails the first one containing `fail_on`.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            calls: Mutex::default(),
            fail_on: Some(fragment.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String], _cwd: &Path) -> Result<(), BuildError> {
        let command = command_line(program, args);
        self.calls.lock().expect("calls").push(command.clone());
        match &self.fail_on {
            Some(fragment) if command.contains(fragment.as_str()) => Err(BuildError::CommandFailed {
                command,
                status: "exit code 1".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Records, per command, the working directory and the descriptor found there.
#[derive(Default)]
pub struct DescriptorRunner {
    seen: Mutex<Vec<(PathBuf, String)>>,
}

impl DescriptorRunner {
    pub fn seen(&self) -> Vec<(PathBuf, String)> {
        self.seen.lock().expect("seen").clone()
    }
}

#[async_trait]
impl CommandRunner for DescriptorRunner {
    async fn run(&self, _program: &str, _args: &[String], cwd: &Path) -> Result<(), BuildError> {
        let descriptor = std::fs::read_to_string(cwd.join("_config_pages.yml")).unwrap_or_default();
        self.seen
            .lock()
            .expect("seen")
            .push((cwd.to_path_buf(), descriptor));
        Ok(())
    }
}

/// Records `start:<label>` / `end:<label>` around an optional pause.
#[derive(Default)]
pub struct FakeRepo {
    pub label: String,
    pub events: Arc<Mutex<Vec<String>>>,
    pub pause: Option<Duration>,
    pub barrier: Option<Arc<tokio::sync::Barrier>>,
    pub error: Option<String>,
}

impl FakeRepo {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events").clone()
    }
}

#[async_trait]
impl RepoSynchronizer for FakeRepo {
    async fn prepare_repo(&self, branch: &BranchName) -> Result<(), BuildError> {
        self.events
            .lock()
            .expect("events")
            .push(format!("start:{}:{branch}", self.label));
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(pause) = self.pause {
            tokio::time::sleep(pause).await;
        }
        self.events
            .lock()
            .expect("events")
            .push(format!("end:{}:{branch}", self.label));
        match &self.error {
            Some(message) => Err(BuildError::CommandFailed {
                command: format!("git clone {message}"),
                status: "exit code 1".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Records each destination; fails for `fail_for`.
#[derive(Default)]
pub struct RecordingPublisher {
    synced: Mutex<Vec<PathBuf>>,
    pub fail_for: Option<PathBuf>,
}

impl RecordingPublisher {
    pub fn failing_for(destination: PathBuf) -> Self {
        Self {
            synced: Mutex::default(),
            fail_for: Some(destination),
        }
    }

    pub fn synced(&self) -> Vec<PathBuf> {
        self.synced.lock().expect("synced").clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn sync(&self, destination: &Path) -> Result<(), BuildError> {
        self.synced
            .lock()
            .expect("synced")
            .push(destination.to_path_buf());
        if self.fail_for.as_deref() == Some(destination) {
            return Err(BuildError::Publish {
                destination: destination.to_path_buf(),
                message: "upload refused".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub home: TempDir,
    pub config: ServerConfig,
    pub opts: BuilderOptions,
    pub locks: Arc<LockTable>,
}

impl Harness {
    /// `builder_extra` is appended to the single builder entry.
    pub fn new(builder_extra: &str) -> Self {
        let home = TempDir::new().expect("home");
        let yaml = format!(
            "home: '{}'\n\
             git_url_prefix: git@github.com:example-org\n\
             pages_yaml: .pages.yml\n\
             bundler_cache_dir: bundler_cache_dir\n\
             builders:\n\
             \x20 - branch: pages\n\
             \x20   repository_dir: repo_dir\n\
             \x20   generated_site_dir: dest_dir\n\
             {builder_extra}",
            home.path().display()
        );
        let config = config::parse(&yaml, Path::new("inline.yaml")).expect("config");
        let opts = options_for(&config, "pages");
        std::fs::create_dir_all(&opts.site_path).expect("mkdir site");
        Self {
            home,
            config,
            opts,
            locks: Arc::new(LockTable::new()),
        }
    }

    /// Options for `branch`; branch-qualified builders get their own checkout.
    pub fn options_for(&self, branch: &str) -> BuilderOptions {
        options_for(&self.config, branch)
    }

    /// Write `name` into the working copy of `branch`, creating it.
    pub fn write_branch(&self, branch: &str, name: &str, contents: &str) -> &Self {
        let site_path = self.options_for(branch).site_path;
        std::fs::create_dir_all(&site_path).expect("mkdir site");
        std::fs::write(site_path.join(name), contents).expect("write site file");
        self
    }

    pub fn with_internal_dir() -> Self {
        Self::new("    internal_site_dir: internal_dest_dir\n")
    }

    pub fn write(&self, name: &str, contents: &str) -> &Self {
        std::fs::write(self.opts.site_path.join(name), contents).expect("write site file");
        self
    }

    pub fn site(&self, name: &str) -> PathBuf {
        self.opts.site_path.join(name)
    }

    pub fn public_dest(&self) -> PathBuf {
        self.opts.dest_dir.join("hub")
    }

    pub fn internal_dest(&self) -> PathBuf {
        self.opts
            .internal_dest_dir
            .as_ref()
            .expect("internal_dest_dir configured")
            .join("hub")
    }

    pub fn builder(
        &self,
        branch: &str,
        runner: Arc<dyn CommandRunner>,
        repo: Arc<FakeRepo>,
        publisher: Arc<RecordingPublisher>,
        logger: Arc<BuildLogger>,
    ) -> SiteBuilder {
        let opts = self.options_for(branch);
        let branch = BranchName::from(branch);
        let components = Components {
            resolver: ConfigResolver::new(&opts, branch.clone(), logger),
            runner,
            repo,
            publisher,
            lock: RepoLock::new(self.locks.clone(), &opts, &branch)
                .with_poll_interval(Duration::from_millis(10)),
        };
        SiteBuilder::new(
            branch,
            opts.site_path,
            components,
            BuildSettings::from_config(&self.config),
        )
    }
}

fn options_for(config: &ServerConfig, branch: &str) -> BuilderOptions {
    BuilderOptions::new(
        RepoName::from("hub"),
        &BranchName::from(branch),
        config,
        &config.builders[0],
    )
}

pub fn event() -> BuildEvent {
    let person = Person {
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
    };
    BuildEvent {
        branch: "refs/heads/pages".to_string(),
        collection: "example-org".to_string(),
        repository: "hub".to_string(),
        commit: CommitInfo {
            id: "deadbeef".to_string(),
            message: "Build me".to_string(),
            timestamp: "2017-10-29 16:37:01".to_string(),
        },
        author: person.clone(),
        committer: Some(person.clone()),
        pusher: Some(person),
    }
}
