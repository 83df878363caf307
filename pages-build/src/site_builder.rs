//! The build pipeline for one push.
//!
//! ```text
//! lock -> sync repo -> resolve config -> [bundle install] -> generate | rsync
//!      -> publish each target -> unlock
//! ```
//!
//! Single pass, no retries: the first failing stage settles the build.

use std::path::PathBuf;
use std::sync::Arc;

use pages_core::{BranchName, BuildLogger, BuilderOptions, ServerConfig};
use pages_resolver::{BuildTarget, ConfigResolver, ResolvedConfiguration};

use crate::command::{CommandRunner, ProcessRunner};
use crate::error::BuildError;
use crate::git::{GitSynchronizer, RepoSynchronizer};
use crate::invoker::BuildInvoker;
use crate::lock::{LockTable, RepoLock};
use crate::publish::{CommandPublisher, LocalPublisher, Publisher};

/// Server-wide settings the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub home: PathBuf,
    pub bundler_cache_dir: PathBuf,
    pub rsync_opts: Vec<String>,
}

impl BuildSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            home: config.home.clone(),
            bundler_cache_dir: config.bundler_cache_dir.clone(),
            rsync_opts: config.rsync_opts.clone(),
        }
    }
}

/// Collaborators of one build. Tests swap in fakes.
pub struct Components {
    pub resolver: ConfigResolver,
    pub runner: Arc<dyn CommandRunner>,
    pub repo: Arc<dyn RepoSynchronizer>,
    pub publisher: Arc<dyn Publisher>,
    pub lock: RepoLock,
}

impl Components {
    /// Production wiring: real processes, `git`, and the configured publisher.
    pub fn for_build(
        opts: &BuilderOptions,
        branch: &BranchName,
        config: &ServerConfig,
        locks: Arc<LockTable>,
        logger: Arc<BuildLogger>,
    ) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(logger.clone()));
        let publisher: Arc<dyn Publisher> = match &config.publish {
            Some(publish) => Arc::new(CommandPublisher::new(
                runner.clone(),
                publish.clone(),
                config.home.clone(),
                logger.clone(),
            )),
            None => Arc::new(LocalPublisher::new(logger.clone())),
        };
        Self {
            resolver: ConfigResolver::new(opts, branch.clone(), logger.clone()),
            repo: Arc::new(GitSynchronizer::new(runner.clone(), opts, logger)),
            publisher,
            lock: RepoLock::new(locks, opts, branch),
            runner,
        }
    }
}

/// Builds and publishes one branch of one repository.
pub struct SiteBuilder {
    branch: BranchName,
    site_path: PathBuf,
    settings: BuildSettings,
    resolver: ConfigResolver,
    invoker: BuildInvoker,
    runner: Arc<dyn CommandRunner>,
    repo: Arc<dyn RepoSynchronizer>,
    publisher: Arc<dyn Publisher>,
    lock: RepoLock,
}

impl SiteBuilder {
    pub fn new(
        branch: BranchName,
        site_path: PathBuf,
        components: Components,
        settings: BuildSettings,
    ) -> Self {
        Self {
            invoker: BuildInvoker::new(components.runner.clone(), site_path.clone()),
            branch,
            site_path,
            settings,
            resolver: components.resolver,
            runner: components.runner,
            repo: components.repo,
            publisher: components.publisher,
            lock: components.lock,
        }
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn resolved(&self) -> &ResolvedConfiguration {
        self.resolver.resolved()
    }

    /// Destination of the public build, where the build log ends up.
    pub fn public_destination(&self) -> PathBuf {
        self.resolver
            .build_configurations()
            .pop()
            .map(|target| target.destination)
            .unwrap_or_else(|| self.resolver.resolved().build_destination.clone())
    }

    /// Run the whole pipeline under the repository lock.
    pub async fn build(&mut self) -> Result<(), BuildError> {
        let lock = self.lock.clone();
        lock.do_locked_operation(self.run_pipeline()).await
    }

    pub(crate) fn lock(&self) -> &RepoLock {
        &self.lock
    }

    /// The pipeline without the lock; callers hold it.
    pub(crate) async fn run_pipeline(&mut self) -> Result<(), BuildError> {
        self.repo.prepare_repo(&self.branch).await?;
        self.resolver.initialize().await?;

        if self.resolver.resolved().uses_dependency_manager {
            self.install_dependencies().await?;
        }

        if self.resolver.resolved().uses_generator {
            let generated = self.generate().await;
            self.resolver.remove_generated_config(generated).await?;
        } else {
            self.copy_sources().await?;
        }

        self.publish_all().await
    }

    async fn install_dependencies(&self) -> Result<(), BuildError> {
        let cache = self.settings.home.join(&self.settings.bundler_cache_dir);
        let args = vec!["install".to_string(), format!("--path={}", cache.display())];
        self.runner.run("bundle", &args, &self.site_path).await
    }

    async fn generate(&mut self) -> Result<(), BuildError> {
        self.resolver.read_or_write_config().await?;
        let targets = self.resolver.build_configurations();
        let bundler = self.resolver.resolved().uses_dependency_manager;
        self.invoker.build(&targets, bundler).await
    }

    async fn copy_sources(&self) -> Result<(), BuildError> {
        for BuildTarget { destination, .. } in self.resolver.build_configurations() {
            let mut args = self.settings.rsync_opts.clone();
            args.push("./".to_string());
            args.push(destination.display().to_string());
            self.runner.run("rsync", &args, &self.site_path).await?;
        }
        Ok(())
    }

    async fn publish_all(&self) -> Result<(), BuildError> {
        for target in self.resolver.build_configurations() {
            self.publisher.sync(&target.destination).await?;
        }
        Ok(())
    }
}
