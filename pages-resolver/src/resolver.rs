//! Build-mode and destination resolution for one site build.
//!
//! A [`ConfigResolver`] lives for exactly one build. It inspects the working copy
//! for marker files, loads the pages metadata, computes the public and internal
//! destinations, owns the generated descriptor and finally produces the ordered
//! list of [`BuildTarget`]s handed to the generator.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use pages_core::{BranchName, BuildLogger, BuilderOptions, RepoName};

use crate::error::{io_err, ResolveError};
use crate::metadata::{parse_descriptor, parse_metadata, render_descriptor};

/// Generator configuration; its presence selects generator mode.
pub const GENERATOR_CONFIG: &str = "_config.yml";
/// Dependency manifest; its presence adds the dependency-install step.
pub const DEPENDENCY_MANIFEST: &str = "Gemfile";
/// Overlay applied to the internal build.
pub const INTERNAL_CONFIG: &str = "_config_internal.yml";
/// Overlay applied to the public build; requires the internal overlay.
pub const EXTERNAL_CONFIG: &str = "_config_external.yml";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What the resolver has learned about the working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    pub has_pages_metadata: bool,
    pub uses_generator: bool,
    pub uses_dependency_manager: bool,
    pub has_internal_override: bool,
    pub has_external_override: bool,
    /// Unset until read from metadata, read from the descriptor or generated.
    pub base_url: Option<String>,
    /// Public destination, before branch qualification.
    pub build_destination: PathBuf,
    /// Internal destination, before branch qualification.
    pub internal_build_destination: Option<PathBuf>,
    /// True only while a descriptor created by this build is on disk.
    pub generated_descriptor: bool,
}

/// One generator pass: output directory plus ordered configuration layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub destination: PathBuf,
    pub configurations: Vec<String>,
}

impl BuildTarget {
    /// Configuration layers in the comma-joined form the generator expects.
    pub fn config_arg(&self) -> String {
        self.configurations.join(",")
    }
}

/// Resolver for one build of one repository branch.
#[derive(Debug)]
pub struct ConfigResolver {
    site_path: PathBuf,
    repo_name: RepoName,
    branch: BranchName,
    pages_config: String,
    pages_yaml: Option<String>,
    dest_dir: PathBuf,
    internal_dest_dir: Option<PathBuf>,
    branch_in_url: bool,
    logger: Arc<BuildLogger>,
    state: ResolvedConfiguration,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ConfigResolver {
    pub fn new(opts: &BuilderOptions, branch: BranchName, logger: Arc<BuildLogger>) -> Self {
        let state = ResolvedConfiguration {
            build_destination: opts.dest_dir.join(&opts.repo_name.0),
            internal_build_destination: opts
                .internal_dest_dir
                .as_ref()
                .map(|dir| dir.join(&opts.repo_name.0)),
            ..ResolvedConfiguration::default()
        };
        Self {
            site_path: opts.site_path.clone(),
            repo_name: opts.repo_name.clone(),
            branch,
            pages_config: opts.pages_config.clone(),
            pages_yaml: opts.pages_yaml.clone(),
            dest_dir: opts.dest_dir.clone(),
            internal_dest_dir: opts.internal_dest_dir.clone(),
            branch_in_url: opts.branch_in_url,
            logger,
            state,
        }
    }

    pub fn resolved(&self) -> &ResolvedConfiguration {
        &self.state
    }

    /// Absolute path of the descriptor inside the working copy.
    pub fn descriptor_path(&self) -> PathBuf {
        self.site_path.join(&self.pages_config)
    }

    /// Check marker files, validate overlays and load the pages metadata.
    ///
    /// Overlay validation and metadata loading both run; when both fail the
    /// overlay error is returned.
    pub async fn initialize(&mut self) -> Result<(), ResolveError> {
        let (pages_yaml, generator, manifest, internal, external) = tokio::join!(
            self.has_file("has_pages_metadata", self.pages_yaml.as_deref()),
            self.has_file("uses_generator", Some(GENERATOR_CONFIG)),
            self.has_file("uses_dependency_manager", Some(DEPENDENCY_MANIFEST)),
            self.has_file("has_internal_override", Some(INTERNAL_CONFIG)),
            self.has_file("has_external_override", Some(EXTERNAL_CONFIG)),
        );
        self.state.has_pages_metadata = pages_yaml?;
        self.state.uses_generator = generator?;
        self.state.uses_dependency_manager = manifest?;
        self.state.has_internal_override = internal?;
        self.state.has_external_override = external?;

        let overlays = self.check_overlays();
        let metadata = self.load_metadata().await;
        overlays?;
        metadata
    }

    /// Read the existing descriptor, or generate one from the metadata.
    pub async fn read_or_write_config(&mut self) -> Result<(), ResolveError> {
        let path = self.descriptor_path();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        if exists {
            self.read_config(&path).await
        } else {
            self.write_config(&path).await
        }
    }

    /// Ordered generator passes: internal first, then public.
    pub fn build_configurations(&self) -> Vec<BuildTarget> {
        let mut targets = Vec::with_capacity(2);

        if self.state.has_internal_override {
            if let Some(destination) = &self.state.internal_build_destination {
                targets.push(BuildTarget {
                    destination: destination.clone(),
                    configurations: self.layers(Some(INTERNAL_CONFIG)),
                });
            }
        }

        let overlay = self
            .state
            .has_external_override
            .then_some(EXTERNAL_CONFIG);
        targets.push(BuildTarget {
            destination: self.state.build_destination.clone(),
            configurations: self.layers(overlay),
        });

        if self.branch_in_url {
            for target in &mut targets {
                target.destination = target.destination.join(self.branch.as_str());
            }
        }
        targets
    }

    /// Remove the descriptor if this build generated it, then hand back `prior`.
    ///
    /// A removal failure replaces `prior`. Runs at most once per generated
    /// descriptor.
    pub async fn remove_generated_config<T, E>(&mut self, prior: Result<T, E>) -> Result<T, E>
    where
        E: From<ResolveError>,
    {
        if !self.state.generated_descriptor {
            return prior;
        }
        self.state.generated_descriptor = false;

        let path = self.descriptor_path();
        self.logger
            .log(format!("removing generated {}", self.pages_config));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => prior,
            Err(err) => {
                self.logger.error(format!(
                    "failed to remove {}: {err}",
                    path.display()
                ));
                Err(io_err(&path, err).into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl ConfigResolver {
    async fn has_file(&self, property: &str, file: Option<&str>) -> Result<bool, ResolveError> {
        let Some(file) = file else {
            self.logger
                .log(format!("missing file configuration for property: {property}"));
            return Ok(false);
        };
        let path = self.site_path.join(file);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_err(&path, e))
    }

    fn check_overlays(&self) -> Result<(), ResolveError> {
        if self.state.has_internal_override && self.internal_dest_dir.is_none() {
            return Err(ResolveError::InternalConfigWithoutInternalDir);
        }
        if self.state.has_external_override && !self.state.has_internal_override {
            return Err(ResolveError::ExternalConfigWithoutInternalConfig);
        }
        Ok(())
    }

    async fn load_metadata(&mut self) -> Result<(), ResolveError> {
        if !self.state.has_pages_metadata {
            return Ok(());
        }
        let Some(name) = self.pages_yaml.as_deref() else {
            return Ok(());
        };
        let path = self.site_path.join(name);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        let metadata = parse_metadata(&contents, &path)?;

        if let Some(baseurl) = metadata.baseurl {
            self.apply_baseurl(&baseurl)?;
            self.state.base_url = Some(baseurl);
        }
        Ok(())
    }

    async fn read_config(&mut self, path: &Path) -> Result<(), ResolveError> {
        self.logger.log(format!("using existing {}", self.pages_config));
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_err(path, e))?;
        if let Some(baseurl) = parse_descriptor(&contents) {
            self.apply_baseurl(&baseurl)?;
            self.state.base_url = Some(baseurl);
        }
        Ok(())
    }

    async fn write_config(&mut self, path: &Path) -> Result<(), ResolveError> {
        self.logger.log(format!("generating {}", self.pages_config));

        let mut baseurl = self
            .state
            .base_url
            .clone()
            .unwrap_or_else(|| format!("/{}", self.repo_name));
        if self.branch_in_url {
            baseurl = format!("{baseurl}/{}", self.branch);
        }

        tokio::fs::write(path, render_descriptor(&baseurl))
            .await
            .map_err(|e| io_err(path, e))?;
        self.state.generated_descriptor = true;
        self.state.base_url = Some(baseurl);
        Ok(())
    }

    /// Recompute destinations under `baseurl`. Empty and `/` leave them alone.
    fn apply_baseurl(&mut self, baseurl: &str) -> Result<(), ResolveError> {
        if baseurl.is_empty() || baseurl == "/" {
            return Ok(());
        }
        let public = descendant_of(&self.dest_dir, baseurl)?;
        let internal = self
            .internal_dest_dir
            .as_deref()
            .map(|root| descendant_of(root, baseurl))
            .transpose()?;

        self.state.build_destination = public;
        self.state.internal_build_destination = internal;
        Ok(())
    }

    fn layers(&self, overlay: Option<&str>) -> Vec<String> {
        std::iter::once(GENERATOR_CONFIG)
            .chain(overlay)
            .chain(std::iter::once(self.pages_config.as_str()))
            .map(str::to_string)
            .collect()
    }
}

impl Drop for ConfigResolver {
    fn drop(&mut self) {
        if !self.state.generated_descriptor {
            return;
        }
        let path = self.descriptor_path();
        if let Err(err) = std::fs::remove_file(&path) {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to remove generated descriptor"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `root/baseurl`, normalized, provided it lands strictly below `root`.
fn descendant_of(root: &Path, baseurl: &str) -> Result<PathBuf, ResolveError> {
    let root = normalize(root);
    let joined = normalize(&root.join(baseurl.trim_start_matches('/')));
    if joined.starts_with(&root) && joined != root {
        Ok(joined)
    } else {
        Err(ResolveError::RelativeBaseurl {
            baseurl: baseurl.to_string(),
        })
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}
