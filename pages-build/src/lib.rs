//! # pages-build
//!
//! Turns a push into a published site.
//!
//! [`launch_builder`] is the entry point: it opens the build log, runs a
//! [`SiteBuilder`] under the repository's [`RepoLock`] and moves the finished
//! log next to the published output. Every external tool is reached through
//! the [`CommandRunner`], [`RepoSynchronizer`] and [`Publisher`] traits.

pub mod command;
pub mod error;
pub mod git;
pub mod invoker;
pub mod launch;
pub mod lock;
pub mod publish;
pub mod site_builder;

pub use command::{CommandRunner, ProcessRunner};
pub use error::BuildError;
pub use git::{GitSynchronizer, RepoSynchronizer};
pub use invoker::BuildInvoker;
pub use launch::{launch_builder, log_path_for, run_logged_build};
pub use lock::{LockTable, RepoLock};
pub use publish::{CommandPublisher, LocalPublisher, Publisher};
pub use site_builder::{BuildSettings, Components, SiteBuilder};
