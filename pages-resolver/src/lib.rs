//! # pages-resolver
//!
//! Decides how a checked-out site is built and where its output goes.
//!
//! [`ConfigResolver::initialize`] inspects the working copy, then
//! [`ConfigResolver::read_or_write_config`] settles the base URL and
//! [`ConfigResolver::build_configurations`] yields the generator passes.
//! [`ConfigResolver::remove_generated_config`] must wrap the generator step.

pub mod error;
pub mod metadata;
pub mod resolver;

pub use error::ResolveError;
pub use metadata::PagesMetadata;
pub use resolver::{BuildTarget, ConfigResolver, ResolvedConfiguration};
