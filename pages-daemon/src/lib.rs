//! Webhook listener: payload parsing, builder dispatch and the HTTP runtime.

pub mod dispatch;
mod error;
mod runtime;
pub mod server;
pub mod webhooks;

pub use dispatch::{collection_from_git_url_prefix, Dispatch, Dispatcher};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, serve, start_blocking};
pub use server::{router, AppState, BuildLauncher, SiteLauncher};
pub use webhooks::parse_webhook;
