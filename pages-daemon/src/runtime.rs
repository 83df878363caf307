use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use pages_build::LockTable;
use pages_core::ServerConfig;

use crate::error::{io_err, DaemonError};
use crate::server::{router, AppState, SiteLauncher};

/// Start the listener and block the current thread until it exits.
pub fn start_blocking(config: ServerConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Bind `host:port` and serve webhooks until ctrl-c.
pub async fn run(config: ServerConfig) -> Result<(), DaemonError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let config = Arc::new(config);
    let launcher = Arc::new(SiteLauncher::new(config.clone(), Arc::new(LockTable::default())));
    let state = AppState::new(&config, launcher)?;
    tracing::info!(
        addr = %addr,
        webhook_type = %config.webhook_type,
        builders = config.builders.len(),
        "listening for webhooks"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = serve(listener, state, async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => {
                            let _ = shutdown.send(());
                            Err(DaemonError::Signal(err))
                        }
                    }
                }
            }
        })
    };

    let (server_result, signal_result) = tokio::join!(server_handle, signal_handle);
    handle_join("http_server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Serve the webhook router on `listener` until `shutdown` resolves.
///
/// Builds already spawned keep running on the runtime; only the listener stops.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), DaemonError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| io_err(local, e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task: task.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Install the process-wide subscriber.
///
/// `RUST_LOG` filters (default `info`); `PAGES_LOG_FORMAT=json` switches to
/// one JSON object per line for log shippers.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PAGES_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
}
