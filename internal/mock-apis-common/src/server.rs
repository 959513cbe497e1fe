use std::fmt::Display;
use std::io::ErrorKind;
use std::net::SocketAddr;

use axum::Router;
use tokio::signal;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::endpoints::handle_404;
use crate::error::{Error, ErrorDetails};

pub trait RouterExt {
    /// Adds the 404 fallback and request tracing every mock service shares.
    fn with_default_layers(self) -> Self;
}

impl RouterExt for Router {
    fn with_default_layers(self) -> Self {
        self.fallback(handle_404)
            // Failed requests are already logged by `Error::new`
            .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)))
    }
}

/// Binds `0.0.0.0:<port>` and serves `router` until a shutdown signal arrives.
pub async fn serve(router: Router, port: u16, service_name: &str) -> Result<(), Error> {
    let bind_address = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            return Err(Error::new(ErrorDetails::Server {
                message: format!(
                    "Failed to bind to socket address {bind_address}: {e}. Tip: Ensure no other process is using port {port} or try a different port."
                ),
            }));
        }
        Err(e) => {
            return Err(Error::new(ErrorDetails::Server {
                message: format!("Failed to bind to socket address {bind_address}: {e}"),
            }));
        }
    };

    // This will give us the chosen port if the user specified a port of 0
    let actual_bind_address = listener.local_addr().map_err(|e| {
        Error::new(ErrorDetails::Server {
            message: format!("Failed to get bind address from listener: {e}"),
        })
    })?;
    tracing::info!("{service_name} is listening on {actual_bind_address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            Error::new(ErrorDetails::Server {
                message: format!("Failed to start server: {e}"),
            })
        })?;

    tracing::info!("{service_name} shut down");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = wait_for_unix_signal(signal::unix::SignalKind::terminate(), "SIGTERM");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let hangup = wait_for_unix_signal(signal::unix::SignalKind::hangup(), "SIGHUP");

    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
        () = hangup => {
            tracing::info!("Received SIGHUP signal");
        }
    };
}

#[cfg(unix)]
async fn wait_for_unix_signal(kind: signal::unix::SignalKind, name: &str) {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to install {name} handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

/// Startup-only escape hatch for the service binaries.
///
/// Setting up logs and binding the listener are the only fallible steps a mock
/// service can't recover from, so `main` logs the failure and exits with status 1.
/// Request handling never uses this.
pub trait ExpectPretty<T> {
    fn expect_pretty(self, msg: &str) -> T;
}

impl<T, E: Display> ExpectPretty<T> for Result<T, E> {
    fn expect_pretty(self, msg: &str) -> T {
        self.unwrap_or_else(|err| {
            tracing::error!("{msg}: {err}");
            std::process::exit(1)
        })
    }
}
