//! Bind-and-serve lifecycle for the gateway.
//!
//! The server participates in the same watch-channel shutdown as the
//! bridge and the poll scheduler: when the flag flips, axum stops
//! accepting connections and drains the ones in flight.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Listen address for the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

/// Errors from the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured host/port pair is not a valid socket address.
    #[error("invalid listen address {addr}: {source}")]
    Address {
        /// The rejected address string.
        addr: String,
        /// The underlying parse error.
        source: std::net::AddrParseError,
    },

    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The server terminated with an I/O error.
    #[error("gateway server terminated: {source}")]
    Serve {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Serve the gateway until `shutdown` flips to `true`, then drain.
///
/// # Errors
///
/// Returns [`ServerError`] when the address is invalid, the listener
/// cannot bind, or serving fails with an I/O error.
pub async fn start_server(
    config: ServerConfig,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|source| ServerError::Address {
            addr: format!("{}:{}", config.host, config.port),
            source,
        })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
            info!("gateway draining connections");
        })
        .await
        .map_err(|source| ServerError::Serve { source })?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::broker::SubscriptionBroker;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(SubscriptionBroker::new(
            16,
            Duration::from_secs(60),
        ))))
    }

    #[tokio::test]
    async fn invalid_listen_address_is_rejected() {
        let (_tx, rx) = watch::channel(false);
        let config = ServerConfig {
            host: String::from("not-an-address"),
            port: 8080,
        };
        let result = start_server(config, state(), rx).await;
        assert!(matches!(result, Err(ServerError::Address { .. })));
    }

    #[tokio::test]
    async fn shutdown_flag_stops_the_server() {
        let (tx, rx) = watch::channel(false);
        let config = ServerConfig {
            host: String::from("127.0.0.1"),
            port: 0,
        };
        let handle = tokio::spawn(start_server(config, state(), rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
