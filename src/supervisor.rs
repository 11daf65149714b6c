//! Supervisor (§4.F): binds the listening socket, accepts connections,
//! spawns an isolated handler per connection, and owns the shared registry.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::registry::PolicyRegistry;
use crate::server::handle_connection;

/// Runs the accept loop against an already-bound listener until either the
/// listener errors or a ctrl-c signal is received, then stops accepting,
/// drops every outstanding handler task and returns.
///
/// Binding is left to the caller (the binary, or a test harness binding
/// `127.0.0.1:0`) so the bound port is observable before `run` is called.
///
/// # Errors
/// Returns an error if the listener's local address can't be read or
/// `accept` fails.
#[instrument(skip(listener, config))]
pub async fn run(listener: TcpListener, config: Config) -> Result<(), std::io::Error> {
    let registry = Arc::new(PolicyRegistry::new());
    let config = Arc::new(config);
    let mut handlers = JoinSet::new();

    info!("accepting connections on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!("accepted connection from {peer}");

                let registry = registry.clone();
                let config = config.clone();
                handlers.spawn(async move {
                    handle_connection(stream, registry, config).await;
                });
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, closing listener");
                break;
            }
        }
    }

    handlers.shutdown().await;
    warn!("supervisor exited");

    Ok(())
}
