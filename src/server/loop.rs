// Server loop module
// Accept loop with graceful shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// How long to wait for in-flight connections after a shutdown signal
const DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Accept connections until a shutdown signal arrives, then drain.
///
/// Each accepted connection runs as its own local task; the loop itself
/// only accepts and dispatches. On shutdown the listener closes first so
/// no new connections arrive while the in-flight ones finish.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown_requested();
                break;
            }
        }
    }

    // Stop accepting, then give in-flight requests a bounded window
    drop(listener);
    drain_connections(&active_connections).await;
    logger::log_shutdown_complete();

    Ok(())
}

/// Wait for active connections to finish, bounded by `DRAIN_TIMEOUT_MS`
async fn drain_connections(active_connections: &Arc<AtomicUsize>) {
    let deadline =
        tokio::time::Instant::now() + std::time::Duration::from_millis(DRAIN_TIMEOUT_MS);

    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            let remaining = active_connections.load(Ordering::SeqCst);
            logger::log_warning(&format!(
                "Shutdown drain timed out with {remaining} connections still active"
            ));
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
