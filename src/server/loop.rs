// Server loop module
// Accepts connections until shutdown, then drains them within a grace period

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

/// Run the accept loop on `listener` until `signals` requests shutdown.
///
/// Must be polled inside a `LocalSet`; connections are spawned locally.
#[allow(clippy::ignored_unit_patterns)]
pub async fn run_server(listener: TcpListener, state: Arc<AppState>, signals: Arc<SignalHandler>) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &graceful,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            _ = signals.wait() => break,
        }
    }

    // Stop accepting before draining
    drop(listener);
    let open = active_connections.load(Ordering::SeqCst);
    logger::log_info(&format!("[Shutdown] Waiting for {open} open connection(s)"));

    let grace = Duration::from_secs(state.config.performance.shutdown_timeout);
    match tokio::time::timeout(grace, graceful.shutdown()).await {
        Ok(()) => logger::log_server_stop(0),
        Err(_) => logger::log_server_stop(active_connections.load(Ordering::SeqCst)),
    }
}
