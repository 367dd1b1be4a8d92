//! Process signal wiring.
//!
//! `SIGINT` and `SIGTERM` cancel the root token. `SIGHUP` tells a
//! pending session handshake that the TAN was approved on the device.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::auth::TanConfirmation;

/// Listen for signals until `shutdown` is cancelled.
///
/// Signal handlers are registered before this returns, so a signal sent
/// right after the call is not lost.
#[cfg(unix)]
pub fn spawn_signal_listener(
    shutdown: CancellationToken,
    confirmation: TanConfirmation,
) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interrupt.recv() => {
                    info!(signal = "SIGINT", "shutdown requested");
                    break;
                }
                _ = terminate.recv() => {
                    info!(signal = "SIGTERM", "shutdown requested");
                    break;
                }
                _ = hangup.recv() => {
                    info!(signal = "SIGHUP", "TAN confirmation received");
                    confirmation.confirm();
                }
            }
        }
        shutdown.cancel();
    }))
}

/// Listen for Ctrl-C until `shutdown` is cancelled.
///
/// There is no confirmation signal here; confirm through
/// [`TanConfirmation::confirm`] instead.
#[cfg(not(unix))]
pub fn spawn_signal_listener(
    shutdown: CancellationToken,
    _confirmation: TanConfirmation,
) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!(signal = "ctrl-c", "shutdown requested");
                }
            }
        }
        shutdown.cancel();
    }))
}

/// Wait for a listener started by [`spawn_signal_listener`] to finish.
///
/// Returns `false` if the listener panicked or was aborted; the failure
/// is logged.
pub async fn join_listener(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, panicked = err.is_panic(), "signal listener failed");
            false
        }
    }
}
