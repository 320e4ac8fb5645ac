//! OS signal handling.

use tokio::sync::broadcast;

use crate::lifecycle::Shutdown;

/// Install the signal task. SIGTERM and SIGINT trigger shutdown;
/// SIGHUP asks the dyncfg controller to re-announce its state.
///
/// Returns the reload sender so interested tasks can subscribe.
pub fn install(shutdown: Shutdown) -> broadcast::Sender<()> {
    let (reload_tx, _) = broadcast::channel(1);
    let reload = reload_tx.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGHUP handler");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("SIGINT received, shutting down");
                        shutdown.trigger();
                        return;
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("SIGTERM received, shutting down");
                        shutdown.trigger();
                        return;
                    }
                    _ = sighup.recv() => {
                        tracing::info!("SIGHUP received, reloading");
                        let _ = reload.send(());
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
            shutdown.trigger();
        }
    });

    reload_tx
}
