// Signal handling for graceful server shutdown

use crate::error::{Result, SleuthError};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Signal handler for the shutdown signals the server honors
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    /// Sets up handlers for SIGTERM, SIGINT and SIGHUP
    pub fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate()).map_err(|e| SleuthError::Io {
            source: e,
            context: "Failed to setup SIGTERM handler".to_string(),
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|e| SleuthError::Io {
            source: e,
            context: "Failed to setup SIGINT handler".to_string(),
        })?;
        let sighup = signal(SignalKind::hangup()).map_err(|e| SleuthError::Io {
            source: e,
            context: "Failed to setup SIGHUP handler".to_string(),
        })?;

        Ok(Self {
            sigterm,
            sigint,
            sighup,
        })
    }

    /// Wait for any signal; returns which one arrived
    pub async fn wait(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                "terminate"
            }
            _ = self.sigint.recv() => {
                tracing::info!("Received SIGINT");
                "interrupt"
            }
            _ = self.sighup.recv() => {
                tracing::info!("Received SIGHUP");
                "hangup"
            }
        }
    }
}

/// Resolves once any handled signal arrives; every one of them means shut down
pub async fn shutdown_signal(mut handler: SignalHandler) {
    let sig = handler.wait().await;
    tracing::info!(signal = sig, "Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handler_installs() {
        assert!(SignalHandler::new().is_ok());
    }

    #[tokio::test]
    async fn test_hangup_resolves_shutdown() {
        let handler = SignalHandler::new().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown_signal(handler))
            .await
            .expect("shutdown signal did not resolve");
    }
}
