use {anyhow::Result, derive_more::Display, tokio::signal::ctrl_c};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    #[display("SIGINT")]
    Sigint,
    #[display("SIGTERM")]
    Sigterm,
}

/// Resolves when the process is asked to stop.
pub async fn shutdown_signal() -> Result<ShutdownSignal> {
    #[cfg(target_family = "unix")]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c() => result.map(|()| ShutdownSignal::Sigint).map_err(Into::into),
            _ = sigterm.recv() => Ok(ShutdownSignal::Sigterm),
        }
    }

    #[cfg(not(target_family = "unix"))]
    {
        ctrl_c().await?;
        Ok(ShutdownSignal::Sigint)
    }
}
