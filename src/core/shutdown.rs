//! OS stop signals.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`, `SIGHUP`. Elsewhere: Ctrl-C only.

/// Completes on the first stop signal and returns its name.
#[cfg(unix)]
pub(crate) async fn wait_for_stop_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
        _ = sighup.recv() => "SIGHUP",
    };
    Ok(name)
}

/// Completes on the first stop signal and returns its name.
#[cfg(not(unix))]
pub(crate) async fn wait_for_stop_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
