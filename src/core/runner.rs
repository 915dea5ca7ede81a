//! # One launch of an endpoint's tunnel core.
//!
//! ```text
//! run_once()
//!   ├─ ledger.reset_endpoint(port)
//!   ├─ credentials.next()                  → LaunchStarting
//!   ├─ LaunchPlan::write()
//!   ├─ launcher.launch()                   → ProcessSpawned
//!   ├─ spawn reader (child token) ───────► ReaderContext::run()
//!   ├─ await exit                               (Running → Draining)
//!   └─ join reader (bounded), cancel if still reading
//! ```
//!
//! ## Rules
//! - The process is never killed here; `exit` is awaited until it resolves
//! - Once the reader is done (drain or stop) its end of the diagnostic pipe is
//!   closed, so the core usually exits on its next diagnostic write
//! - The reader never outlives the launch that spawned it
//! - Errors before spawn are returned; the actor decides whether they are fatal

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::actor::EndpointActor;
use crate::core::reader::{LaunchState, ReaderContext, ReaderExit};
use crate::error::LaunchError;
use crate::events::{Event, EventKind};
use crate::launch::{LaunchPlan, LaunchRequest, ProcessExit, endpoint_dir};

/// How one launch ended.
#[derive(Debug)]
pub(crate) struct LaunchOutcome {
    pub exit: Result<ProcessExit, LaunchError>,
    pub reader: ReaderExit,
    /// Drain reason recorded by the reader.
    pub drain: Option<String>,
    /// The desired tunnel count was reached during this launch.
    pub fully_connected: bool,
}

impl LaunchOutcome {
    /// Reconnect reason for logs: the drain reason wins over the exit status.
    pub fn reason(&self) -> String {
        if let Some(drain) = &self.drain {
            return drain.clone();
        }
        match &self.exit {
            Ok(exit) => exit.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

/// Runs one launch of `actor`'s endpoint until the process exits.
pub(crate) async fn run_once(
    actor: &EndpointActor,
    attempt: u32,
    parent: &CancellationToken,
) -> Result<LaunchOutcome, LaunchError> {
    let port = actor.port;
    actor.ledger.reset_endpoint(port);
    let authorizations = actor.tunnel.credentials.next();

    actor.bus.publish(
        Event::new(EventKind::LaunchStarting)
            .with_port(port)
            .with_attempt(attempt)
            .with_credentials(authorizations.len()),
    );

    let dir = endpoint_dir(&actor.params.data_dir, port);
    let plan = LaunchPlan::new(
        port,
        &dir,
        &actor.tunnel,
        actor.params.upstream_proxy_port,
        authorizations,
    );
    let config_path = plan.write().await?;

    let launched = actor
        .launcher
        .launch(&LaunchRequest {
            port,
            program: actor.tunnel.core_name.clone(),
            config_path,
            working_dir: dir,
        })
        .await?;
    actor.bus.publish(
        Event::new(EventKind::ProcessSpawned)
            .with_port(port)
            .with_attempt(attempt),
    );

    let state = Arc::new(Mutex::new(LaunchState::default()));
    let reader_token = parent.child_token();
    let reader = ReaderContext {
        port,
        desired: actor.tunnel.tunnel,
        quota: actor.tunnel.quota,
        ledger: Arc::clone(&actor.ledger),
        registry: Arc::clone(&actor.registry),
        bus: actor.bus.clone(),
        state: Arc::clone(&state),
    };
    let handle = tokio::spawn(reader.run(launched.diagnostics, reader_token.clone()));

    let exit = launched.exit.await;
    let reader = join_reader(handle, &reader_token, actor.params.reader_join_timeout).await;

    let state = state.lock();
    Ok(LaunchOutcome {
        exit,
        reader,
        drain: state.drain.clone(),
        fully_connected: state.registered,
    })
}

/// Gives the reader `timeout` to finish the stream, then cancels it.
async fn join_reader(
    mut handle: JoinHandle<ReaderExit>,
    token: &CancellationToken,
    timeout: Duration,
) -> ReaderExit {
    let joined = match time::timeout(timeout, &mut handle).await {
        Ok(joined) => joined,
        Err(_elapsed) => {
            token.cancel();
            handle.await
        }
    };
    joined.unwrap_or_else(|e| ReaderExit::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{Script, ScriptedLauncher};

    const ACTIVE: &str = r#"{"noticeType":"ActiveTunnel","data":{"diagnosticID":"t1"}}"#;
    const FATAL: &str = r#"{"noticeType":"Warning","data":{"message":"tunnel failed: reset"}}"#;

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_natural_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(vec![Ok(Script::exits_after(
            &[ACTIVE, FATAL],
            Duration::from_secs(2),
        ))]));
        let actor = EndpointActor::for_tests(1080, tmp.path(), launcher.clone());

        let started = time::Instant::now();
        let outcome = run_once(&actor, 1, &CancellationToken::new()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(outcome.reader, ReaderExit::Drained);
        assert!(outcome.fully_connected);
        assert_eq!(outcome.reason(), FATAL);
        assert_eq!(outcome.exit.unwrap().code, Some(1));
        assert!(tmp.path().join("data/1080/config.json").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_reason_without_drain() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(vec![Ok(Script::exits_after(
            &[],
            Duration::from_millis(10),
        ))]));
        let actor = EndpointActor::for_tests(1080, tmp.path(), launcher);

        let outcome = run_once(&actor, 1, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.reader, ReaderExit::Eof);
        assert!(!outcome.fully_connected);
        assert_eq!(outcome.reason(), "exit status: 1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_reader_but_not_process() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(vec![Ok(Script::exits_after(
            &[ACTIVE],
            Duration::from_secs(5),
        ))]));
        let actor = EndpointActor::for_tests(1080, tmp.path(), launcher);
        let token = CancellationToken::new();

        let stopper = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            stopper.cancel();
        });

        let started = time::Instant::now();
        let outcome = run_once(&actor, 1, &token).await.unwrap();
        assert_eq!(outcome.reader, ReaderExit::Cancelled);
        // Exit is still awaited after the stop.
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_error_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(vec![Err(LaunchError::Setup {
            reason: "no pipe".into(),
        })]));
        let actor = EndpointActor::for_tests(1080, tmp.path(), launcher);

        let err = run_once(&actor, 1, &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
