//! # Launcher: the seam between supervision and the tunnel core process.
//!
//! A launch yields two halves that the runner drives concurrently:
//! - `diagnostics`: the process's diagnostic stream (stderr), one notice per line;
//! - `exit`: a future resolving when the process exits on its own.
//!
//! Neither half kills the process. Dropping `exit` does (via `kill_on_drop`), which
//! only happens when the whole endpoint task is torn down.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::process::Command;

use crate::error::LaunchError;

/// Line-oriented diagnostic stream of a launched process.
pub type DiagnosticStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Resolves when the launched process exits.
pub type ExitFuture = BoxFuture<'static, Result<ProcessExit, LaunchError>>;

/// What to launch for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Endpoint (local SOCKS port).
    pub port: u16,
    /// Executable name or path.
    pub program: String,
    /// Launch plan passed via `-config`.
    pub config_path: PathBuf,
    /// Working directory of the child.
    pub working_dir: PathBuf,
}

/// A running tunnel core.
pub struct Launched {
    pub diagnostics: DiagnosticStream,
    pub exit: ExitFuture,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    /// Zero exit code.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status: {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Starts tunnel core processes.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Starts one process for `req`.
    ///
    /// [`LaunchError::Setup`] means the endpoint cannot be supervised at all;
    /// every other error is retried after backoff.
    async fn launch(&self, req: &LaunchRequest) -> Result<Launched, LaunchError>;
}

/// Spawns the tunnel core with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, req: &LaunchRequest) -> Result<Launched, LaunchError> {
        let program = resolve_executable(&req.program);
        let mut child = Command::new(&program)
            .arg("-config")
            .arg(&req.config_path)
            .current_dir(&req.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stderr = child.stderr.take().ok_or_else(|| LaunchError::Setup {
            reason: "diagnostic pipe unavailable".to_string(),
        })?;

        Ok(Launched {
            diagnostics: Box::new(BufReader::new(stderr)),
            exit: Box::pin(async move {
                let status = child.wait().await?;
                Ok(ProcessExit::from(status))
            }),
        })
    }
}

/// The child runs inside the endpoint directory, so a relative program path
/// (bare names included) that exists under the current directory is made
/// absolute first. Anything else is left for `PATH` lookup.
fn resolve_executable(name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) if cwd.join(path).is_file() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}
