//! Scripted launcher for runtime tests: canned diagnostic lines and a timed exit.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::time::Instant;

use crate::error::LaunchError;
use crate::launch::{LaunchRequest, Launched, Launcher, ProcessExit};

/// One simulated tunnel core run.
pub(crate) struct Script {
    lines: Vec<String>,
    exit_after: Option<Duration>,
    code: i32,
}

impl Script {
    /// Emits `lines`, then exits with code 1 after `exit_after`.
    pub fn exits_after(lines: &[&str], exit_after: Duration) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit_after: Some(exit_after),
            code: 1,
        }
    }

    /// Emits `lines` and never exits.
    pub fn runs_forever(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit_after: None,
            code: 0,
        }
    }
}

/// A recorded launch.
#[derive(Debug, Clone)]
pub(crate) struct LaunchRecord {
    pub port: u16,
    pub at: Instant,
    pub authorizations: Vec<String>,
}

/// Plays back scripts in order; once exhausted every launch runs forever.
#[derive(Default)]
pub(crate) struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Result<Script, LaunchError>>>,
    launches: Mutex<Vec<LaunchRecord>>,
}

impl ScriptedLauncher {
    pub fn new(scripts: Vec<Result<Script, LaunchError>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.launches.lock().len()
    }

    /// Polls until at least `n` launches happened.
    pub async fn wait_for(&self, n: usize) {
        while self.count() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, req: &LaunchRequest) -> Result<Launched, LaunchError> {
        let plan: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&req.config_path).await?)
            .map_err(std::io::Error::from)?;
        let authorizations = plan["Authorizations"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        self.launches.lock().push(LaunchRecord {
            port: req.port,
            at: Instant::now(),
            authorizations,
        });

        let next = self.scripts.lock().pop_front();
        let script = match next {
            Some(script) => script?,
            None => Script::runs_forever(&[]),
        };

        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        for line in &script.lines {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }

        Ok(Launched {
            diagnostics: Box::new(BufReader::new(reader)),
            exit: Box::pin(async move {
                // The stream closes when the simulated process exits.
                let _writer = writer;
                match script.exit_after {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
                Ok(ProcessExit {
                    code: Some(script.code),
                })
            }),
        })
    }
}
