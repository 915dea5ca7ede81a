//! Error types used by the tunnelvisor runtime and tunnel launches.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: errors raised by the supervision runtime itself.
//! - [`LaunchError`]: errors raised while launching or running one tunnel process.
//! - [`ConfigError`]: errors raised while loading or validating settings.
//!
//! All of them provide `as_label` for logs; [`LaunchError::is_fatal`] separates
//! setup faults (endpoint supervision ends) from process faults (retried after backoff).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the tunnelvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some endpoints were still running.
    #[error("shutdown timeout {grace:?} exceeded; still running: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Endpoint ports that did not stop in time.
        stuck: Vec<u16>,
    },

    /// One or more endpoints aborted on an unrecoverable setup fault.
    #[error("endpoint supervision aborted for ports {ports:?}")]
    EndpointsFailed {
        /// Ports whose actor exited with a setup fault.
        ports: Vec<u16>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tunnelvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::EndpointsFailed { .. } => "runtime_endpoints_failed",
        }
    }
}

/// # Errors produced while launching a tunnel process.
///
/// Only [`LaunchError::Setup`] is fatal for an endpoint; everything else is a
/// process fault that feeds the backoff and relaunch cycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The diagnostic pipe of the spawned process could not be obtained.
    #[error("setup fault (no retry): {reason}")]
    Setup {
        /// What could not be set up.
        reason: String,
    },

    /// The tunnel executable could not be spawned.
    #[error("spawn failed for {program}: {source}")]
    Spawn {
        /// Program that was spawned.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The launch plan could not be written.
    #[error("failed to write launch plan {path}: {source}")]
    Plan {
        /// Target plan path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the tunnel process failed.
    #[error("process i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tunnelvisor::LaunchError;
    ///
    /// let err = LaunchError::Setup { reason: "stderr".into() };
    /// assert_eq!(err.as_label(), "launch_setup");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Setup { .. } => "launch_setup",
            LaunchError::Spawn { .. } => "launch_spawn",
            LaunchError::Plan { .. } => "launch_plan",
            LaunchError::Io(_) => "launch_io",
        }
    }

    /// Indicates whether the error must end supervision of the endpoint.
    ///
    /// # Example
    /// ```
    /// use tunnelvisor::LaunchError;
    ///
    /// assert!(LaunchError::Setup { reason: "stderr".into() }.is_fatal());
    /// assert!(!LaunchError::Io(std::io::Error::other("boom")).is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaunchError::Setup { .. })
    }
}

/// # Errors produced while loading settings.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML for the expected shape.
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Settings parsed but are not usable.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::Invalid(_) => "config_invalid",
        }
    }
}
