//! # Runtime configuration.
//!
//! Two in-memory configs drive the runtime:
//! - [`TunnelConfig`]: what every launched tunnel core is told (pool size, region,
//!   protocols, quota) plus the shared [`CredentialRotator`];
//! - [`SupervisorConfig`]: which endpoints to run and how the runtime behaves
//!   (data directory, grace, backoff, verbosity).
//!
//! [`Settings`] is the TOML file shape both are loaded from:
//!
//! ```toml
//! [supervisor]
//! listen_ports = [1080, 1081]
//! upstream_proxy_port = 8080
//! verbose = true
//!
//! [supervisor.backoff]
//! delay_secs = 3.0
//!
//! [tunnel]
//! tunnel = 1
//! region = "sg"
//! quota_limit_mb = 500
//! authorizations = ["token-a", "token-b"]
//! ```
//!
//! ## Sentinel values
//! - `quota_limit_mb = 0` → unlimited
//! - `upstream_proxy_port` absent → no upstream proxy in the launch plan
//! - `datastore_template` empty → no datastore seeding

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::CredentialRotator;
use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, QuotaPolicy};

/// Parameters handed to every tunnel launch.
///
/// Cloning is cheap and clones share the same credential queue.
#[derive(Clone, Debug)]
pub struct TunnelConfig {
    /// Tunnel core executable; looked up in the current directory first, then `PATH`.
    pub core_name: String,
    /// Desired concurrent tunnels per endpoint.
    pub tunnel: usize,
    /// Egress region code (uppercased in the launch plan; empty = any).
    pub region: String,
    /// Allowed tunnel protocols.
    pub protocols: Vec<String>,
    /// Connection worker pool size.
    pub tunnel_workers: usize,
    /// Per-endpoint quota.
    pub quota: QuotaPolicy,
    /// Authorization tokens shared by every endpoint using this config.
    pub credentials: Arc<CredentialRotator>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        TunnelSettings::default().into_config()
    }
}

/// Runtime settings for the supervisor.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Local SOCKS ports; one endpoint actor per port.
    pub listen_ports: Vec<u16>,
    /// Local HTTP proxy the tunnel core should dial through; `None` omits it from the plan.
    pub upstream_proxy_port: Option<u16>,
    /// Root of per-endpoint data directories (`<data_dir>/data/<port>`).
    pub data_dir: PathBuf,
    /// Template datastore copied into endpoints that have none.
    pub datastore_template: Option<PathBuf>,
    /// Surface reconnect reasons and raw notice text.
    pub verbose: bool,
    /// How long to wait for endpoints after a stop before giving up.
    pub grace: Duration,
    /// Event bus capacity.
    pub bus_capacity: usize,
    /// Delay between a process exit and the next launch.
    pub backoff: BackoffPolicy,
    /// How long to let the reader drain after the process exited.
    pub reader_join_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            listen_ports: Vec::new(),
            upstream_proxy_port: None,
            data_dir: default_data_dir(),
            datastore_template: Some(PathBuf::from(DEFAULT_DATASTORE_TEMPLATE)),
            verbose: false,
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            backoff: BackoffPolicy::default(),
            reader_join_timeout: Duration::from_secs(1),
        }
    }
}

const DEFAULT_DATASTORE_TEMPLATE: &str = "storage/psiphon/database/psiphon.boltdb";

/// `<config dir>/tunnelvisor/psiphon`, falling back to the temp dir.
pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tunnelvisor")
        .join("psiphon")
}

/// TOML file shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub supervisor: SupervisorSettings,
    pub tunnel: TunnelSettings,
}

/// `[supervisor]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub listen_ports: Vec<u16>,
    pub upstream_proxy_port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub datastore_template: PathBuf,
    pub verbose: bool,
    pub grace_secs: u64,
    pub bus_capacity: usize,
    pub backoff: BackoffSettings,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            listen_ports: Vec::new(),
            upstream_proxy_port: None,
            data_dir: None,
            datastore_template: PathBuf::from(DEFAULT_DATASTORE_TEMPLATE),
            verbose: false,
            grace_secs: 10,
            bus_capacity: 1024,
            backoff: BackoffSettings::default(),
        }
    }
}

/// `[supervisor.backoff]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub delay_secs: f64,
    /// Upper bound for growing delays; unset means `delay_secs`.
    pub max_secs: Option<f64>,
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            delay_secs: 3.0,
            max_secs: None,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

/// `[tunnel]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    pub core_name: String,
    pub tunnel: usize,
    pub region: String,
    pub protocols: Vec<String>,
    pub tunnel_workers: usize,
    pub quota_limit_mb: u64,
    pub authorizations: Vec<String>,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            core_name: "psiphon-tunnel-core".to_string(),
            tunnel: 10,
            region: String::new(),
            protocols: vec![
                "FRONTED-MEEK-HTTP-OSSH".to_string(),
                "FRONTED-MEEK-OSSH".to_string(),
            ],
            tunnel_workers: 200,
            quota_limit_mb: 0,
            authorizations: Vec::new(),
        }
    }
}

impl TunnelSettings {
    /// Builds the runtime config; the credential queue is created here, once.
    pub fn into_config(self) -> TunnelConfig {
        TunnelConfig {
            core_name: self.core_name,
            tunnel: self.tunnel,
            region: self.region,
            protocols: self.protocols,
            tunnel_workers: self.tunnel_workers,
            quota: QuotaPolicy::new(self.quota_limit_mb),
            credentials: Arc::new(CredentialRotator::new(self.authorizations)),
        }
    }
}

impl BackoffSettings {
    /// `(first, max)` as durations; `max` never drops below `first`.
    fn delay_range(&self) -> Result<(Duration, Duration), ConfigError> {
        let secs = |v: f64| {
            Duration::try_from_secs_f64(v)
                .map_err(|_| ConfigError::Invalid(format!("backoff of {v} seconds is out of range")))
        };
        let first = secs(self.delay_secs)?;
        let max = match self.max_secs {
            Some(v) => secs(v)?.max(first),
            None => first,
        };
        Ok((first, max))
    }

    fn to_policy(&self) -> Result<BackoffPolicy, ConfigError> {
        let (first, max) = self.delay_range()?;
        Ok(BackoffPolicy {
            first,
            max,
            factor: self.factor,
            jitter: self.jitter,
        })
    }
}

impl Settings {
    /// Reads and parses a TOML settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the settings can drive a supervisor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ports = &self.supervisor.listen_ports;
        if ports.is_empty() {
            return Err(ConfigError::Invalid("no listen ports configured".into()));
        }
        if let Some(dup) = ports
            .iter()
            .enumerate()
            .find_map(|(i, p)| ports[..i].contains(p).then_some(*p))
        {
            return Err(ConfigError::Invalid(format!("listen port {dup} repeated")));
        }
        if self.tunnel.tunnel == 0 {
            return Err(ConfigError::Invalid("tunnel must be at least 1".into()));
        }
        let b = &self.supervisor.backoff;
        let usable = |v: f64| v.is_finite() && v >= 0.0;
        if !usable(b.delay_secs) || !b.max_secs.is_none_or(usable) || !usable(b.factor) {
            return Err(ConfigError::Invalid(
                "backoff values must be finite and non-negative".into(),
            ));
        }
        b.delay_range()?;
        Ok(())
    }

    /// Validates and splits into runtime configs.
    pub fn into_configs(self) -> Result<(SupervisorConfig, TunnelConfig), ConfigError> {
        self.validate()?;
        let s = self.supervisor;
        let template = (!s.datastore_template.as_os_str().is_empty()).then_some(s.datastore_template);

        let supervisor = SupervisorConfig {
            listen_ports: s.listen_ports,
            upstream_proxy_port: s.upstream_proxy_port,
            data_dir: s.data_dir.unwrap_or_else(default_data_dir),
            datastore_template: template,
            verbose: s.verbose,
            grace: Duration::from_secs(s.grace_secs),
            bus_capacity: s.bus_capacity,
            backoff: s.backoff.to_policy()?,
            ..SupervisorConfig::default()
        };
        Ok((supervisor, self.tunnel.into_config()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tunnel_core_expectations() {
        let cfg = TunnelConfig::default();
        assert_eq!(cfg.core_name, "psiphon-tunnel-core");
        assert_eq!(cfg.tunnel, 10);
        assert_eq!(cfg.tunnel_workers, 200);
        assert!(cfg.quota.is_unlimited());
        assert!(cfg.credentials.is_empty());
        assert_eq!(
            cfg.protocols,
            vec!["FRONTED-MEEK-HTTP-OSSH", "FRONTED-MEEK-OSSH"]
        );
    }

    #[test]
    fn test_parse_full_file() {
        let raw = r#"
            [supervisor]
            listen_ports = [1080, 1081]
            upstream_proxy_port = 8080
            verbose = true
            grace_secs = 4

            [supervisor.backoff]
            delay_secs = 2.5
            jitter = "equal"

            [tunnel]
            tunnel = 1
            region = "sg"
            quota_limit_mb = 500
            authorizations = ["a", "b"]
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();
        let (sup, tun) = settings.into_configs().unwrap();

        assert_eq!(sup.listen_ports, vec![1080, 1081]);
        assert_eq!(sup.upstream_proxy_port, Some(8080));
        assert!(sup.verbose);
        assert_eq!(sup.grace, Duration::from_secs(4));
        assert_eq!(sup.backoff.first, Duration::from_millis(2500));
        assert_eq!(sup.backoff.max, Duration::from_millis(2500));
        assert_eq!(sup.backoff.jitter, JitterPolicy::Equal);

        assert_eq!(tun.tunnel, 1);
        assert_eq!(tun.region, "sg");
        assert_eq!(tun.quota, QuotaPolicy::new(500));
        assert_eq!(tun.credentials.next(), vec!["a"]);
        // Untouched keys keep their defaults.
        assert_eq!(tun.tunnel_workers, 200);
    }

    #[test]
    fn test_validation_errors() {
        let mut settings = Settings::default();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        settings.supervisor.listen_ports = vec![1080, 1080];
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("1080"));

        settings.supervisor.listen_ports = vec![1080];
        settings.tunnel.tunnel = 0;
        assert!(settings.validate().is_err());

        settings.tunnel.tunnel = 1;
        settings.supervisor.backoff.delay_secs = f64::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_explicit_backoff_max() {
        let mut settings = Settings::default();
        settings.supervisor.listen_ports = vec![1080];
        settings.supervisor.backoff.delay_secs = 1.0;
        settings.supervisor.backoff.max_secs = Some(30.0);
        settings.supervisor.backoff.factor = 2.0;

        let (sup, _) = settings.into_configs().unwrap();
        assert_eq!(sup.backoff.first, Duration::from_secs(1));
        assert_eq!(sup.backoff.max, Duration::from_secs(30));
    }

    #[test]
    fn test_huge_backoff_is_rejected_not_panicking() {
        let mut settings = Settings::default();
        settings.supervisor.listen_ports = vec![1080];
        settings.supervisor.backoff.delay_secs = 1e30;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(settings.clone().into_configs(), Err(ConfigError::Invalid(_))));

        settings.supervisor.backoff.delay_secs = 3.0;
        settings.supervisor.backoff.max_secs = Some(f64::MAX);
        assert!(matches!(settings.into_configs(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert_eq!(err.as_label(), "config_read");
    }

    #[test]
    fn test_cloned_config_shares_credentials() {
        let mut settings = TunnelSettings::default();
        settings.authorizations = vec!["x".into(), "y".into()];
        let a = settings.into_config();
        let b = a.clone();
        assert_eq!(a.credentials.next(), vec!["x"]);
        assert_eq!(b.credentials.next(), vec!["y"]);
    }
}
