use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deterministic seed for the load schedule (drawn from OS entropy when absent)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Time scale in milliseconds; reserved for scaling configured delays, not applied yet
    #[serde(default = "default_scale_ms")]
    pub scale_ms: u64,
    /// Number of dispatch workers performing first-hop admission
    #[serde(default = "default_dispatch_parallel")]
    pub parallel: usize,
    /// Target dispatch rate; each dispatch worker pauses 1s / rps after every client
    pub rps: u64,
    /// Upper bound on waiting for in-flight clients once generation is over
    #[serde(default)]
    pub drain_timeout_ms: Option<u64>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub load: BTreeMap<String, LoadConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents).context("cannot parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with. Unknown node names in load
    /// paths are allowed: they surface as drops at routing time.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rps == 0 {
            bail!("rps must be greater than 0");
        }
        if self.parallel == 0 {
            bail!("parallel must be greater than 0");
        }
        for (name, service) in &self.services {
            if service.max_client_conn == 0 {
                bail!("service {name}: max_client_conn must be greater than 0");
            }
            if service.parallel == 0 {
                bail!("service {name}: parallel must be greater than 0");
            }
        }
        Ok(())
    }

    /// (load, node) pairs where a load path names a node that is not configured.
    pub fn unknown_targets(&self) -> Vec<(String, String)> {
        let mut unknown = Vec::new();
        for (load_name, load) in &self.load {
            for target in load.request_path.iter().chain(&load.response_path) {
                if !self.services.contains_key(target) {
                    unknown.push((load_name.clone(), target.clone()));
                }
            }
        }
        unknown
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Inbound queue capacity
    #[serde(default = "default_max_client_conn")]
    pub max_client_conn: usize,
    /// Processing time for a request-phase step
    #[serde(default = "default_process_time_ms")]
    pub request_process_time_ms: u64,
    /// Processing time for a response-phase step
    #[serde(default = "default_process_time_ms")]
    pub response_process_time_ms: u64,
    /// Number of workers draining the inbound queue
    #[serde(default = "default_service_parallel")]
    pub parallel: usize,
}

impl ServiceConfig {
    pub fn request_process_time(&self) -> Duration {
        Duration::from_millis(self.request_process_time_ms)
    }

    pub fn response_process_time(&self) -> Duration {
        Duration::from_millis(self.response_process_time_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_client_conn: default_max_client_conn(),
            request_process_time_ms: default_process_time_ms(),
            response_process_time_ms: default_process_time_ms(),
            parallel: default_service_parallel(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Nodes visited as request steps, in order
    #[serde(default)]
    pub request_path: Vec<String>,
    /// Nodes visited as response steps after the request path
    #[serde(default)]
    pub response_path: Vec<String>,
    /// Number of clients generated for this load
    #[serde(default = "default_count")]
    pub count: u64,
}

fn default_scale_ms() -> u64 {
    1000
}

fn default_dispatch_parallel() -> usize {
    1
}

fn default_max_client_conn() -> usize {
    1024
}

fn default_process_time_ms() -> u64 {
    1
}

fn default_service_parallel() -> usize {
    8
}

fn default_count() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config_str = r#"
seed = 42
parallel = 2
rps = 500

[services.gateway]
max_client_conn = 16
request_process_time_ms = 5
parallel = 4

[services.auth]

[load.login]
request_path = ["gateway", "auth"]
response_path = ["gateway"]
count = 10
        "#;

        let config = Config::from_toml(config_str).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.parallel, 2);
        assert_eq!(config.rps, 500);
        assert_eq!(config.scale_ms, 1000);
        assert_eq!(config.drain_timeout(), None);

        let gateway = &config.services["gateway"];
        assert_eq!(gateway.max_client_conn, 16);
        assert_eq!(gateway.request_process_time(), Duration::from_millis(5));
        assert_eq!(gateway.response_process_time(), Duration::from_millis(1));
        assert_eq!(gateway.parallel, 4);

        let login = &config.load["login"];
        assert_eq!(login.request_path, vec!["gateway", "auth"]);
        assert_eq!(login.response_path, vec!["gateway"]);
        assert_eq!(login.count, 10);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("rps = 10\n[services.a]\n[load.x]\n").unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(config.parallel, 1);

        let a = &config.services["a"];
        assert_eq!(a.max_client_conn, 1024);
        assert_eq!(a.request_process_time_ms, 1);
        assert_eq!(a.response_process_time_ms, 1);
        assert_eq!(a.parallel, 8);

        let x = &config.load["x"];
        assert_eq!(x.count, 1);
        assert!(x.request_path.is_empty());
        assert!(x.response_path.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        assert!(Config::from_toml("rps = 0").is_err());
        assert!(Config::from_toml("rps = 1\nparallel = 0").is_err());
        assert!(Config::from_toml("rps = 1\n[services.a]\nmax_client_conn = 0").is_err());
        assert!(Config::from_toml("rps = 1\n[services.a]\nparallel = 0").is_err());
        assert!(Config::from_toml("parallel = 1").is_err(), "rps is required");
    }

    #[test]
    fn test_unknown_targets() {
        let config = Config::from_toml(
            r#"
rps = 1
[services.a]
[load.x]
request_path = ["a", "ghost"]
response_path = ["a"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.unknown_targets(),
            vec![("x".to_string(), "ghost".to_string())]
        );
    }
}
