//! Core configuration types and loading.

use super::env::resolve_env_vars;
use super::secret::SecretString;
use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/podrelay/config.yaml";

/// Main configuration structure for podrelay.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Telegram delivery settings.
    pub telegram: TelegramConfig,
    /// Relay engine tunables (rate, queue, backoff, shutdown).
    #[serde(default)]
    pub relay: RelayConfig,
    /// Kubernetes connection and target selection.
    pub kube: KubeConfig,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Telegram delivery configuration.
#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Supports `${VAR}` substitution; never logged.
    pub token: SecretString,
    /// Destination chat id.
    pub chat: i64,
    /// Optional container name -> forum topic (message thread) routing.
    /// Containers not listed here go to the main chat.
    #[serde(default)]
    pub topics: HashMap<String, i64>,
}

/// Relay engine tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum messages dispatched to Telegram per minute.
    pub rate_per_minute: u32,
    /// Delivery queue capacity; producers block when it is full.
    pub queue_capacity: usize,
    /// Fixed delay between reconnect attempts of a failed log stream.
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    /// Delay between consecutive worker launches at startup.
    #[serde(with = "humantime_serde")]
    pub stagger_delay: Duration,
    /// Grace window after a shutdown signal before the process is forced out.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: 20,
            queue_capacity: crate::notify::DEFAULT_QUEUE_CAPACITY,
            reconnect_delay: Duration::from_secs(3),
            stagger_delay: Duration::from_millis(600),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    /// Minimum interval between two dispatched messages.
    pub fn dispatch_period(&self) -> Duration {
        Duration::from_secs(60) / self.rate_per_minute.max(1)
    }
}

/// Kubernetes connection and target selection.
#[derive(Debug, Deserialize)]
pub struct KubeConfig {
    /// Optional kubeconfig path. Falls back to the standard resolution
    /// (KUBECONFIG env var, then in-cluster) when unset.
    #[serde(default)]
    pub config: Option<String>,
    /// Namespace the targets live in.
    pub namespace: String,
    /// Pod name patterns and the containers to tail in each match.
    pub target: Vec<TargetConfig>,
    /// Line filters: a line is relayed only if at least one pattern matches.
    /// An empty list forwards every line.
    #[serde(default)]
    pub filter: Vec<String>,
    /// Ordered rewrite rules applied to every relayed line.
    #[serde(default)]
    pub replacements: Vec<ReplacementConfig>,
}

/// One monitored target: a pod name pattern plus its containers.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Regex matched against pod names.
    pub pod: String,
    /// Container names to tail in every matched pod.
    pub container: Vec<String>,
}

/// One ordered rewrite rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplacementConfig {
    /// Regex to search for.
    pub target: String,
    /// Replacement text; `$1`-style capture references are expanded.
    pub replacement: String,
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to start the Prometheus exposition server.
    pub enabled: bool,
    /// Port the exposition server binds to.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and resolve `${VAR}` references.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadError` if the file cannot be read or parsed,
    /// or `ConfigError::ValidationError` for undefined environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;

        config.resolve_env()?;
        Ok(config)
    }

    /// Resolve `${VAR}` references in every string-valued field.
    fn resolve_env(&mut self) -> Result<(), ConfigError> {
        self.telegram.token =
            SecretString::new(resolve_env_vars(self.telegram.token.expose())?);

        if let Some(ref path) = self.kube.config {
            self.kube.config = Some(resolve_env_vars(path)?);
        }
        self.kube.namespace = resolve_env_vars(&self.kube.namespace)?;

        for target in &mut self.kube.target {
            target.pod = resolve_env_vars(&target.pod)?;
            for container in &mut target.container {
                *container = resolve_env_vars(container)?;
            }
        }
        for filter in &mut self.kube.filter {
            *filter = resolve_env_vars(filter)?;
        }
        for replacement in &mut self.kube.replacements {
            replacement.target = resolve_env_vars(&replacement.target)?;
            replacement.replacement = resolve_env_vars(&replacement.replacement)?;
        }

        Ok(())
    }

    /// Validate the configuration, collecting all errors.
    ///
    /// Fail-fast policy: every malformed pattern and missing value is
    /// reported in one pass before anything connects to the cluster.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.telegram.token.expose().is_empty() {
            errors.push(ConfigError::ValidationError(
                "telegram.token must not be empty".to_string(),
            ));
        }
        if self.telegram.chat == 0 {
            errors.push(ConfigError::ValidationError(
                "telegram.chat must be set".to_string(),
            ));
        }

        if self.relay.rate_per_minute == 0 {
            errors.push(ConfigError::ValidationError(
                "relay.rate_per_minute must be at least 1".to_string(),
            ));
        }
        if self.relay.queue_capacity == 0 {
            errors.push(ConfigError::ValidationError(
                "relay.queue_capacity must be at least 1".to_string(),
            ));
        }

        if self.kube.namespace.is_empty() {
            errors.push(ConfigError::ValidationError(
                "kube.namespace must not be empty".to_string(),
            ));
        }
        if self.kube.target.is_empty() {
            errors.push(ConfigError::ValidationError(
                "kube.target must list at least one target".to_string(),
            ));
        }

        for (i, target) in self.kube.target.iter().enumerate() {
            if let Err(e) = Regex::new(&target.pod) {
                errors.push(ConfigError::InvalidRegex {
                    field: format!("kube.target[{i}].pod"),
                    message: e.to_string(),
                });
            }
            if target.container.is_empty() {
                errors.push(ConfigError::ValidationError(format!(
                    "kube.target[{i}] must list at least one container"
                )));
            }
        }

        for (i, filter) in self.kube.filter.iter().enumerate() {
            if let Err(e) = Regex::new(filter) {
                errors.push(ConfigError::InvalidRegex {
                    field: format!("kube.filter[{i}]"),
                    message: e.to_string(),
                });
            }
        }

        for (i, replacement) in self.kube.replacements.iter().enumerate() {
            if let Err(e) = Regex::new(&replacement.target) {
                errors.push(ConfigError::InvalidRegex {
                    field: format!("kube.replacements[{i}].target"),
                    message: e.to_string(),
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn minimal_yaml() -> &'static str {
        r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: [app]
"#
    }

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = parse(minimal_yaml());

        assert_eq!(config.telegram.chat, -1001234);
        assert!(config.telegram.topics.is_empty());
        assert_eq!(config.relay.rate_per_minute, 20);
        assert_eq!(config.relay.queue_capacity, 1000);
        assert_eq!(config.relay.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.relay.stagger_delay, Duration::from_millis(600));
        assert_eq!(config.relay.shutdown_grace, Duration::from_secs(30));
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
        assert!(config.kube.filter.is_empty());
        assert!(config.kube.replacements.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
  topics:
    app: 12
    sidecar: 34
relay:
  rate_per_minute: 30
  queue_capacity: 500
  reconnect_delay: 5s
  stagger_delay: 250ms
  shutdown_grace: 10s
kube:
  config: /home/user/.kube/config
  namespace: staging
  target:
    - pod: "api-.*"
      container: [app, sidecar]
    - pod: "worker-.*"
      container: [worker]
  filter: ["ERROR", "WARN"]
  replacements:
    - target: "token=[a-z0-9]+"
      replacement: "token=***"
metrics:
  enabled: true
  port: 9191
"#,
        );

        assert_eq!(config.telegram.topics["app"], 12);
        assert_eq!(config.relay.rate_per_minute, 30);
        assert_eq!(config.relay.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.relay.stagger_delay, Duration::from_millis(250));
        assert_eq!(config.kube.target.len(), 2);
        assert_eq!(config.kube.filter.len(), 2);
        assert_eq!(config.kube.replacements.len(), 1);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9191);
    }

    #[test]
    fn dispatch_period_from_rate() {
        let mut relay = RelayConfig::default();
        assert_eq!(relay.dispatch_period(), Duration::from_secs(3)); // 20/min

        relay.rate_per_minute = 60;
        assert_eq!(relay.dispatch_period(), Duration::from_secs(1));

        relay.rate_per_minute = 120;
        assert_eq!(relay.dispatch_period(), Duration::from_millis(500));
    }

    #[test]
    fn validate_accepts_minimal_config() {
        let config = parse(minimal_yaml());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_token_and_chat() {
        let config = parse(
            r#"
telegram:
  token: ""
  chat: 0
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: [app]
"#,
        );

        let errors = config.validate().unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("telegram.token")));
        assert!(messages.iter().any(|m| m.contains("telegram.chat")));
    }

    #[test]
    fn validate_rejects_invalid_regexes() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
kube:
  namespace: production
  target:
    - pod: "api-[unclosed"
      container: [app]
  filter: ["(also unclosed"]
  replacements:
    - target: "[bad"
      replacement: "x"
"#,
        );

        let errors = config.validate().unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("kube.target[0].pod")));
        assert!(messages.iter().any(|m| m.contains("kube.filter[0]")));
        assert!(
            messages
                .iter()
                .any(|m| m.contains("kube.replacements[0].target"))
        );
    }

    #[test]
    fn validate_rejects_empty_targets_and_containers() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: []
"#,
        );

        let errors = config.validate().unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("at least one container"))
        );

        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
kube:
  namespace: production
  target: []
"#,
        );
        let errors = config.validate().unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.to_string().contains("at least one target"))
        );
    }

    #[test]
    fn validate_rejects_zero_rate_and_capacity() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
relay:
  rate_per_minute: 0
  queue_capacity: 0
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: [app]
"#,
        );

        let errors = config.validate().unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("rate_per_minute")));
        assert!(messages.iter().any(|m| m.contains("queue_capacity")));
    }

    #[test]
    #[serial]
    fn load_resolves_env_vars() {
        temp_env::with_var("PODRELAY_TEST_LOAD_TOKEN", Some("999:resolved"), || {
            let dir = std::env::temp_dir();
            let path = dir.join("podrelay-config-env-test.yaml");
            std::fs::write(
                &path,
                r#"
telegram:
  token: "${PODRELAY_TEST_LOAD_TOKEN}"
  chat: -1001234
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: [app]
"#,
            )
            .unwrap();

            let config = Config::load(&path).unwrap();
            assert_eq!(config.telegram.token.expose(), "999:resolved");

            let _ = std::fs::remove_file(&path);
        });
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = Config::load(Path::new("/nonexistent/podrelay.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to load config file"));
    }

    #[test]
    fn load_malformed_yaml_is_an_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("podrelay-config-bad-yaml-test.yaml");
        std::fs::write(&path, "telegram: [not a mapping").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));

        let _ = std::fs::remove_file(&path);
    }
}
