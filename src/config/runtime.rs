//! Runtime configuration with pre-compiled regexes.

use super::secret::SecretString;
use super::types::{Config, MetricsConfig, RelayConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// Runtime configuration with every pattern compiled up front.
///
/// Produced by [`Config::compile`] after validation; the relay core never
/// touches raw pattern strings.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub telegram: TelegramRuntime,
    pub relay: RelayConfig,
    pub kube: KubeRuntime,
    pub filters: Vec<Regex>,
    pub replacements: Vec<CompiledReplacement>,
    pub metrics: MetricsConfig,
}

/// Telegram destination settings, ready for dispatch.
#[derive(Debug)]
pub struct TelegramRuntime {
    pub token: SecretString,
    pub chat: i64,
    pub topics: HashMap<String, i64>,
}

/// Kubernetes connection settings and compiled targets.
#[derive(Debug)]
pub struct KubeRuntime {
    pub config_path: Option<String>,
    pub namespace: String,
    pub targets: Vec<CompiledTarget>,
}

/// One monitored target with its pod pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledTarget {
    pub pod: Regex,
    pub containers: Vec<String>,
}

/// One ordered rewrite rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledReplacement {
    pub pattern: Regex,
    pub replacement: String,
}

impl Config {
    /// Compile the configuration into runtime-ready form.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRegex` for patterns that do not compile.
    /// `validate()` reports the same patterns, so after a successful
    /// validation this cannot fail; compiling still propagates instead of
    /// panicking.
    pub fn compile(self) -> Result<RuntimeConfig, ConfigError> {
        let targets = self
            .kube
            .target
            .into_iter()
            .enumerate()
            .map(|(i, target)| {
                let pod = Regex::new(&target.pod).map_err(|e| ConfigError::InvalidRegex {
                    field: format!("kube.target[{i}].pod"),
                    message: e.to_string(),
                })?;
                Ok(CompiledTarget {
                    pod,
                    containers: target.container,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let filters = self
            .kube
            .filter
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    field: format!("kube.filter[{i}]"),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let replacements = self
            .kube
            .replacements
            .into_iter()
            .enumerate()
            .map(|(i, rule)| {
                let pattern =
                    Regex::new(&rule.target).map_err(|e| ConfigError::InvalidRegex {
                        field: format!("kube.replacements[{i}].target"),
                        message: e.to_string(),
                    })?;
                Ok(CompiledReplacement {
                    pattern,
                    replacement: rule.replacement,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(RuntimeConfig {
            telegram: TelegramRuntime {
                token: self.telegram.token,
                chat: self.telegram.chat,
                topics: self.telegram.topics,
            },
            relay: self.relay,
            kube: KubeRuntime {
                config_path: self.kube.config,
                namespace: self.kube.namespace,
                targets,
            },
            filters,
            replacements,
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn compile_produces_compiled_patterns() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
  topics:
    app: 12
kube:
  namespace: production
  target:
    - pod: "api-.*"
      container: [app, sidecar]
  filter: ["ERROR"]
  replacements:
    - target: "boom"
      replacement: "BOOM"
"#,
        );

        let runtime = config.compile().unwrap();

        assert_eq!(runtime.telegram.chat, -1001234);
        assert_eq!(runtime.telegram.topics["app"], 12);
        assert_eq!(runtime.kube.namespace, "production");
        assert_eq!(runtime.kube.targets.len(), 1);
        assert!(runtime.kube.targets[0].pod.is_match("api-7f9c"));
        assert_eq!(runtime.kube.targets[0].containers, vec!["app", "sidecar"]);
        assert_eq!(runtime.filters.len(), 1);
        assert!(runtime.filters[0].is_match("ERROR boom"));
        assert_eq!(runtime.replacements.len(), 1);
        assert_eq!(
            runtime.replacements[0]
                .pattern
                .replace_all("boom", runtime.replacements[0].replacement.as_str()),
            "BOOM"
        );
    }

    #[test]
    fn compile_rejects_invalid_pattern() {
        let config = parse(
            r#"
telegram:
  token: "123456:test-token"
  chat: -1001234
kube:
  namespace: production
  target:
    - pod: "api-[bad"
      container: [app]
"#,
        );

        let err = config.compile().unwrap_err();
        assert!(err.to_string().contains("kube.target[0].pod"));
    }
}
