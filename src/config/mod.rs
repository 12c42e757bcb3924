//! Configuration loading and validation for podrelay.
//!
//! This module handles loading the YAML configuration file, `${VAR}`
//! environment substitution, validation, and compilation into the
//! runtime form the relay core consumes.

mod env;
mod runtime;
mod secret;
mod types;

pub use env::resolve_env_vars;
pub use runtime::{
    CompiledReplacement, CompiledTarget, KubeRuntime, RuntimeConfig, TelegramRuntime,
};
pub use secret::SecretString;
pub use types::{
    Config, DEFAULT_CONFIG_PATH, KubeConfig, MetricsConfig, RelayConfig, ReplacementConfig,
    TargetConfig, TelegramConfig,
};
