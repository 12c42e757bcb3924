//! Environment variable substitution for config values.

use crate::error::ConfigError;
use regex::Regex;

/// Resolves `${VAR_NAME}` patterns in a string.
///
/// Every referenced variable must be defined; undefined variables are
/// collected and reported together so a typo surfaces at startup instead of
/// silently shipping the literal `${...}` text downstream.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex");

    let mut result = value.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(value) {
        let full_match = cap.get(0).expect("capture 0 always present").as_str();
        let var_name = &cap[1];

        match std::env::var(var_name) {
            Ok(var_value) => {
                result = result.replace(full_match, &var_value);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if errors.len() > 1 { "s" } else { "" },
            errors.join(", ")
        )))
    }
}
