//! Secret string wrapper that never appears in logs.

use serde::Deserialize;

/// Wrapper for secrets that never appears in logs.
///
/// Ensures sensitive values like the bot token are never accidentally logged
/// or displayed. The `Debug` and `Display` implementations always show
/// `[REDACTED]` instead of the actual value.
///
/// # Example
///
/// ```
/// use podrelay::config::SecretString;
///
/// let secret = SecretString::new("123456:bot-token".to_string());
/// assert_eq!(format!("{:?}", secret), "[REDACTED]");
/// assert_eq!(secret.expose(), "123456:bot-token");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new `SecretString` from a regular `String`.
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// Exposes the underlying secret value.
    ///
    /// # Security Warning
    ///
    /// Use with care - never pass the result to logging functions
    /// or any output that could be visible to unauthorized users.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_redacts_in_debug_and_display() {
        let secret = SecretString::new("123456:super-secret-token".to_string());

        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("super-secret-token"));
        assert!(debug_output.contains("[REDACTED]"));

        let display_output = format!("{}", secret);
        assert!(!display_output.contains("super-secret-token"));
        assert!(display_output.contains("[REDACTED]"));
    }

    #[test]
    fn secret_string_exposes_value() {
        let secret = SecretString::new("value".to_string());
        assert_eq!(secret.expose(), "value");
    }

    #[test]
    fn secret_string_deserializes_from_plain_string() {
        let secret: SecretString = serde_yaml::from_str("\"my-token\"").unwrap();
        assert_eq!(secret.expose(), "my-token");
    }
}
