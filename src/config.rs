use crate::domain::amount::DEFAULT_MAX_DIGITS;
use crate::domain::payment::TerminalRef;
use crate::error::{Result, TerminalError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Terminal settings, read from a JSON file with camelCase keys.
///
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalConfig {
    /// Gateway root, e.g. `https://pos.example`.
    pub base_url: String,
    /// Device key the payments are collected for.
    pub device: Option<String>,
    /// Account id, used instead of `device` for web terminals.
    pub account: Option<String>,
    pub poll_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub idle_check_interval_ms: u64,
    pub max_amount_digits: usize,
    pub min_amount: Decimal,
    pub request_timeout_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            device: None,
            account: None,
            poll_interval_ms: 2_000,
            idle_timeout_ms: 15 * 60 * 1_000,
            idle_check_interval_ms: 5_000,
            max_amount_digits: DEFAULT_MAX_DIGITS,
            min_amount: dec!(0.01),
            request_timeout_ms: 30_000,
        }
    }
}

impl TerminalConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pollIntervalMs", self.poll_interval_ms),
            ("idleTimeoutMs", self.idle_timeout_ms),
            ("idleCheckIntervalMs", self.idle_check_interval_ms),
            ("requestTimeoutMs", self.request_timeout_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(TerminalError::Config(format!("{} must be positive", name)));
            }
        }
        // "0.00" is the shortest formatted amount
        if self.max_amount_digits < 3 {
            return Err(TerminalError::Config(
                "maxAmountDigits must be at least 3".to_string(),
            ));
        }
        if self.min_amount <= Decimal::ZERO {
            return Err(TerminalError::Config(
                "minAmount must be positive".to_string(),
            ));
        }
        self.terminal_ref().map(|_| ())
    }

    pub fn terminal_ref(&self) -> Result<TerminalRef> {
        match (&self.device, &self.account) {
            (Some(device), None) => Ok(TerminalRef::Device(device.clone())),
            (None, Some(account)) => Ok(TerminalRef::Account(account.clone())),
            (None, None) => Err(TerminalError::Config(
                "either device or account must be specified".to_string(),
            )),
            (Some(_), Some(_)) => Err(TerminalError::Config(
                "device and account are mutually exclusive".to_string(),
            )),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn device_config() -> TerminalConfig {
        TerminalConfig {
            device: Some("dev-key".to_string()),
            ..TerminalConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = TerminalConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.idle_timeout(), Duration::from_secs(900));
        assert_eq!(config.idle_check_interval(), Duration::from_secs(5));
        assert_eq!(config.max_amount_digits, 9);
        assert_eq!(config.min_amount, dec!(0.01));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"pollIntervalMs": 500, "minAmount": 1.5, "account": "42"}}"#
        )
        .unwrap();

        let config = TerminalConfig::from_file(file.path()).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.min_amount, dec!(1.5));
        assert_eq!(config.idle_timeout_ms, 900_000);
        assert_eq!(
            config.terminal_ref().unwrap(),
            TerminalRef::Account("42".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = TerminalConfig::from_file(Path::new("does/not/exist.json"));
        assert!(matches!(result, Err(TerminalError::Io(_))));
    }

    #[test]
    fn test_validation_failures() {
        assert!(device_config().validate().is_ok());

        let config = TerminalConfig {
            poll_interval_ms: 0,
            ..device_config()
        };
        assert!(matches!(config.validate(), Err(TerminalError::Config(_))));

        let config = TerminalConfig {
            min_amount: Decimal::ZERO,
            ..device_config()
        };
        assert!(config.validate().is_err());

        let config = TerminalConfig {
            max_amount_digits: 2,
            ..device_config()
        };
        assert!(config.validate().is_err());

        assert!(TerminalConfig::default().validate().is_err());

        let config = TerminalConfig {
            account: Some("1".to_string()),
            ..device_config()
        };
        assert!(config.validate().is_err());
    }
}
