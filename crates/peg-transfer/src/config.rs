//! # Peg Configuration
//!
//! Configuration for the peg registry and its couriers.

use crate::domain::{invariant_denom_format, MathKind, PegError, TransferProtocol};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Peg registry configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegConfig {
    /// Transfer protocol spoken on every channel.
    pub protocol: String,

    /// Amount math kind for shadow assets.
    pub math_kind: String,

    /// How long a courier waits for an acknowledgement before refunding.
    pub ack_timeout_secs: u64,

    /// Prefix of synthesized denominations for local pegs.
    pub local_denom_prefix: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON formatted logs.
    pub json_logs: bool,
}

impl Default for PegConfig {
    fn default() -> Self {
        Self {
            protocol: TransferProtocol::Ics20V1.as_str().to_string(),
            math_kind: MathKind::Nat.as_str().to_string(),
            ack_timeout_secs: 600,
            local_denom_prefix: "localpeg".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl PegConfig {
    /// Create a config for testing (short timeout, verbose logs).
    pub fn for_testing() -> Self {
        Self {
            ack_timeout_secs: 5,
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PEG_PROTOCOL`: Transfer protocol (default: ics20-1)
    /// - `PEG_MATH_KIND`: Amount math kind (default: nat)
    /// - `PEG_ACK_TIMEOUT_SECS`: Acknowledgement timeout (default: 600)
    /// - `PEG_LOCAL_DENOM_PREFIX`: Local denomination prefix (default: localpeg)
    /// - `PEG_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PEG_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            protocol: env::var("PEG_PROTOCOL").unwrap_or(defaults.protocol),
            math_kind: env::var("PEG_MATH_KIND").unwrap_or(defaults.math_kind),
            ack_timeout_secs: env::var("PEG_ACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ack_timeout_secs),
            local_denom_prefix: env::var("PEG_LOCAL_DENOM_PREFIX")
                .unwrap_or(defaults.local_denom_prefix),
            log_level: env::var("PEG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: env::var("PEG_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Check every field, returning the parsed protocol.
    pub fn validate(&self) -> Result<TransferProtocol, PegError> {
        let protocol: TransferProtocol = self.protocol.parse()?;
        self.math_kind.parse::<MathKind>()?;
        if self.ack_timeout_secs == 0 {
            return Err(PegError::InvalidConfig(
                "ack_timeout_secs must be positive".to_string(),
            ));
        }
        invariant_denom_format(&self.local_denom_prefix).map_err(|_| {
            PegError::InvalidConfig(format!(
                "local_denom_prefix {:?} is not a valid denomination",
                self.local_denom_prefix
            ))
        })?;
        Ok(protocol)
    }

    /// Acknowledgement timeout as a duration.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}
