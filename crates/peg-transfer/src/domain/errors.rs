//! # Domain Errors
//!
//! Error types for cross-chain pegging.
//!
//! Every failure falls into one of the classes reported by
//! [`PegError::class`]. Validation errors are raised before any state
//! mutation; transfer-attempt failures are converted into a
//! `TransferResult` by the courier and never reach the caller as `Err`;
//! fatal errors mean value is unaccounted for and must not be retried.

use thiserror::Error;

/// Broad classification of a [`PegError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input, rejected before anything happened.
    Validation,
    /// Registry lookup or registration conflict, nothing happened.
    Routing,
    /// Network or acknowledgement failure during a send.
    TransferAttempt,
    /// Asset ledger collaborator failure.
    Ledger,
    /// Value is stuck; operator intervention required.
    Fatal,
}

/// Cross-chain pegging error types.
#[derive(Debug, Error)]
pub enum PegError {
    /// Endpoint is not a sequence of `/key/value` segments.
    #[error("Malformed endpoint {endpoint:?}: {reason}")]
    MalformedEndpoint {
        /// The offending endpoint.
        endpoint: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Endpoint lacks a required segment.
    #[error("Cannot find {key} in endpoint {endpoint:?}")]
    MissingEndpointSegment {
        /// The missing key (`ibc-port` or `ibc-channel`).
        key: &'static str,
        /// The endpoint searched.
        endpoint: String,
    },

    /// Transfer protocol other than the supported one.
    #[error("Unsupported protocol {0:?}; need \"ics20-1\"")]
    UnsupportedProtocol(String),

    /// Amount math kind other than natural numbers.
    #[error("Unsupported math kind {0:?}; need \"nat\"")]
    UnsupportedMathKind(String),

    /// Raw denomination does not follow the Cosmos denomination format.
    #[error("Invalid denomination {0:?}; need Cosmos denomination format")]
    InvalidDenomination(String),

    /// Denomination URI does not begin with the protocol prefix.
    #[error("{uri:?} does not begin with {prefix:?}")]
    DenomUriPrefixMismatch {
        /// The URI that was split.
        uri: String,
        /// The expected prefix.
        prefix: String,
    },

    /// Amount string is not a non-negative integer that fits.
    #[error("Invalid amount {0:?}")]
    InvalidAmount(String),

    /// Wire bytes could not be decoded.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Asset brand differs from the one expected.
    #[error("Brand mismatch: expected {expected}, got {got}")]
    BrandMismatch {
        /// Brand the operation is bound to.
        expected: String,
        /// Brand that was supplied.
        got: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Log subscriber could not be installed.
    #[error("Tracing init failed: {0}")]
    TracingInit(String),

    /// Connection opened twice.
    #[error("Connection {0} is already open")]
    ConnectionAlreadyOpen(u64),

    /// Connection was never opened through this registry, or already closed.
    #[error("Connection {0} is not open; it must use the peg connection handler")]
    ConnectionNotOpen(u64),

    /// A courier already serves this denomination URI on the connection.
    #[error("Courier already registered for {0}")]
    CourierAlreadyRegistered(String),

    /// No courier serves this denomination URI on the connection.
    #[error("Unknown denomination {0}")]
    UnknownDenomination(String),

    /// Peg handle was not issued by this registry.
    #[error("Peg {0} is not registered")]
    UnknownPeg(u64),

    /// Brand is not registered with this registry.
    #[error("Brand {0} is not a registered peg")]
    UnknownBrand(String),

    /// The peg's connection has been closed.
    #[error("Peg {0} disconnected")]
    PegDisconnected(String),

    /// The peg registry behind a notifier is gone.
    #[error("Peg notifier closed")]
    NotifierClosed,

    /// Connection transport failed (closed, unreachable).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Acknowledgement did not arrive in time.
    #[error("Acknowledgement timed out after {0}s")]
    AckTimeout(u64),

    /// Asset ledger collaborator rejected an operation.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Address registry could not resolve a deposit address.
    #[error("Cannot resolve deposit address {0:?}")]
    UnknownDepositAddress(String),

    /// Redeem failed after retain succeeded; the value is stuck.
    #[error("FATAL: refund of {amount} on {denom_uri} failed after retain: {reason}")]
    RefundFailed {
        /// Denomination the courier serves.
        denom_uri: String,
        /// Amount that was retained and could not be recreated.
        amount: String,
        /// Underlying ledger error.
        reason: String,
    },
}

impl PegError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedEndpoint { .. }
            | Self::MissingEndpointSegment { .. }
            | Self::UnsupportedProtocol(_)
            | Self::UnsupportedMathKind(_)
            | Self::InvalidDenomination(_)
            | Self::DenomUriPrefixMismatch { .. }
            | Self::InvalidAmount(_)
            | Self::MalformedPacket(_)
            | Self::BrandMismatch { .. }
            | Self::InvalidConfig(_)
            | Self::TracingInit(_) => ErrorClass::Validation,
            Self::ConnectionAlreadyOpen(_)
            | Self::ConnectionNotOpen(_)
            | Self::CourierAlreadyRegistered(_)
            | Self::UnknownDenomination(_)
            | Self::UnknownPeg(_)
            | Self::UnknownBrand(_)
            | Self::PegDisconnected(_)
            | Self::UnknownDepositAddress(_)
            | Self::NotifierClosed => ErrorClass::Routing,
            Self::Transport(_) | Self::AckTimeout(_) => ErrorClass::TransferAttempt,
            Self::Ledger(_) => ErrorClass::Ledger,
            Self::RefundFailed { .. } => ErrorClass::Fatal,
        }
    }

    /// True if value may have been lost.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
