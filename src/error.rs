//! Error types for the Converge reconciliation engine.
//!
//! This module provides the error hierarchy for every phase of a
//! reconciliation run: configuration, fact collection, want validation,
//! diffing, synthesis, and execution against the device transport.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Converge engine.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fact-collection errors.
    #[error("Fact collection error: {0}")]
    Collection(#[from] CollectionError),

    /// Desired-state validation errors.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A delete request without a distinguishing key matched more than one
    /// resource.
    #[error("Ambiguous delete for {kind}: matches {}; specify the {key_field} field", matches.join(", "))]
    AmbiguousDelete {
        /// Resource kind the delete was issued against.
        kind: String,
        /// Key field that would disambiguate.
        key_field: String,
        /// Keys of the matching resources.
        matches: Vec<String>,
    },

    /// Device transport errors.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A transport call failed mid-plan. Already-applied operations are not
    /// rolled back.
    #[error("Transport failure after {} of {total} operations applied: {source}", applied.len())]
    Apply {
        /// Descriptions of the operations that were applied before the failure.
        applied: Vec<String>,
        /// Total operations in the plan.
        total: usize,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The reconcile document was not found.
    #[error("Reconcile document not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The reconcile document could not be parsed.
    #[error("Failed to parse reconcile document: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Target configuration is incoherent (e.g. rest transport without an
    /// endpoint).
    #[error("Invalid target configuration: {message}")]
    InvalidTarget {
        /// Description of the problem.
        message: String,
    },
}

/// Fact-collection errors.
///
/// These are always fatal and always occur before any mutation is sent.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Raw device output could not be parsed into resource facts.
    #[error("Malformed device output for {kind}: {message}")]
    MalformedOutput {
        /// Resource kind being collected.
        kind: String,
        /// Description of the parse failure.
        message: String,
    },

    /// The transport returned a facts payload of the wrong flavor for the
    /// kind (e.g. JSON where CLI text was expected).
    #[error("Unsupported facts payload for {kind}: expected {expected}")]
    UnsupportedPayload {
        /// Resource kind being collected.
        kind: String,
        /// Payload flavor the kind's parser expects.
        expected: String,
    },
}

/// Desired-state validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field failed schema or cross-field validation.
    #[error("{message}")]
    Invalid {
        /// Description of the validation failure.
        message: String,
        /// Field path that failed, when known.
        field: Option<String>,
    },

    /// The requested resource kind is not registered.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The unrecognized kind name.
        kind: String,
    },

    /// The want configuration is empty for a mode that requires it.
    #[error("Desired configuration must not be empty for mode {mode}")]
    EmptyWant {
        /// The offending mode.
        mode: String,
    },

    /// An identity field is missing or explicitly null.
    #[error("Resource is missing identity field '{key_field}'")]
    MissingKey {
        /// The identity field name.
        key_field: String,
    },

    /// Duplicate resource keys in the want configuration.
    #[error("Duplicate resource key in desired configuration: {key}")]
    DuplicateKey {
        /// The duplicated key.
        key: String,
    },
}

/// Device transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Authentication with the device failed.
    #[error("Device authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// A request was rejected by the device.
    #[error("Device request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the device.
        message: String,
    },

    /// Network-level failure reaching the device.
    #[error("Network error communicating with device: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// The device replied with something the transport could not decode.
    #[error("Invalid response from device: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The transport does not implement the requested call (e.g. sending
    /// CLI commands to a REST-only device).
    #[error("Transport does not support {call}")]
    Unsupported {
        /// The unsupported call name.
        call: String,
    },
}

/// Result type alias for Converge operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

impl ConvergeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error occurred before any mutation was sent.
    #[must_use]
    pub const fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Collection(_) | Self::Validation(_) | Self::AmbiguousDelete { .. }
        )
    }
}

impl ValidationError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn invalid_general(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            field: None,
        }
    }
}

impl CollectionError {
    /// Creates a malformed-output error.
    #[must_use]
    pub fn malformed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedOutput {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Creates a request error.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
