//! SLIST-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SlistError>;

/// Top-level error type for slist.
#[derive(Debug, Error)]
pub enum SlistError {
    #[error("[SLIST-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SLIST-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SLIST-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SLIST-1101] invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("[SLIST-2001] malformed record: {details}")]
    Format { details: String },

    #[error("[SLIST-2002] malformed record at {}:{line}: {details}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        details: String,
    },

    #[error("[SLIST-2003] unsupported record kind {kind} for {pathname}")]
    UnsupportedKind {
        kind: &'static str,
        pathname: String,
    },

    #[error("[SLIST-2101] identity key collision {key:016x} for record {record}")]
    HashCollision { key: u64, record: String },

    #[error("[SLIST-2201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SLIST-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SLIST-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },
}

impl SlistError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SLIST-1001",
            Self::MissingConfig { .. } => "SLIST-1002",
            Self::ConfigParse { .. } => "SLIST-1003",
            Self::InvalidArgument { .. } => "SLIST-1101",
            Self::Format { .. } => "SLIST-2001",
            Self::Parse { .. } => "SLIST-2002",
            Self::UnsupportedKind { .. } => "SLIST-2003",
            Self::HashCollision { .. } => "SLIST-2101",
            Self::Serialization { .. } => "SLIST-2201",
            Self::Io { .. } => "SLIST-3002",
            Self::ChannelClosed { .. } => "SLIST-3003",
        }
    }

    /// Whether the failure came from the caller's input rather than the environment.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for record format errors.
    #[must_use]
    pub fn format(details: impl Into<String>) -> Self {
        Self::Format {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for SlistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SlistError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
