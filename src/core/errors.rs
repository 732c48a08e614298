//! ISV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, IsvError>;

/// Top-level error type for the insertion sort visualizer.
#[derive(Debug, Error)]
pub enum IsvError {
    #[error("[ISV-1001] invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("[ISV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ISV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    /// Unwind signal raised inside the sort loop when a suspend is interrupted
    /// by a cancel. Never shown to the user.
    #[error("[ISV-2001] sort loop cancelled during wait")]
    CancelledDuringWait,

    #[error("[ISV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ISV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ISV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl IsvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "ISV-1001",
            Self::MissingConfig { .. } => "ISV-1002",
            Self::ConfigParse { .. } => "ISV-1003",
            Self::CancelledDuringWait => "ISV-2001",
            Self::Serialization { .. } => "ISV-2101",
            Self::Io { .. } => "ISV-3002",
            Self::Runtime { .. } => "ISV-3900",
        }
    }

    /// Whether the error should ever reach the user.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self, Self::CancelledDuringWait)
    }

    /// Convenience constructor for configuration rejections.
    #[must_use]
    pub fn invalid(details: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            details: details.into(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for IsvError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for IsvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for IsvError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
