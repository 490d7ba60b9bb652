//! Error types.

use std::fmt;

use crate::key::TreeKey;

/// Strict indexing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Two nodes share a key.
    DuplicateKey {
        key: TreeKey,
        first_pos: String,
        second_pos: String,
    },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey {
                key,
                first_pos,
                second_pos,
            } => write!(
                f,
                "duplicate tree key {key:?} at positions {first_pos} and {second_pos}"
            ),
        }
    }
}

impl std::error::Error for IndexError {}

/// Failure reported by a host loader.
///
/// The tree never surfaces this to the host; it only clears the loading
/// marker so the next expand retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    message: String,
}

impl LoadError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load failed: {}", self.message)
    }
}

impl std::error::Error for LoadError {}

/// Errors from loading [`TreeOptions`](crate::config::TreeOptions).
#[derive(Debug)]
pub enum OptionsError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for OptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

impl From<std::io::Error> for OptionsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
