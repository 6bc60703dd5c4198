//! Dispatcher error types

use std::io;

use thiserror::Error;

use crate::plugins::CapabilityKind;

/// Errors returned when routing a file or backend request to a module.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No handler is registered for the file's extension
    #[error("No {kind} registered for '{path}'")]
    UnsupportedFormat { kind: CapabilityKind, path: String },

    /// A handler ran but produced nothing
    #[error("Failed to parse {path}{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    FormatParse {
        path: String,
        /// Last message the module passed to `report_error`, if any
        detail: Option<String>,
    },

    /// The file could not be opened through the host filesystem
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// No graphics backend registered under this name
    #[error("Unknown graphics backend '{name}'")]
    UnknownBackend { name: String },

    /// The backend has no device factory, or its factory returned null
    #[error("Graphics backend '{backend}' failed to create a device")]
    DeviceCreation { backend: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_display() {
        let err = DispatchError::UnsupportedFormat {
            kind: CapabilityKind::ImageLoader,
            path: "sky.vtf".to_string(),
        };
        assert_eq!(err.to_string(), "No image loader registered for 'sky.vtf'");
    }

    #[test]
    fn test_format_parse_display_with_detail() {
        let err = DispatchError::FormatParse {
            path: "pak0.pak".to_string(),
            detail: Some("bad magic".to_string()),
        };
        assert_eq!(err.to_string(), "Failed to parse pak0.pak: bad magic");

        let err = DispatchError::FormatParse {
            path: "pak0.pak".to_string(),
            detail: None,
        };
        assert_eq!(err.to_string(), "Failed to parse pak0.pak");
    }

    #[test]
    fn test_open_keeps_source() {
        let err = DispatchError::Open {
            path: "missing.pak".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
