// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {std::path::PathBuf, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Visual Studio version {requested} not supported; supported versions are: {supported}")]
    UnsupportedVersion { requested: String, supported: String },

    #[error("Visual Studio version {0} not found")]
    InstallationNotFound(String),

    #[error("{} doesn't exist; does your Visual Studio have C++ support?", .0.display())]
    SetupScriptMissing(PathBuf),

    #[error("extracting environment for {variant}: {message}")]
    EnvironmentExtraction {
        variant: String,
        message: String,
        /// Captured output of the setup script, if any was produced.
        output: Option<String>,
        timed_out: bool,
    },

    #[error("malformed environment cache {}: {reason}", .path.display())]
    CacheDecode { path: PathBuf, reason: String },

    #[error("different WINDOWSSDKDIR values for different variants are unsupported: {0}")]
    SdkMismatch(String),

    #[error("no usable Windows SDK found in any requested variant")]
    NoUsableVariant,

    #[error("compiler version probe failed: {0}")]
    CompilerVersion(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error on path {}: {source}", .path.display())]
    IoPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverError {
    /// Name of the pipeline stage this error originates from.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion { .. }
            | Self::InstallationNotFound(_)
            | Self::SetupScriptMissing(_) => "locate",
            Self::EnvironmentExtraction { .. } => "extract",
            Self::CacheDecode { .. } | Self::IoPath { .. } => "cache",
            Self::SdkMismatch(_) | Self::NoUsableVariant => "emit",
            Self::CompilerVersion(_) => "probe",
            Self::InvalidArgument(_) => "arguments",
            Self::Io(_) | Self::Json(_) => "io",
        }
    }

    /// Whether running the same command again could succeed without a configuration change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoUsableVariant => true,
            Self::EnvironmentExtraction { timed_out, .. } => *timed_out,
            _ => false,
        }
    }

    /// Captured subprocess output attached to this error.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::EnvironmentExtraction { output, .. } => output.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn extraction(variant: impl ToString, message: impl ToString) -> Self {
        Self::EnvironmentExtraction {
            variant: variant.to_string(),
            message: message.to_string(),
            output: None,
            timed_out: false,
        }
    }

    pub(crate) fn io_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoPath {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_retryability() {
        assert_eq!(ResolverError::NoUsableVariant.stage(), "emit");
        assert!(ResolverError::NoUsableVariant.is_retryable());

        let err = ResolverError::UnsupportedVersion {
            requested: "2005".to_string(),
            supported: "2013, 2015".to_string(),
        };
        assert_eq!(err.stage(), "locate");
        assert!(!err.is_retryable());

        let err = ResolverError::EnvironmentExtraction {
            variant: "x64".to_string(),
            message: "timed out".to_string(),
            output: Some("partial".to_string()),
            timed_out: true,
        };
        assert!(err.is_retryable());
        assert_eq!(err.captured_output(), Some("partial"));
    }

    #[test]
    fn messages_are_single_line() {
        let err = ResolverError::EnvironmentExtraction {
            variant: "arm64_uwp".to_string(),
            message: "setup script exited with code 1".to_string(),
            output: Some("line one\nline two".to_string()),
            timed_out: false,
        };

        let message = err.to_string();
        assert!(!message.contains('\n'));
        assert_eq!(
            message,
            "extracting environment for arm64_uwp: setup script exited with code 1"
        );
    }
}
