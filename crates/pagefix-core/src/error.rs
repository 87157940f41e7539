// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagefix.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage an escalated failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStage {
    SecurityNormalization,
    StructuralFix,
    Rasterization,
    Modification,
    Bundle,
}

impl fmt::Display for FixStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SecurityNormalization => "security normalization",
            Self::StructuralFix => "structural fix",
            Self::Rasterization => "rasterization",
            Self::Modification => "modification",
            Self::Bundle => "bundle assembly",
        };
        f.write_str(name)
    }
}

/// Top-level error type for all Pagefix operations.
#[derive(Debug, Error)]
pub enum PagefixError {
    // -- Object model --
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("page {page} is malformed: {detail}")]
    MalformedPage { page: usize, detail: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("failed to serialize PDF: {0}")]
    Serialize(String),

    // -- Passwords --
    #[error("password required")]
    PasswordRequired,

    #[error("incorrect password")]
    IncorrectPassword,

    // -- Rendering --
    #[error("rendering failed: {0}")]
    Render(String),

    #[error("no rendering engine able to rasterize pages is available")]
    RenderUnavailable,

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Pipeline --
    #[error("unable to auto-fix after {stage}: {cause}")]
    AutoFixFailed { stage: FixStage, cause: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid page modification: {0}")]
    InvalidModification(String),

    #[error("bundle assembly failed: {0}")]
    Bundle(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PagefixError {
    /// Wrap this error as a failure of `stage`, keeping an existing
    /// stage tag and cancellation intact.
    pub fn at_stage(self, stage: FixStage) -> Self {
        match self {
            err @ (Self::AutoFixFailed { .. }
            | Self::PasswordRequired
            | Self::Cancelled) => err,
            other => Self::AutoFixFailed {
                stage,
                cause: other.to_string(),
            },
        }
    }

    /// True when the user or caller declined to continue, as opposed to
    /// the document being broken.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::PasswordRequired | Self::Cancelled)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagefixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_stage_wraps_cause() {
        let err = PagefixError::Parse("bad xref".into()).at_stage(FixStage::Rasterization);
        match err {
            PagefixError::AutoFixFailed { stage, cause } => {
                assert_eq!(stage, FixStage::Rasterization);
                assert!(cause.contains("bad xref"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn at_stage_keeps_cancellation() {
        let err = PagefixError::PasswordRequired.at_stage(FixStage::StructuralFix);
        assert!(err.is_cancellation());
        assert!(matches!(err, PagefixError::PasswordRequired));
    }

    #[test]
    fn rasterize_failure_message() {
        let err = PagefixError::AutoFixFailed {
            stage: FixStage::Rasterization,
            cause: "engine crashed".into(),
        };
        assert_eq!(
            err.to_string(),
            "unable to auto-fix after rasterization: engine crashed"
        );
    }
}
