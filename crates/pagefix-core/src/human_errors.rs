// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion
// and one of a small set of failure categories, so a caller can report
// "file X could not be fixed because Y" in a single sentence.

use crate::error::{FixStage, PagefixError};

/// What kind of failure the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The file is damaged or not really a PDF.
    Corruption,
    /// The file is locked and no usable password was given.
    Password,
    /// The file uses a structure we cannot handle.
    UnsupportedStructure,
    /// The caller gave up (timeout or abort).
    Cancelled,
    /// Our own bug or environment problem.
    Internal,
}

impl FailureCategory {
    fn phrase(self) -> &'static str {
        match self {
            Self::Corruption => "the file appears to be damaged",
            Self::Password => "the file is password protected",
            Self::UnsupportedStructure => "the file uses a structure that is not supported",
            Self::Cancelled => "the operation was cancelled",
            Self::Internal => "of an internal problem",
        }
    }
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying the same thing again could help.
    pub retriable: bool,
    pub category: FailureCategory,
}

impl HumanError {
    /// One sentence naming the file and the failure category.
    pub fn sentence(&self, file_name: &str) -> String {
        format!(
            "\"{file_name}\" could not be fixed because {}.",
            self.category.phrase()
        )
    }
}

/// Convert a `PagefixError` into a `HumanError`.
pub fn humanize_error(err: &PagefixError) -> HumanError {
    match err {
        PagefixError::Parse(_) | PagefixError::MalformedPage { .. } => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it in another viewer and saving a fresh copy.".into(),
            retriable: false,
            category: FailureCategory::Corruption,
        },

        PagefixError::PdfError(detail) => {
            if detail.contains("unsupported") || detail.contains("not supported") {
                HumanError {
                    message: "This PDF uses features we can't edit.".into(),
                    suggestion: "Try printing it to a new PDF first, then load that copy.".into(),
                    retriable: false,
                    category: FailureCategory::UnsupportedStructure,
                }
            } else {
                HumanError {
                    message: "There's a problem with this PDF file.".into(),
                    suggestion: "The file may be damaged. Try a different copy of the file.".into(),
                    retriable: false,
                    category: FailureCategory::Corruption,
                }
            }
        }

        PagefixError::Serialize(_) => HumanError {
            message: "The fixed file couldn't be written.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            category: FailureCategory::Internal,
        },

        PagefixError::PasswordRequired => HumanError {
            message: "This PDF needs a password.".into(),
            suggestion: "Enter the password used to open the document, then try again.".into(),
            retriable: true,
            category: FailureCategory::Password,
        },

        PagefixError::IncorrectPassword => HumanError {
            message: "That password didn't work.".into(),
            suggestion: "Check the password and try again.".into(),
            retriable: true,
            category: FailureCategory::Password,
        },

        PagefixError::Render(_) => HumanError {
            message: "The pages couldn't be drawn.".into(),
            suggestion: "The file may be damaged. Try a different copy of the file.".into(),
            retriable: false,
            category: FailureCategory::Corruption,
        },

        PagefixError::RenderUnavailable => HumanError {
            message: "This PDF can only be fixed by redrawing its pages.".into(),
            suggestion: "Install a build with page rendering enabled, then try again.".into(),
            retriable: false,
            category: FailureCategory::UnsupportedStructure,
        },

        PagefixError::ImageError(_) => HumanError {
            message: "A page image couldn't be processed.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            category: FailureCategory::Internal,
        },

        PagefixError::AutoFixFailed { stage, cause } => humanize_stage_failure(*stage, cause),

        PagefixError::Cancelled => HumanError {
            message: "Fixing was stopped before it finished.".into(),
            suggestion: "Try again and allow more time for large files.".into(),
            retriable: true,
            category: FailureCategory::Cancelled,
        },

        PagefixError::InvalidModification(detail) => HumanError {
            message: "That page change isn't possible.".into(),
            suggestion: format!("Check the page numbers and angle. ({detail})"),
            retriable: false,
            category: FailureCategory::Internal,
        },

        PagefixError::Bundle(_) => HumanError {
            message: "The documents couldn't be combined.".into(),
            suggestion: "Fix each document on its own first, then combine them again.".into(),
            retriable: false,
            category: FailureCategory::UnsupportedStructure,
        },

        PagefixError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    category: FailureCategory::Internal,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    category: FailureCategory::Internal,
                }
            }
        }

        PagefixError::Serialization(_) => HumanError {
            message: "A settings file couldn't be read.".into(),
            suggestion: "Check the configuration file is valid JSON.".into(),
            retriable: false,
            category: FailureCategory::Internal,
        },
    }
}

fn humanize_stage_failure(stage: FixStage, cause: &str) -> HumanError {
    let lower = cause.to_ascii_lowercase();
    let category = if lower.contains("password") {
        FailureCategory::Password
    } else if lower.contains("unsupported") || lower.contains("no rendering engine") {
        FailureCategory::UnsupportedStructure
    } else {
        FailureCategory::Corruption
    };

    let message = match stage {
        FixStage::Rasterization => "We couldn't fix this PDF, even by redrawing its pages.",
        FixStage::StructuralFix => "We couldn't resize or rotate the pages of this PDF.",
        FixStage::SecurityNormalization => "We couldn't unlock this PDF for editing.",
        FixStage::Modification => "We couldn't apply your page changes.",
        FixStage::Bundle => "We couldn't combine the documents.",
    };

    HumanError {
        message: message.into(),
        suggestion: format!("Try a different copy of the file. (Detail: {cause})"),
        retriable: false,
        category,
    }
}
