// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagefix normalization pipeline.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A4 page width in PDF points.
pub const A4_WIDTH: f32 = 595.28;
/// A4 page height in PDF points.
pub const A4_HEIGHT: f32 = 841.89;

const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Unique identifier for a job submitted to a fix worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paper sizes a document can be normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_pt: f32, height_pt: f32 },
}

impl PaperSize {
    /// Portrait dimensions in PDF points (width, height).
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::A4 => (A4_WIDTH, A4_HEIGHT),
            Self::A3 => (297.0 * POINTS_PER_MM, 420.0 * POINTS_PER_MM),
            Self::A5 => (148.0 * POINTS_PER_MM, 210.0 * POINTS_PER_MM),
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
            Self::Custom {
                width_pt,
                height_pt,
            } => (*width_pt, *height_pt),
        }
    }

    /// Portrait dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_pt();
        (w / POINTS_PER_MM, h / POINTS_PER_MM)
    }
}

/// Which aspect of a page deviates from the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Size,
    Orientation,
    Both,
}

/// A deviation of one page from A4 portrait upright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIssue {
    /// Zero-based page index.
    pub page_index: usize,
    pub issue_type: IssueType,
    pub description: String,
}

/// Kind of change the auto-fixer made to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    Rotation,
    Scaling,
}

/// Fix kinds applied per zero-based page index.
pub type FixTypesByPage = BTreeMap<usize, BTreeSet<FixType>>;

/// Dominant reading direction of a page: 0, 90, 180 or 270, or `None`
/// when no usable text was found.
pub type TextAngle = Option<u32>;

/// A user edit applied to a subset of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageModification {
    /// Add `angle` degrees (any multiple of 90, may be negative) to the
    /// page rotation.
    #[serde(rename_all = "camelCase")]
    Rotate { page_indices: Vec<usize>, angle: i32 },
    /// Scale and center the page content into an A4 box.
    #[serde(rename_all = "camelCase")]
    FitToA4 { page_indices: Vec<usize> },
}

impl PageModification {
    pub fn page_indices(&self) -> &[usize] {
        match self {
            Self::Rotate { page_indices, .. } | Self::FitToA4 { page_indices } => page_indices,
        }
    }
}

/// Why a document needed its protections removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BypassReason {
    Encryption,
    Certification,
    Signature,
}

impl std::fmt::Display for BypassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Encryption => "encryption",
            Self::Certification => "certification",
            Self::Signature => "signature",
        };
        f.write_str(name)
    }
}

/// Output of the security normalizer.
#[derive(Debug, Clone)]
pub struct NormalizedPdf {
    pub bytes: Vec<u8>,
    pub reasons: Vec<BypassReason>,
    pub bypass_applied: bool,
}

/// Output of the structural auto-fixer.
#[derive(Debug, Clone)]
pub struct AutoFixResult {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Issues still present after fixing.
    pub issues: Vec<PageIssue>,
    pub auto_fix_applied: bool,
    pub auto_fix_summary: Option<String>,
    pub fix_types_by_page: FixTypesByPage,
}

/// A document made safe to edit by the full preparation pipeline.
#[derive(Debug, Clone)]
pub struct PreparedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Every page is a single embedded raster image.
    pub image_only: bool,
    pub bypass_reasons: Vec<BypassReason>,
    pub bypass_applied: bool,
    pub fix: AutoFixResult,
}

/// Shape of a page as displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

/// Geometry of one page, for previews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub rotation: u32,
    /// Orientation after applying `rotation`.
    pub orientation: PageOrientation,
}

impl PageSummary {
    pub fn new(index: usize, width: f32, height: f32, rotation: u32) -> Self {
        let (w, h) = if rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        };
        let orientation = if (w - h).abs() < f32::EPSILON {
            PageOrientation::Square
        } else if h > w {
            PageOrientation::Portrait
        } else {
            PageOrientation::Landscape
        };
        Self {
            index,
            width,
            height,
            rotation,
            orientation,
        }
    }
}
