// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for normalization. Every field has a default, so a JSON file
/// only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Canonical page box every page is fitted into.
    pub target_paper: crate::PaperSize,
    /// How far (in points) a page may deviate from the target size
    /// before it is reported as an issue.
    pub size_tolerance_pt: f32,
    /// A fit only counts as a `scaling` fix when a dimension changes by
    /// more than this many points.
    pub scaling_threshold_pt: f32,
    /// Maximum skew (degrees) for a text item to vote, and the window
    /// around 180°/270° that counts as upside down.
    pub angle_tolerance_deg: f64,
    /// Resolution of rasterized pages.
    pub raster_dpi: f32,
    /// Upper bound on pixels per rasterized page.
    pub max_raster_pixels: u64,
    /// Compress content streams when saving.
    pub compress_output: bool,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            target_paper: crate::PaperSize::A4,
            size_tolerance_pt: 5.0,
            scaling_threshold_pt: 0.5,
            angle_tolerance_deg: 20.0,
            raster_dpi: 300.0,
            max_raster_pixels: 20_000_000,
            compress_output: true,
        }
    }
}

impl FixConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Render scale (pixels per point) for rasterization.
    pub fn raster_scale(&self) -> f32 {
        self.raster_dpi / 72.0
    }
}
