// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagefix-document — PDF normalization for Pagefix.
//
// Strips editing protections, fits every page to the target paper in
// portrait with upright text, falls back to rasterizing pages that cannot be
// fixed structurally, applies user edits, and assembles bundles.

pub mod autofix;
pub mod bundle;
pub mod context;
pub mod issues;
pub mod modify;
pub mod orientation;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod session;
pub mod unlock;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export the primary entry points so callers can use `pagefix_document::FixSession` etc.
pub use autofix::structural_auto_fix;
pub use bundle::{AssembledBundle, BundleEntry, BundleSpec, TocEntry, assemble_bundle};
pub use context::{CancelFlag, FixContext};
pub use issues::detect_issues;
pub use modify::apply_modifications;
pub use pipeline::{auto_fix, prepare_editable_pdf_bytes};
pub use raster::{probe_structure, rasterize_document};
pub use session::FixSession;
pub use unlock::normalize_pdf_for_editing;
pub use worker::{FixWorker, with_timeout};
