// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub engine for builds and callers with no renderer at all.
//
// Opening always fails with `RenderUnavailable`, so the pipeline treats every
// text angle as unknown and cannot rasterize.

use pagefix_core::error::{PagefixError, Result};

use crate::traits::{RenderDocument, RenderEngine};

/// Engine that renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubEngine;

impl RenderEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn open(&self, _bytes: Vec<u8>, _password: Option<&str>) -> Result<Box<dyn RenderDocument + '_>> {
        tracing::debug!("StubEngine::open called, no renderer available");
        Err(PagefixError::RenderUnavailable)
    }
}
