// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborators shared by every pipeline stage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pagefix_core::FixConfig;
use pagefix_core::error::{PagefixError, Result};
use pagefix_render::{PasswordPrompt, RenderEngine};

/// Raised by a caller that no longer wants the result of a running job.
/// Page loops check it and stop with `PagefixError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Borrowed render engine, password source and configuration for one run.
#[derive(Clone, Copy)]
pub struct FixContext<'a> {
    pub engine: &'a dyn RenderEngine,
    pub prompt: &'a dyn PasswordPrompt,
    pub config: &'a FixConfig,
    pub cancel: Option<&'a CancelFlag>,
}

impl<'a> FixContext<'a> {
    pub fn new(engine: &'a dyn RenderEngine, prompt: &'a dyn PasswordPrompt, config: &'a FixConfig) -> Self {
        Self {
            engine,
            prompt,
            config,
            cancel: None,
        }
    }

    pub fn with_cancel(self, cancel: &'a CancelFlag) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    /// Fails with `Cancelled` once the run's flag has been raised.
    pub fn checkpoint(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(PagefixError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Target page size in points.
    pub fn target(&self) -> (f32, f32) {
        self.config.target_paper.dimensions_pt()
    }
}

impl std::fmt::Debug for FixContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixContext")
            .field("engine", &self.engine.name())
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}
