// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fix session — one pipeline instance with its collaborators and a
// single-entry parse cache.

use lopdf::Document;
use pagefix_core::error::{FixStage, Result};
use pagefix_core::{AutoFixResult, FixConfig, PageIssue, PageModification, PageSummary, PreparedPdf};
use pagefix_render::{NoPrompt, PasswordPrompt, RenderEngine, default_engine};
use pagefix_security::Fingerprint;
use tracing::{debug, instrument, warn};

use crate::context::{CancelFlag, FixContext};
use crate::issues::detect_document_issues;
use crate::modify::{apply_to_document, validate_modifications};
use crate::pdf::page::{load_document, page_summaries, save_document};
use crate::pipeline::prepare_normalized;
use crate::unlock::{normalize_document, unchanged};

/// The most recently parsed document, keyed by a fingerprint of the bytes
/// it came from.
///
/// Callers only ever see clones of the cached document, so a failed
/// operation cannot leave it half-mutated.
#[derive(Default)]
pub struct ParseCache {
    entry: Option<(Fingerprint, Document)>,
    hits: u64,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed form of `bytes`, parsing and replacing the entry when the
    /// bytes differ from the cached ones.
    pub fn get_or_parse(&mut self, bytes: &[u8]) -> Result<&Document> {
        let key = Fingerprint::of(bytes);
        match self.entry.take() {
            Some((cached, doc)) if cached == key => {
                self.hits += 1;
                debug!(fingerprint = %key.short(), "parse cache hit");
                Ok(&self.entry.insert((cached, doc)).1)
            }
            _ => {
                let doc = load_document(bytes)?;
                debug!(fingerprint = %key.short(), "parse cache filled");
                Ok(&self.entry.insert((key, doc)).1)
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_cached(&self, bytes: &[u8]) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|(key, _)| *key == Fingerprint::of(bytes))
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// Render engine, password prompt, configuration and parse cache for a
/// sequence of operations on one document at a time.
pub struct FixSession {
    engine: Box<dyn RenderEngine>,
    prompt: Box<dyn PasswordPrompt>,
    config: FixConfig,
    cache: ParseCache,
    cancel: CancelFlag,
}

impl FixSession {
    pub fn new(engine: Box<dyn RenderEngine>, prompt: Box<dyn PasswordPrompt>, config: FixConfig) -> Self {
        Self {
            engine,
            prompt,
            config,
            cache: ParseCache::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Session over the best available engine that never prompts.
    pub fn with_defaults(config: FixConfig) -> Self {
        Self::new(default_engine(), Box::new(NoPrompt), config)
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    /// Flag checked by long-running operations; replaced for each job.
    pub fn set_cancel_flag(&mut self, cancel: CancelFlag) {
        self.cancel = cancel;
    }

    /// Run the full preparation pipeline on `raw`.
    #[instrument(skip_all, fields(bytes_len = raw.len()))]
    pub fn prepare(&mut self, raw: &[u8]) -> Result<PreparedPdf> {
        let ctx = FixContext::new(self.engine.as_ref(), self.prompt.as_ref(), &self.config)
            .with_cancel(&self.cancel);
        let parsed = self.cache.get_or_parse(raw);
        let normalized = match &parsed {
            Ok(doc) => normalize_document(doc, raw, ctx.config),
            Err(e) => {
                warn!(error = %e, "document does not parse, skipping protection probe");
                unchanged(raw, Vec::new())
            }
        };
        let reuse = match parsed {
            Ok(doc) if !normalized.bypass_applied => Some(doc),
            _ => None,
        };
        prepare_normalized(normalized, reuse, &ctx)
    }

    pub fn auto_fix(&mut self, raw: &[u8]) -> Result<AutoFixResult> {
        self.prepare(raw).map(|prepared| prepared.fix)
    }

    /// Page issues of `bytes`; nothing when they do not parse.
    pub fn detect_issues(&mut self, bytes: &[u8]) -> Vec<PageIssue> {
        match self.cache.get_or_parse(bytes) {
            Ok(doc) => detect_document_issues(doc, &self.config),
            Err(e) => {
                warn!(error = %e, "cannot read page count, reporting no issues");
                Vec::new()
            }
        }
    }

    /// Apply `modifications` to a copy of the cached document and
    /// serialize it.
    pub fn apply_modifications(&mut self, bytes: &[u8], modifications: &[PageModification]) -> Result<Vec<u8>> {
        validate_modifications(modifications)?;
        let run = |cache: &mut ParseCache, config: &FixConfig| {
            let mut doc = cache.get_or_parse(bytes)?.clone();
            apply_to_document(&mut doc, modifications);
            save_document(&mut doc, config)
        };
        run(&mut self.cache, &self.config).map_err(|e| e.at_stage(FixStage::Modification))
    }

    /// Geometry of every page, for previews.
    pub fn page_summaries(&mut self, bytes: &[u8]) -> Result<Vec<PageSummary>> {
        page_summaries(self.cache.get_or_parse(bytes)?)
    }
}
