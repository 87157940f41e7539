// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security normalizer — removes encryption, certification and signature
// structures that would block editing.
//
// Remediation escalates: copy every page into a fresh document; failing
// that, strip the protection entries in place; failing that, hand back the
// original bytes with the reasons still reported.

use lopdf::Document;
use pagefix_core::error::{PagefixError, Result};
use pagefix_core::{BypassReason, FixConfig, NormalizedPdf};
use pagefix_security::{detect_protection, strip_protection};
use tracing::{info, instrument, warn};

use crate::pdf::copy::copy_all_pages;
use crate::pdf::page::{load_document, save_document};
use crate::pipeline::{Strategy, first_success};

/// Make `bytes` editable. Unprotected or unparseable input comes back
/// byte-for-byte unchanged with `bypass_applied == false`.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn normalize_pdf_for_editing(bytes: &[u8], config: &FixConfig) -> NormalizedPdf {
    match load_document(bytes) {
        Ok(doc) => normalize_document(&doc, bytes, config),
        Err(e) => {
            warn!(error = %e, "protection probe could not parse document");
            unchanged(bytes, Vec::new())
        }
    }
}

/// [`normalize_pdf_for_editing`] for a document already parsed from `bytes`.
pub fn normalize_document(doc: &Document, bytes: &[u8], config: &FixConfig) -> NormalizedPdf {
    let reasons = detect_protection(doc);
    if reasons.is_empty() {
        return unchanged(bytes, reasons);
    }
    info!(?reasons, "document is protected, removing protections");

    let fresh = CopyToFresh(config);
    let strip = StripInPlace(config);
    let chain: [&dyn Strategy<Document, Vec<u8>>; 2] = [&fresh, &strip];
    match first_success(&chain, doc) {
        Ok((strategy, output)) => {
            info!(strategy, output_bytes = output.len(), "protections removed");
            NormalizedPdf {
                bytes: output,
                reasons,
                bypass_applied: true,
            }
        }
        Err(_) => {
            warn!("every remediation failed, keeping original bytes");
            unchanged(bytes, reasons)
        }
    }
}

/// The input as-is, reporting `reasons` without having bypassed anything.
pub fn unchanged(bytes: &[u8], reasons: Vec<BypassReason>) -> NormalizedPdf {
    NormalizedPdf {
        bytes: bytes.to_vec(),
        reasons,
        bypass_applied: false,
    }
}

fn ensure_readable(doc: &Document) -> Result<()> {
    if doc.is_encrypted() {
        return Err(PagefixError::PdfError("document is still encrypted".into()));
    }
    Ok(())
}

/// Copy every page into a new document, leaving document-level
/// protection structures behind.
struct CopyToFresh<'a>(&'a FixConfig);

impl Strategy<Document, Vec<u8>> for CopyToFresh<'_> {
    fn name(&self) -> &'static str {
        "copy-to-fresh"
    }

    fn attempt(&self, doc: &Document) -> Result<Vec<u8>> {
        ensure_readable(doc)?;
        let mut fresh = copy_all_pages(doc)?;
        save_document(&mut fresh, self.0)
    }
}

/// Delete the protection entries from the document itself.
struct StripInPlace<'a>(&'a FixConfig);

impl Strategy<Document, Vec<u8>> for StripInPlace<'_> {
    fn name(&self) -> &'static str {
        "strip-in-place"
    }

    fn attempt(&self, doc: &Document) -> Result<Vec<u8>> {
        ensure_readable(doc)?;
        let mut doc = doc.clone();
        strip_protection(&mut doc).map_err(|e| PagefixError::PdfError(e.to_string()))?;
        save_document(&mut doc, self.0)
    }
}
