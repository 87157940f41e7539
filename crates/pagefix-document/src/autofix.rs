// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural auto-fixer.
//
// Works on the object graph: every page gets a rotation of 0 or 180 chosen
// from the dominant text angle, then is scaled and centered into the target
// box. A second pass re-detects text angles on the first-pass output and
// turns pages that still read upside down.

use lopdf::Document;
use pagefix_core::error::{FixStage, PagefixError, Result};
use pagefix_core::geometry::{choose_final_page_rotation_for_portrait, is_upside_down};
use pagefix_core::{AutoFixResult, FixType, FixTypesByPage, PaperSize, TextAngle};
use tracing::{debug, info, instrument, warn};

use crate::context::FixContext;
use crate::issues::detect_issues;
use crate::orientation::detect_text_angles;
use crate::pdf::page::{fit_page_to_box, load_document, page_ids, page_rotation, save_document, set_page_rotation};

/// Parse `bytes` and run the structural fix on them.
pub fn structural_auto_fix(bytes: &[u8], ctx: &FixContext<'_>) -> Result<AutoFixResult> {
    let doc = load_document(bytes).map_err(|e| e.at_stage(FixStage::StructuralFix))?;
    fix_document(doc, bytes, ctx)
}

/// Run the structural fix on `doc`, which was parsed from `bytes`.
///
/// Any page that cannot be read or mutated fails the whole fix.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn fix_document(doc: Document, bytes: &[u8], ctx: &FixContext<'_>) -> Result<AutoFixResult> {
    run(doc, bytes, ctx).map_err(|e| e.at_stage(FixStage::StructuralFix))
}

fn run(mut doc: Document, bytes: &[u8], ctx: &FixContext<'_>) -> Result<AutoFixResult> {
    if doc.is_encrypted() {
        return Err(PagefixError::PdfError("document is still encrypted".into()));
    }
    let target = ctx.target();
    let ids = page_ids(&doc);
    let page_count = ids.len();
    let mut fixes = FixTypesByPage::new();

    let angles = text_angles(bytes, page_count, ctx)?;
    for (page, &id) in ids.iter().enumerate() {
        ctx.checkpoint()?;
        let current = page_rotation(&doc, id, page)?;
        let rotation = choose_final_page_rotation_for_portrait(current, angles[page]);
        if rotation != current {
            set_page_rotation(&mut doc, id, page, rotation)?;
            fixes.entry(page).or_default().insert(FixType::Rotation);
        }

        let outcome = fit_page_to_box(&mut doc, id, page, target)?;
        if outcome.resized(target, ctx.config.scaling_threshold_pt) {
            fixes.entry(page).or_default().insert(FixType::Scaling);
        }
        debug!(page, from = current, to = rotation, scale = outcome.transform.scale, "page fixed");
    }

    let first_pass = save_document(&mut doc, ctx.config)?;
    let output = correct_upside_down(first_pass, &mut fixes, ctx)?;

    let issues = detect_issues(&output, ctx.config);
    let rotated = fixes.values().filter(|set| set.contains(&FixType::Rotation)).count();
    let applied = !fixes.is_empty();
    let summary = applied.then(|| {
        format!(
            "{}/{} pages normalized to {}; {} page(s) auto-rotated",
            fixes.len(),
            page_count,
            paper_label(&ctx.config.target_paper),
            rotated
        )
    });
    if let Some(summary) = &summary {
        info!(summary, residual_issues = issues.len(), "structural fix complete");
    }

    Ok(AutoFixResult {
        bytes: output,
        page_count,
        issues,
        auto_fix_applied: applied,
        auto_fix_summary: summary,
        fix_types_by_page: fixes,
    })
}

/// Text angles for every page. Detection failures other than a declined
/// password leave every page unknown.
fn text_angles(bytes: &[u8], page_count: usize, ctx: &FixContext<'_>) -> Result<Vec<TextAngle>> {
    match detect_text_angles(ctx.engine, ctx.prompt, bytes, ctx.config.angle_tolerance_deg) {
        Ok(mut angles) => {
            if angles.len() != page_count {
                warn!(detected = angles.len(), page_count, "engine page count differs");
            }
            angles.resize(page_count, None);
            Ok(angles)
        }
        Err(e) if e.is_cancellation() => Err(e),
        Err(e) => {
            warn!(error = %e, "text angle detection failed, treating all pages as unknown");
            Ok(vec![None; page_count])
        }
    }
}

/// Second pass: pages whose re-detected text reads upside down are turned
/// another 180°. The input is returned as-is when nothing changes.
fn correct_upside_down(first_pass: Vec<u8>, fixes: &mut FixTypesByPage, ctx: &FixContext<'_>) -> Result<Vec<u8>> {
    ctx.checkpoint()?;
    let mut doc = load_document(&first_pass)?;
    let ids = page_ids(&doc);
    let angles = text_angles(&first_pass, ids.len(), ctx)?;
    let tolerance = ctx.config.angle_tolerance_deg.round() as u32;

    let mut corrected = 0usize;
    for (page, &id) in ids.iter().enumerate() {
        let Some(angle) = angles[page] else {
            continue;
        };
        let rotation = page_rotation(&doc, id, page)?;
        let visible = (angle + rotation) % 360;
        if is_upside_down(visible, tolerance) {
            set_page_rotation(&mut doc, id, page, rotation + 180)?;
            fixes.entry(page).or_default().insert(FixType::Rotation);
            corrected += 1;
            debug!(page, visible, "upside-down page turned");
        }
    }

    if corrected == 0 {
        return Ok(first_pass);
    }
    info!(corrected, "upside-down pages corrected");
    save_document(&mut doc, ctx.config)
}

fn paper_label(paper: &PaperSize) -> String {
    match paper {
        PaperSize::A4 => "A4".into(),
        PaperSize::A3 => "A3".into(),
        PaperSize::A5 => "A5".into(),
        PaperSize::Letter => "Letter".into(),
        PaperSize::Legal => "Legal".into(),
        PaperSize::Custom { width_pt, height_pt } => format!("{width_pt}x{height_pt}pt"),
    }
}
