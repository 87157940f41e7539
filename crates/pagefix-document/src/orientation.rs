// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text orientation detector — the dominant reading direction of each
// page, voted from the transforms of its text items.

use pagefix_core::TextAngle;
use pagefix_core::error::Result;
use pagefix_core::geometry::{RIGHT_ANGLES, text_item_angle};
use pagefix_render::{PasswordPrompt, RenderEngine, TextItem, open_with_prompt};
use tracing::{debug, instrument, warn};

/// Dominant text angle of one page's items, `None` when nothing votes.
///
/// Every non-empty item whose direction is within `tolerance` degrees of
/// a right angle votes for that angle with weight `max(1, trimmed length)`.
/// Ties go to the earlier right angle.
pub fn dominant_angle(items: &[TextItem], tolerance: f64) -> TextAngle {
    let mut histogram = [0usize; 4];
    for item in items {
        if item.text.is_empty() || item.transform.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let [a, b, ..] = item.transform;
        let Some(angle) = text_item_angle(a, b, tolerance) else {
            continue;
        };
        let slot = (angle / 90) as usize;
        histogram[slot] += item.text.trim().chars().count().max(1);
    }

    let (best, weight) = histogram
        .iter()
        .enumerate()
        .fold((0, 0), |best, (slot, &w)| if w > best.1 { (slot, w) } else { best });
    (weight > 0).then_some(RIGHT_ANGLES[best])
}

/// Dominant text angle of every page in `bytes`.
///
/// The engine receives its own copy of the buffer. Locked documents go
/// through `prompt`; a declined prompt fails with `PasswordRequired`.
#[instrument(skip_all, fields(engine = engine.name(), bytes_len = bytes.len()))]
pub fn detect_text_angles(
    engine: &dyn RenderEngine,
    prompt: &dyn PasswordPrompt,
    bytes: &[u8],
    tolerance: f64,
) -> Result<Vec<TextAngle>> {
    let document = open_with_prompt(engine, bytes, prompt)?;
    let angles: Vec<TextAngle> = (0..document.page_count())
        .map(|page| match document.text_items(page) {
            Ok(items) => dominant_angle(&items, tolerance),
            Err(e) => {
                warn!(page, error = %e, "text items unavailable, angle unknown");
                None
            }
        })
        .collect();
    debug!(pages = angles.len(), ?angles, "text angles detected");
    Ok(angles)
}
