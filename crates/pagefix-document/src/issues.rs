// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page issue detector — reports pages that deviate from the canonical
// portrait, upright, target-paper-sized page.

use lopdf::Document;
use pagefix_core::{FixConfig, IssueType, PageIssue};
use tracing::{debug, instrument, warn};

use crate::pdf::page::{load_document, page_box, page_ids, page_rotation};

const LANDSCAPE_BOX: &str = "Landscape Page Box";
const NON_A4_SIZE: &str = "Non-A4 Size";
const SIDEWAYS_ROTATION: &str = "Sideways Page Rotation";
const MALFORMED_PAGE: &str = "Malformed page object";

/// Issues in serialized PDF bytes. Bytes that do not parse report nothing.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn detect_issues(bytes: &[u8], config: &FixConfig) -> Vec<PageIssue> {
    match load_document(bytes) {
        Ok(doc) => detect_document_issues(&doc, config),
        Err(e) => {
            warn!(error = %e, "cannot read page count, reporting no issues");
            Vec::new()
        }
    }
}

/// Issues in an already parsed document, one entry per deviating page.
pub fn detect_document_issues(doc: &Document, config: &FixConfig) -> Vec<PageIssue> {
    let (target_w, target_h) = config.target_paper.dimensions_pt();
    let tolerance = config.size_tolerance_pt;

    let issues: Vec<PageIssue> = page_ids(doc)
        .into_iter()
        .enumerate()
        .filter_map(|(index, id)| {
            let geometry = page_box(doc, id, index).and_then(|mb| Ok((mb, page_rotation(doc, id, index)?)));
            let (mb, rotation) = match geometry {
                Ok(geometry) => geometry,
                Err(e) => {
                    warn!(page = index, error = %e, "page cannot be inspected");
                    return Some(PageIssue {
                        page_index: index,
                        issue_type: IssueType::Both,
                        description: MALFORMED_PAGE.to_string(),
                    });
                }
            };

            let (width, height) = (mb.width(), mb.height());
            let landscape = width > height;
            let sideways = rotation % 180 != 0;
            let wrong_size = (width - target_w).abs() > tolerance || (height - target_h).abs() > tolerance;

            let mut reasons = Vec::new();
            if landscape {
                reasons.push(LANDSCAPE_BOX);
            }
            if wrong_size {
                reasons.push(NON_A4_SIZE);
            }
            if sideways {
                reasons.push(SIDEWAYS_ROTATION);
            }

            let orientation = landscape || sideways;
            let issue_type = match (orientation, wrong_size) {
                (true, true) => IssueType::Both,
                (true, false) => IssueType::Orientation,
                (false, true) => IssueType::Size,
                (false, false) => return None,
            };
            Some(PageIssue {
                page_index: index,
                issue_type,
                description: reasons.join(", "),
            })
        })
        .collect();

    debug!(issues = issues.len(), "issue scan finished");
    issues
}
