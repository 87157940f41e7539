// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Modification applicator — user-driven rotate and fit-to-A4 edits.

use lopdf::Document;
use pagefix_core::error::{FixStage, PagefixError, Result};
use pagefix_core::{A4_HEIGHT, A4_WIDTH, FixConfig, PageModification};
use tracing::{debug, instrument, warn};

use crate::pdf::page::{fit_page_to_box, load_document, page_ids, page_rotation, save_document, set_page_rotation};

/// Reject edits no page could take: rotations that are not a multiple
/// of 90°.
pub fn validate_modifications(modifications: &[PageModification]) -> Result<()> {
    for modification in modifications {
        if let PageModification::Rotate { angle, .. } = modification
            && angle % 90 != 0
        {
            return Err(PagefixError::InvalidModification(format!(
                "rotation must be a multiple of 90 degrees, got {angle}"
            )));
        }
    }
    Ok(())
}

/// Apply `modifications` to serialized PDF bytes and serialize the result.
#[instrument(skip_all, fields(bytes_len = bytes.len(), modifications = modifications.len()))]
pub fn apply_modifications(bytes: &[u8], modifications: &[PageModification], config: &FixConfig) -> Result<Vec<u8>> {
    validate_modifications(modifications)?;
    let run = || {
        let mut doc = load_document(bytes)?;
        apply_to_document(&mut doc, modifications);
        save_document(&mut doc, config)
    };
    run().map_err(|e| e.at_stage(FixStage::Modification))
}

/// Apply `modifications` in order. A page that cannot take an edit is
/// skipped; the others still receive it. Returns the number of page edits
/// that succeeded.
pub fn apply_to_document(doc: &mut Document, modifications: &[PageModification]) -> usize {
    let ids = page_ids(doc);
    let mut applied = 0;

    for modification in modifications {
        for &page in modification.page_indices() {
            let Some(&id) = ids.get(page) else {
                warn!(page, pages = ids.len(), "modification targets a missing page");
                continue;
            };
            let outcome = match modification {
                PageModification::Rotate { angle, .. } => page_rotation(doc, id, page).and_then(|current| {
                    let rotation = (i64::from(current) + i64::from(*angle)).rem_euclid(360) as u32;
                    set_page_rotation(doc, id, page, rotation)
                }),
                PageModification::FitToA4 { .. } => {
                    fit_page_to_box(doc, id, page, (A4_WIDTH, A4_HEIGHT)).map(|_| ())
                }
            };
            match outcome {
                Ok(()) => applied += 1,
                Err(e) => warn!(page, error = %e, "page skipped"),
            }
        }
    }

    debug!(applied, "modifications applied");
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object;
    use pagefix_core::geometry::FitTransform;

    use crate::pdf::page::page_box;
    use crate::testing::{annotated_page_pdf, simple_pdf};

    fn rotations(bytes: &[u8]) -> Vec<u32> {
        let doc = load_document(bytes).unwrap();
        page_ids(&doc)
            .into_iter()
            .enumerate()
            .map(|(i, id)| page_rotation(&doc, id, i).unwrap())
            .collect()
    }

    #[test]
    fn rotations_accumulate_in_order() {
        let bytes = simple_pdf(&[(595.0, 842.0, 0), (595.0, 842.0, 90)]);
        let mods = vec![
            PageModification::Rotate {
                page_indices: vec![0, 1],
                angle: 90,
            },
            PageModification::Rotate {
                page_indices: vec![1],
                angle: 90,
            },
            PageModification::Rotate {
                page_indices: vec![0],
                angle: -180,
            },
        ];
        let out = apply_modifications(&bytes, &mods, &FixConfig::default()).unwrap();
        assert_eq!(rotations(&out), vec![270, 270]);
    }

    #[test]
    fn fit_maps_annotation_rect() {
        let (w, h) = (800.0_f32, 600.0_f32);
        let rect = [100.0_f32, 50.0, 300.0, 120.0];
        let bytes = annotated_page_pdf(w, h, rect);
        let out = apply_modifications(
            &bytes,
            &[PageModification::FitToA4 { page_indices: vec![0] }],
            &FixConfig::default(),
        )
        .unwrap();

        let fit = FitTransform::compute(w, h, A4_WIDTH, A4_HEIGHT).unwrap();
        let doc = load_document(&out).unwrap();
        let page = page_ids(&doc)[0];
        let mb = page_box(&doc, page, 0).unwrap();
        assert_eq!((mb.width(), mb.height()), (A4_WIDTH, A4_HEIGHT));

        let annots = doc.get_dictionary(page).unwrap().get(b"Annots").unwrap().as_array().unwrap();
        let annot = doc.get_dictionary(annots[0].as_reference().unwrap()).unwrap();
        let got: Vec<f32> = annot
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_float().unwrap())
            .collect();
        let want = [
            rect[0] * fit.scale + fit.dx,
            rect[1] * fit.scale + fit.dy,
            rect[2] * fit.scale + fit.dx,
            rect[3] * fit.scale + fit.dy,
        ];
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-2, "{g} vs {w}");
        }
    }

    #[test]
    fn bad_page_is_skipped() {
        let mut doc = load_document(&simple_pdf(&[(612.0, 792.0, 0), (612.0, 792.0, 0)])).unwrap();
        let ids = page_ids(&doc);
        doc.get_object_mut(ids[0])
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("MediaBox", "broken");

        let applied = apply_to_document(
            &mut doc,
            &[PageModification::FitToA4 {
                page_indices: vec![0, 1, 7],
            }],
        );
        assert_eq!(applied, 1);
        let mb = page_box(&doc, ids[1], 1).unwrap();
        assert_eq!((mb.width(), mb.height()), (A4_WIDTH, A4_HEIGHT));
    }

    #[test]
    fn odd_angle_is_rejected() {
        let err = apply_modifications(
            &simple_pdf(&[(595.0, 842.0, 0)]),
            &[PageModification::Rotate {
                page_indices: vec![0],
                angle: 45,
            }],
            &FixConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PagefixError::InvalidModification(_)));
    }
}
