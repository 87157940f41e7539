// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Normalization pipeline.
//
// raw bytes -> security normalizer -> readability probe
//   -> structural fix, or rasterization when the probe or the fix fails
//
// Fallbacks are ordered `Strategy` lists run by `first_success`.

use lopdf::Document;
use pagefix_core::error::{PagefixError, Result};
use pagefix_core::{AutoFixResult, NormalizedPdf, PreparedPdf};
use tracing::{info, instrument, warn};

use crate::autofix::fix_document;
use crate::context::FixContext;
use crate::issues::detect_issues;
use crate::pdf::page::load_document;
use crate::raster::{probe_document, rasterize_document};
use crate::unlock::{normalize_document, unchanged};

/// One way of producing `O` from `I`.
pub trait Strategy<I: ?Sized, O> {
    fn name(&self) -> &'static str;
    fn attempt(&self, input: &I) -> Result<O>;
}

/// A strategy that did not produce a result.
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub error: PagefixError,
}

/// Try `strategies` in order and return the first success with the name
/// of the strategy that produced it. Cancellation stops the chain at once.
/// When nothing succeeds every failure is returned, in order.
pub fn first_success<I: ?Sized, O>(
    strategies: &[&dyn Strategy<I, O>],
    input: &I,
) -> std::result::Result<(&'static str, O), Vec<StrategyFailure>> {
    let mut failures = Vec::new();
    for strategy in strategies {
        match strategy.attempt(input) {
            Ok(output) => return Ok((strategy.name(), output)),
            Err(error) => {
                let cancelled = error.is_cancellation();
                warn!(strategy = strategy.name(), %error, "strategy failed");
                failures.push(StrategyFailure {
                    strategy: strategy.name(),
                    error,
                });
                if cancelled {
                    break;
                }
            }
        }
    }
    Err(failures)
}

/// The error to report for a failed chain: the last failure.
pub fn final_error(mut failures: Vec<StrategyFailure>) -> PagefixError {
    failures
        .pop()
        .map(|f| f.error)
        .unwrap_or_else(|| PagefixError::PdfError("no strategy was attempted".into()))
}

/// Bytes to fix, with the parsed document when one is already at hand.
pub struct FixInput<'a> {
    pub bytes: &'a [u8],
    pub parsed: Option<&'a Document>,
}

impl FixInput<'_> {
    fn document(&self) -> Result<Document> {
        match self.parsed {
            Some(doc) => Ok(doc.clone()),
            None => load_document(self.bytes),
        }
    }
}

/// Output of a fix strategy.
struct Fixed {
    result: AutoFixResult,
    image_only: bool,
}

struct Structural<'c, 'a>(&'c FixContext<'a>);

impl Strategy<FixInput<'_>, Fixed> for Structural<'_, '_> {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn attempt(&self, input: &FixInput<'_>) -> Result<Fixed> {
        let doc = input.document()?;
        probe_document(&doc)?;
        let result = fix_document(doc, input.bytes, self.0)?;
        Ok(Fixed {
            result,
            image_only: false,
        })
    }
}

struct Rasterize<'c, 'a>(&'c FixContext<'a>);

impl Strategy<FixInput<'_>, Fixed> for Rasterize<'_, '_> {
    fn name(&self) -> &'static str {
        "rasterize"
    }

    fn attempt(&self, input: &FixInput<'_>) -> Result<Fixed> {
        let raster = rasterize_document(input.bytes, self.0)?;
        let issues = detect_issues(&raster.bytes, self.0.config);
        Ok(Fixed {
            result: AutoFixResult {
                bytes: raster.bytes,
                page_count: raster.page_count,
                issues,
                auto_fix_applied: true,
                auto_fix_summary: Some(format!(
                    "{} page(s) rasterized to images; text is no longer selectable",
                    raster.page_count
                )),
                fix_types_by_page: Default::default(),
            },
            image_only: true,
        })
    }
}

/// Run the fix strategies on already normalized bytes.
pub fn prepare_normalized(normalized: NormalizedPdf, parsed: Option<&Document>, ctx: &FixContext<'_>) -> Result<PreparedPdf> {
    let input = FixInput {
        bytes: &normalized.bytes,
        parsed,
    };
    let structural = Structural(ctx);
    let rasterize = Rasterize(ctx);
    let chain: [&dyn Strategy<FixInput<'_>, Fixed>; 2] = [&structural, &rasterize];
    let (strategy, fixed) = first_success(&chain, &input).map_err(final_error)?;

    if fixed.image_only {
        warn!(pages = fixed.result.page_count, "document rasterized, output is image-only");
    }
    info!(strategy, pages = fixed.result.page_count, "document prepared");
    Ok(PreparedPdf {
        bytes: fixed.result.bytes.clone(),
        page_count: fixed.result.page_count,
        image_only: fixed.image_only,
        bypass_reasons: normalized.reasons,
        bypass_applied: normalized.bypass_applied,
        fix: fixed.result,
    })
}

/// Turn arbitrary PDF bytes into an editable, upright, target-sized
/// document, degrading to rasterization when the structure is unusable.
#[instrument(skip_all, fields(bytes_len = raw.len()))]
pub fn prepare_editable_pdf_bytes(raw: &[u8], ctx: &FixContext<'_>) -> Result<PreparedPdf> {
    let parsed = load_document(raw);
    let normalized = match &parsed {
        Ok(doc) => normalize_document(doc, raw, ctx.config),
        Err(e) => {
            warn!(error = %e, "document does not parse, skipping protection probe");
            unchanged(raw, Vec::new())
        }
    };
    let reuse = if normalized.bypass_applied { None } else { parsed.as_ref().ok() };
    prepare_normalized(normalized, reuse, ctx)
}

/// Full pipeline, reporting only the fix result.
pub fn auto_fix(raw: &[u8], ctx: &FixContext<'_>) -> Result<AutoFixResult> {
    prepare_editable_pdf_bytes(raw, ctx).map(|prepared| prepared.fix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefix_core::{A4_HEIGHT, A4_WIDTH, BypassReason, FixConfig, FixStage, FixType};
    use pagefix_render::{ContentTextEngine, NoPrompt};

    use crate::pdf::page::{page_box, page_ids, page_rotation};
    use crate::testing::{
        CountingPrompt, LockedSolidEngine, PageSpec, SolidEngine, encrypted_pdf, pages_pdf, simple_pdf,
    };

    struct Always(&'static str, bool);

    impl Strategy<u32, u32> for Always {
        fn name(&self) -> &'static str {
            self.0
        }
        fn attempt(&self, input: &u32) -> Result<u32> {
            if self.1 {
                Ok(input + 1)
            } else {
                Err(PagefixError::PdfError(self.0.into()))
            }
        }
    }

    struct Declined;

    impl Strategy<u32, u32> for Declined {
        fn name(&self) -> &'static str {
            "declined"
        }
        fn attempt(&self, _input: &u32) -> Result<u32> {
            Err(PagefixError::PasswordRequired)
        }
    }

    #[test]
    fn chain_stops_at_first_success() {
        let (a, b, c) = (Always("a", false), Always("b", true), Always("c", true));
        let chain: [&dyn Strategy<u32, u32>; 3] = [&a, &b, &c];
        assert_eq!(first_success(&chain, &1).unwrap(), ("b", 2));
    }

    #[test]
    fn chain_collects_every_failure() {
        let (a, b) = (Always("a", false), Always("b", false));
        let chain: [&dyn Strategy<u32, u32>; 2] = [&a, &b];
        let failures = first_success(&chain, &1).unwrap_err();
        let names: Vec<_> = failures.iter().map(|f| f.strategy).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(final_error(failures).to_string(), "PDF operation failed: b");
    }

    #[test]
    fn cancellation_ends_chain() {
        let ok = Always("ok", true);
        let chain: [&dyn Strategy<u32, u32>; 2] = [&Declined, &ok];
        let failures = first_success(&chain, &1).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert!(final_error(failures).is_cancellation());
    }

    fn a4_pages(bytes: &[u8]) -> bool {
        let doc = load_document(bytes).unwrap();
        page_ids(&doc)
            .into_iter()
            .enumerate()
            .all(|(i, id)| {
                let mb = page_box(&doc, id, i).unwrap();
                (mb.width(), mb.height()) == (A4_WIDTH, A4_HEIGHT)
            })
    }

    #[test]
    fn rotated_landscape_document_is_fixed_structurally() {
        let config = FixConfig::default();
        let ctx = FixContext::new(&ContentTextEngine, &NoPrompt, &config);
        let bytes = pages_pdf(&[PageSpec::new(842.0, 595.0, 90).text_at(90.0)]);

        let prepared = prepare_editable_pdf_bytes(&bytes, &ctx).unwrap();
        assert!(!prepared.image_only);
        assert!(!prepared.bypass_applied);
        assert!(a4_pages(&prepared.bytes));

        let doc = load_document(&prepared.bytes).unwrap();
        assert_eq!(page_rotation(&doc, page_ids(&doc)[0], 0).unwrap(), 0);
        let fixes = &prepared.fix.fix_types_by_page[&0];
        assert!(fixes.contains(&FixType::Rotation) && fixes.contains(&FixType::Scaling));
    }

    #[test]
    fn fixed_output_has_no_issues() {
        let config = FixConfig::default();
        let ctx = FixContext::new(&ContentTextEngine, &NoPrompt, &config);
        let bytes = simple_pdf(&[(612.0, 792.0, 0), (1008.0, 612.0, 270), (420.0, 595.0, 180)]);
        let fixed = auto_fix(&bytes, &ctx).unwrap();
        assert!(fixed.auto_fix_applied);
        assert_eq!(fixed.page_count, 3);
        assert!(detect_issues(&fixed.bytes, &config).is_empty());
    }

    #[test]
    fn encrypted_input_is_unlocked_then_fixed() {
        let config = FixConfig::default();
        let ctx = FixContext::new(&ContentTextEngine, &NoPrompt, &config);
        let prepared = prepare_editable_pdf_bytes(&encrypted_pdf(b""), &ctx).unwrap();
        assert_eq!(prepared.bypass_reasons, vec![BypassReason::Encryption]);
        assert!(prepared.bypass_applied);
        assert!(a4_pages(&prepared.bytes));
    }

    fn locked_engine() -> LockedSolidEngine {
        LockedSolidEngine {
            secret: "s3cret",
            inner: SolidEngine {
                sizes: vec![(612.0, 792.0)],
            },
        }
    }

    #[test]
    fn user_password_is_asked_for_and_rasterized() {
        let config = FixConfig {
            raster_dpi: 24.0,
            ..FixConfig::default()
        };
        let engine = locked_engine();
        let prompt = CountingPrompt::answering(Some("s3cret"));
        let ctx = FixContext::new(&engine, &prompt, &config);

        let prepared = prepare_editable_pdf_bytes(&encrypted_pdf(b"s3cret"), &ctx).unwrap();
        assert!(prepared.image_only);
        assert_eq!(prepared.page_count, 1);
        assert_eq!(prepared.bypass_reasons, vec![BypassReason::Encryption]);
        assert!(!prepared.bypass_applied);
        assert!(prompt.asked() >= 1);
        assert!(a4_pages(&prepared.bytes));
    }

    #[test]
    fn declined_password_cancels() {
        let config = FixConfig::default();
        let engine = locked_engine();
        let prompt = CountingPrompt::answering(None);
        let ctx = FixContext::new(&engine, &prompt, &config);

        let err = prepare_editable_pdf_bytes(&encrypted_pdf(b"s3cret"), &ctx).unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(prompt.asked(), 1);
    }

    #[test]
    fn unreadable_structure_falls_back_to_raster() {
        let config = FixConfig {
            raster_dpi: 24.0,
            ..FixConfig::default()
        };
        let engine = SolidEngine {
            sizes: vec![(612.0, 792.0), (792.0, 612.0)],
        };
        let ctx = FixContext::new(&engine, &NoPrompt, &config);

        let prepared = prepare_editable_pdf_bytes(b"%PDF-1.4\n1 0 obj <</Type /Catalog", &ctx).unwrap();
        assert!(prepared.image_only);
        assert_eq!(prepared.page_count, 2);
        assert_eq!(page_ids(&load_document(&prepared.bytes).unwrap()).len(), 2);
        assert!(a4_pages(&prepared.bytes));
    }

    #[test]
    fn missing_page_boxes_fall_back_to_raster() {
        let mut doc = load_document(&simple_pdf(&[(612.0, 792.0, 0)])).unwrap();
        let id = page_ids(&doc)[0];
        doc.get_object_mut(id)
            .and_then(lopdf::Object::as_dict_mut)
            .unwrap()
            .set("MediaBox", "broken");
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let config = FixConfig {
            raster_dpi: 24.0,
            ..FixConfig::default()
        };
        let engine = SolidEngine {
            sizes: vec![(612.0, 792.0)],
        };
        let prepared = prepare_editable_pdf_bytes(&bytes, &FixContext::new(&engine, &NoPrompt, &config)).unwrap();
        assert!(prepared.image_only);
        assert_eq!(prepared.page_count, 1);
    }

    #[test]
    fn no_rasterizer_is_terminal() {
        let config = FixConfig::default();
        let ctx = FixContext::new(&ContentTextEngine, &NoPrompt, &config);
        let err = prepare_editable_pdf_bytes(b"definitely not a pdf", &ctx).unwrap_err();
        assert!(matches!(
            err,
            PagefixError::AutoFixFailed {
                stage: FixStage::Rasterization,
                ..
            }
        ));
    }
}
