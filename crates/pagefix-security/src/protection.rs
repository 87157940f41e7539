// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Protection structures — detect and strip encryption, certification and
// signature markers that block programmatic editing.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pagefix_core::BypassReason;
use tracing::{debug, warn};

/// Limit on nested `/Kids` levels in the form field tree.
const MAX_FIELD_DEPTH: usize = 64;

/// Every reason `doc` is protected. Each probe is independent; a probe
/// that cannot read its structures reports nothing.
pub fn detect_protection(doc: &Document) -> Vec<BypassReason> {
    let mut reasons = Vec::new();
    if is_encrypted(doc) {
        reasons.push(BypassReason::Encryption);
    }
    if has_certification(doc) {
        reasons.push(BypassReason::Certification);
    }
    if has_signature(doc) {
        reasons.push(BypassReason::Signature);
    }
    debug!(?reasons, "protection probe finished");
    reasons
}

/// The trailer still carries `/Encrypt`, or the parser decrypted the
/// document while loading it.
pub fn is_encrypted(doc: &Document) -> bool {
    doc.is_encrypted() || doc.encryption_state.is_some()
}

/// The catalog carries a `/Perms` dictionary (DocMDP certification or
/// UR usage rights).
pub fn has_certification(doc: &Document) -> bool {
    doc.catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Perms").ok())
        .and_then(|perms| resolve_dict(doc, perms))
        .is_some()
}

/// AcroForm `/SigFlags` is set, or some field is a signature field or
/// carries a non-empty value dictionary.
pub fn has_signature(doc: &Document) -> bool {
    let Some(acroform) = acroform(doc) else {
        return false;
    };

    if let Ok(flags) = acroform.get(b"SigFlags").and_then(Object::as_i64)
        && flags != 0
    {
        return true;
    }

    let Some(fields) = acroform
        .get(b"Fields")
        .ok()
        .and_then(|f| resolve_array(doc, f))
    else {
        return false;
    };

    let mut visited = HashSet::new();
    fields
        .iter()
        .any(|field| field_is_signed(doc, field, &mut visited, 0))
}

fn field_is_signed(
    doc: &Document,
    field: &Object,
    visited: &mut HashSet<ObjectId>,
    depth: usize,
) -> bool {
    if depth > MAX_FIELD_DEPTH {
        warn!(depth, "form field tree too deep, stopping traversal");
        return false;
    }
    if let Object::Reference(id) = field
        && !visited.insert(*id)
    {
        return false;
    }
    let Some(dict) = resolve_dict(doc, field) else {
        return false;
    };

    if dict
        .get(b"FT")
        .and_then(Object::as_name)
        .is_ok_and(|ft| ft == b"Sig")
    {
        return true;
    }
    if let Ok(value) = dict.get(b"V")
        && resolve_dict(doc, value).is_some_and(|v| !v.is_empty())
    {
        return true;
    }

    dict.get(b"Kids")
        .ok()
        .and_then(|kids| resolve_array(doc, kids))
        .is_some_and(|kids| {
            kids.iter()
                .any(|kid| field_is_signed(doc, kid, visited, depth + 1))
        })
}

/// Remove `/Perms`, AcroForm `/SigFlags` and the trailer `/Encrypt`
/// reference in place. Missing structures are skipped.
pub fn strip_protection(doc: &mut Document) -> lopdf::Result<()> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;

    let acroform_ref = {
        let catalog = doc.get_object_mut(root_id)?.as_dict_mut()?;
        catalog.remove(b"Perms");
        match catalog.get_mut(b"AcroForm") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(form)) => {
                form.remove(b"SigFlags");
                None
            }
            _ => None,
        }
    };

    if let Some(id) = acroform_ref
        && let Ok(form) = doc.get_object_mut(id).and_then(Object::as_dict_mut)
    {
        form.remove(b"SigFlags");
    }

    doc.trailer.remove(b"Encrypt");
    Ok(())
}

fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

fn resolve_array<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Vec<Object>> {
    match obj {
        Object::Array(items) => Some(items),
        Object::Reference(id) => doc.get_object(*id).and_then(Object::as_array).ok(),
        _ => None,
    }
}
