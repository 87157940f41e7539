// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page copying between lopdf documents.
//
// Pages are deep-cloned together with every object they reference. A
// per-source memo maps source object ids to their copies, so shared
// resources are copied once and reference cycles (annotation `/P`
// back-links, `/Popup` pairs) terminate.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pagefix_core::error::{PagefixError, Result};
use tracing::{debug, instrument, warn};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// An empty document with a catalog and an empty page tree.
pub fn new_document_shell() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

/// Copies pages from one source document into a target document.
pub struct PageCopier<'s> {
    source: &'s Document,
    memo: HashMap<ObjectId, ObjectId>,
}

impl<'s> PageCopier<'s> {
    pub fn new(source: &'s Document) -> Self {
        Self {
            source,
            memo: HashMap::new(),
        }
    }

    /// Append a copy of `page_id` to the page tree `pages_id` of `target`.
    /// Returns the new page's id.
    pub fn copy_page(&mut self, target: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> Result<ObjectId> {
        let page = self.source.get_dictionary(page_id).map_err(|err| {
            PagefixError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        let mut page = page.clone();
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = self.inherited(page_id, key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }

        // Reserve the id first so back-references from annotations resolve
        // to the new page.
        let new_page_id = target.new_object_id();
        self.memo.insert(page_id, new_page_id);
        let mut cloned = self.clone_dictionary(target, &page);
        cloned.set("Parent", Object::Reference(pages_id));
        target.objects.insert(new_page_id, Object::Dictionary(cloned));

        append_kid(target, pages_id, new_page_id)?;
        Ok(new_page_id)
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&'s Object> {
        let mut current = self
            .source
            .get_dictionary(page_id)
            .ok()?
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok();
        let mut hops = 0;
        while let Some(id) = current {
            hops += 1;
            if hops > 64 {
                return None;
            }
            let dict = self.source.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut new_dict = Dictionary::new();
        for (key, value) in dict.iter() {
            // /Parent is patched by the caller for pages; for anything else
            // it would drag in the source page tree.
            if key == b"Parent" {
                continue;
            }
            new_dict.set(key.clone(), self.clone_object(target, value));
        }
        new_dict
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(target, dict)),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.clone_object(target, item)).collect()),
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(target, &stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            Object::Reference(ref_id) => {
                if let Some(&mapped) = self.memo.get(ref_id) {
                    return Object::Reference(mapped);
                }
                match self.source.get_object(*ref_id) {
                    Ok(referenced) => {
                        let new_id = target.new_object_id();
                        self.memo.insert(*ref_id, new_id);
                        let cloned = self.clone_object(target, referenced);
                        target.objects.insert(new_id, cloned);
                        Object::Reference(new_id)
                    }
                    Err(err) => {
                        warn!(?ref_id, %err, "cannot resolve reference, using Null");
                        Object::Null
                    }
                }
            }
            other => other.clone(),
        }
    }
}

fn append_kid(target: &mut Document, pages_id: ObjectId, kid: ObjectId) -> Result<()> {
    let pages = target
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| PagefixError::PdfError(format!("no page tree: {err}")))?;
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.push(Object::Reference(kid)),
        _ => pages.set("Kids", vec![Object::Reference(kid)]),
    }
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + 1);
    Ok(())
}

/// A fresh document holding copies of every page of `source`, in order.
#[instrument(skip_all, fields(pages = source.get_pages().len()))]
pub fn copy_all_pages(source: &Document) -> Result<Document> {
    let (mut target, pages_id) = new_document_shell();
    let mut copier = PageCopier::new(source);
    for page_id in source.get_pages().into_values() {
        copier.copy_page(&mut target, pages_id, page_id)?;
    }
    debug!(objects = target.objects.len(), "pages copied into fresh document");
    Ok(target)
}
