use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};

use crate::error::ProcessError;
use crate::processor::{finish_document, inherited_attribute};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

#[derive(Debug, Clone)]
pub struct MergedPdf {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// Copies inherited attributes onto each page so the page keeps rendering the
/// same once it's moved under a new parent.
fn materialize_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let missing: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter_map(|key| {
                let own = doc
                    .get_dictionary(page_id)
                    .map(|d| d.has(key))
                    .unwrap_or(true);
                if own {
                    return None;
                }
                inherited_attribute(doc, page_id, key).map(|value| (*key, value))
            })
            .collect();

        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in missing {
                page.set(key.to_vec(), value);
            }
        }
    }
}

fn is_structural(object: &Object) -> bool {
    matches!(
        object.type_name(),
        Ok(b"Catalog") | Ok(b"Pages") | Ok(b"Outlines") | Ok(b"Outline")
    )
}

/// Concatenates the pages of `documents` in order into one PDF.
pub fn merge_documents(documents: Vec<Document>) -> Result<MergedPdf, ProcessError> {
    if documents.is_empty() {
        return Err(ProcessError::Merge("no documents to merge".to_string()));
    }

    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        materialize_inherited(&mut doc);
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        page_ids.extend(doc.get_pages().into_values());
        objects.extend(
            doc.objects
                .into_iter()
                .filter(|(_, object)| !is_structural(object)),
        );
    }

    if page_ids.is_empty() {
        return Err(ProcessError::Merge("documents contain no pages".to_string()));
    }

    let mut merged = Document::with_version("1.5");
    merged.max_id = objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    merged.objects = objects;
    let pages_id = merged.new_object_id();

    for page_id in &page_ids {
        let page = merged
            .get_dictionary_mut(*page_id)
            .map_err(|e| ProcessError::Merge(format!("page {:?} missing: {}", page_id, e)))?;
        page.set("Parent", pages_id);
    }

    let page_count = page_ids.len() as u32;
    let bytes = finish_document(merged, pages_id, page_ids)
        .map_err(|e| ProcessError::Merge(e.to_string()))?;

    Ok(MergedPdf { bytes, page_count })
}
