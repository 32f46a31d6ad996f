//! PDF rewrite step
//!
//! Copies every page of an existing PDF into a fresh document, optionally
//! attaching a title and compressing streams. Page content is carried over
//! unchanged.

use crate::error::ConvertError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::BTreeMap;

/// Producer recorded whenever a title is attached
pub const PRODUCER: &str = "Image to PDF Converter by imagejoin";

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards the parent walk against cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Attached as document metadata when non-empty
    pub title: Option<String>,
    /// Apply the fixed stream compression
    pub compress: bool,
}

/// Copy all pages of `bytes` into a new PDF
pub fn rewrite_pdf(bytes: &[u8], options: &RewriteOptions) -> Result<Vec<u8>, ConvertError> {
    let source = Document::load_mem(bytes)
        .map_err(|e| ConvertError::PdfProcessing(format!("Failed to parse PDF: {}", e)))?;

    let mut dest = Document::with_version(source.version.clone());
    let pages_id = dest.new_object_id();
    let mut copied = BTreeMap::new();
    let mut kids = Vec::new();

    for (page_num, page_id) in source.get_pages() {
        let page = source.get_dictionary(page_id).map_err(|e| {
            ConvertError::PdfProcessing(format!("Page {} is not a dictionary: {}", page_num, e))
        })?;

        // Reserve the id first so back-references from annotations resolve to this copy
        let new_page_id = dest.new_object_id();
        copied.insert(page_id, new_page_id);

        let mut new_page = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            let value = copy_object(&source, &mut dest, value, &mut copied)?;
            new_page.set(key.clone(), value);
        }

        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited(&source, page, key) {
                let value = copy_object(&source, &mut dest, value, &mut copied)?;
                new_page.set(key.to_vec(), value);
            }
        }

        new_page.set("Parent", pages_id);
        dest.objects.insert(new_page_id, Object::Dictionary(new_page));
        kids.push(Object::Reference(new_page_id));
    }

    let page_count = kids.len();
    dest.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = dest.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    dest.trailer.set("Root", catalog_id);

    if let Some(title) = options.title.as_deref().filter(|t| !t.is_empty()) {
        let info_id = dest.add_object(dictionary! {
            "Title" => text_string(title),
            "Producer" => text_string(PRODUCER),
        });
        dest.trailer.set("Info", info_id);
    }

    if options.compress {
        dest.compress();
    }

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer).map_err(|e| {
        ConvertError::PdfProcessing(format!("Failed to save rewritten PDF: {}", e))
    })?;

    tracing::debug!(
        pages = page_count,
        compress = options.compress,
        input_bytes = bytes.len(),
        output_bytes = buffer.len(),
        "rewrote PDF"
    );

    Ok(buffer)
}

/// Look up an inheritable attribute on the page's ancestors
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
    }
    None
}

/// Deep-copy `object` and everything it references into `dest`
fn copy_object(
    source: &Document,
    dest: &mut Document,
    object: &Object,
    copied: &mut BTreeMap<ObjectId, ObjectId>,
) -> Result<Object, ConvertError> {
    let copy = match object {
        Object::Reference(id) => {
            if let Some(&new_id) = copied.get(id) {
                return Ok(Object::Reference(new_id));
            }

            let new_id = dest.new_object_id();
            copied.insert(*id, new_id);

            let target = source.get_object(*id).map_err(|e| {
                ConvertError::PdfProcessing(format!("Missing object {} {}: {}", id.0, id.1, e))
            })?;
            let target = copy_object(source, dest, target, copied)?;
            dest.objects.insert(new_id, target);

            Object::Reference(new_id)
        }
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| copy_object(source, dest, item, copied))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Object::Dictionary(dict) => {
            Object::Dictionary(copy_dictionary(source, dest, dict, copied)?)
        }
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = copy_dictionary(source, dest, &stream.dict, copied)?;
            Object::Stream(stream)
        }
        other => other.clone(),
    };

    Ok(copy)
}

fn copy_dictionary(
    source: &Document,
    dest: &mut Document,
    dict: &Dictionary,
    copied: &mut BTreeMap<ObjectId, ObjectId>,
) -> Result<Dictionary, ConvertError> {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), copy_object(source, dest, value, copied)?);
    }
    Ok(out)
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
