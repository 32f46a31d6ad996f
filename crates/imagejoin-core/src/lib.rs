//! Image to PDF conversion
//!
//! This crate merges an ordered set of JPEG/PNG images into a single PDF using lopdf.
//!
//! - `session`: per-user image ordering (ingest, move up/down, clear)
//! - `assemble::images_to_pdf`: one page per image, lossless embedding
//! - `rewrite::rewrite_pdf`: page copy with optional title metadata and compression
//! - `pipeline::convert`: the three steps above behind one call

pub mod assemble;
pub mod error;
pub mod images;
pub mod options;
pub mod pipeline;
pub mod rewrite;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;

pub use assemble::images_to_pdf;
pub use error::ConvertError;
pub use images::{ImageFormat, ImageInfo, UploadedImage};
pub use options::{ConversionOptions, Quality};
pub use pipeline::{convert, ConversionResult, ProcessMetrics};
pub use rewrite::{rewrite_pdf, RewriteOptions};
pub use session::{OrderedImageList, SessionState};

use lopdf::Document;
use serde::Serialize;

/// Facts read back from a finished PDF
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PdfSummary {
    pub page_count: u32,
    /// PDF version string (e.g., "1.5")
    pub version: String,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub producer: Option<String>,
}

/// Parse PDF bytes and summarize pages and metadata
pub fn inspect_pdf(bytes: &[u8]) -> Result<PdfSummary, ConvertError> {
    let document = Document::load_mem(bytes)
        .map_err(|e| ConvertError::PdfProcessing(format!("Failed to parse PDF: {}", e)))?;

    let (title, producer) = extract_metadata(&document);

    Ok(PdfSummary {
        page_count: document.get_pages().len() as u32,
        version: document.version.clone(),
        size_bytes: bytes.len(),
        title,
        producer,
    })
}

/// Extract title and producer from the Info dictionary
fn extract_metadata(document: &Document) -> (Option<String>, Option<String>) {
    let info = match document
        .trailer
        .get(b"Info")
        .and_then(|obj| obj.as_reference())
        .and_then(|id| document.get_dictionary(id))
    {
        Ok(info) => info,
        Err(_) => return (None, None),
    };

    let read = |key: &[u8]| {
        info.get(key)
            .and_then(|obj| obj.as_str())
            .ok()
            .map(decode_text_string)
            .filter(|s| !s.is_empty())
    };

    (read(b"Title"), read(b"Producer"))
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char)
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}
