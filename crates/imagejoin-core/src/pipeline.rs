//! Conversion pipeline
//!
//! 1. Assemble the ordered images into a PDF
//! 2. If a title or compression was requested, rewrite that PDF
//! 3. Return whichever buffer came last, never a partial one

use crate::assemble::images_to_pdf;
use crate::error::ConvertError;
use crate::images::UploadedImage;
use crate::options::ConversionOptions;
use crate::rewrite::{rewrite_pdf, RewriteOptions};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

/// A finished PDF ready to offer for download
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub metrics: ProcessMetrics,
}

impl ConversionResult {
    pub const CONTENT_TYPE: &'static str = "application/pdf";
}

/// Convert the ordered images into a single PDF
pub fn convert(
    images: &[UploadedImage],
    options: &ConversionOptions,
) -> Result<ConversionResult, ConvertError> {
    if images.is_empty() {
        return Err(ConvertError::NoInput);
    }

    let started = Instant::now();
    let buffers: Vec<&[u8]> = images.iter().map(UploadedImage::bytes).collect();
    let input_size_bytes = buffers.iter().map(|b| b.len()).sum();

    tracing::info!(
        images = images.len(),
        input_bytes = input_size_bytes,
        title = !options.title.is_empty(),
        compress = options.compress,
        "converting images to PDF"
    );

    let assembled = images_to_pdf(&buffers)?;

    let bytes = if options.needs_rewrite() {
        let rewrite = RewriteOptions {
            title: Some(options.title.clone()).filter(|t| !t.is_empty()),
            compress: options.compress,
        };
        rewrite_pdf(&assembled, &rewrite)?
    } else {
        assembled
    };

    let metrics = ProcessMetrics {
        input_size_bytes,
        output_size_bytes: bytes.len(),
        page_count: images.len() as u32,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        pages = metrics.page_count,
        output_bytes = metrics.output_size_bytes,
        elapsed_ms = metrics.processing_time_ms,
        "conversion complete"
    );

    Ok(ConversionResult {
        bytes,
        filename: options.download_filename(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{jpeg_image, page_image_streams, png_image};
    use crate::inspect_pdf;
    use crate::session::SessionState;
    use pretty_assertions::assert_eq;

    fn sample_images() -> Vec<UploadedImage> {
        vec![
            UploadedImage::new("first.png", png_image(12, 10, png::ColorType::Rgb, None)),
            UploadedImage::new("second.jpg", jpeg_image(24, 10)),
            UploadedImage::new("third.png", png_image(36, 10, png::ColorType::Rgba, None)),
        ]
    }

    fn widths(pdf: &[u8]) -> Vec<i64> {
        page_image_streams(pdf)
            .iter()
            .map(|s| s.dict.get(b"Width").unwrap().as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_input_fails_fast() {
        let err = convert(&[], &ConversionOptions::default()).unwrap_err();
        assert_eq!(err, ConvertError::NoInput);
        assert_eq!(err.to_string(), "No images uploaded");
    }

    #[test]
    fn test_pages_follow_list_order() {
        let result = convert(&sample_images(), &ConversionOptions::default()).unwrap();

        assert_eq!(result.metrics.page_count, 3);
        assert_eq!(widths(&result.bytes), vec![12, 24, 36]);
        assert_eq!(result.filename, "my_document.pdf");
    }

    #[test]
    fn test_reordered_session_changes_page_order() {
        let mut state = SessionState::new();
        state.ingest(sample_images());
        state.move_up(2);
        state.move_up(1);

        let result = convert(state.images(), &ConversionOptions::default()).unwrap();
        assert_eq!(widths(&result.bytes), vec![36, 12, 24]);
    }

    #[test]
    fn test_no_options_returns_assembled_pdf_unchanged() {
        let images = sample_images();
        let buffers: Vec<&[u8]> = images.iter().map(UploadedImage::bytes).collect();
        let assembled = images_to_pdf(&buffers).unwrap();

        let result = convert(&images, &ConversionOptions::default()).unwrap();
        assert_eq!(result.bytes, assembled);
    }

    #[test]
    fn test_title_sets_metadata_and_keeps_pages() {
        let images = sample_images();
        let plain = convert(&images, &ConversionOptions::default()).unwrap();

        let options = ConversionOptions {
            title: "Report".into(),
            ..Default::default()
        };
        let titled = convert(&images, &options).unwrap();

        let summary = inspect_pdf(&titled.bytes).unwrap();
        assert_eq!(summary.title.as_deref(), Some("Report"));
        assert_eq!(summary.page_count, 3);

        let plain_content: Vec<Vec<u8>> =
            page_image_streams(&plain.bytes).into_iter().map(|s| s.content).collect();
        let titled_content: Vec<Vec<u8>> =
            page_image_streams(&titled.bytes).into_iter().map(|s| s.content).collect();
        assert_eq!(plain_content, titled_content);
    }

    #[test]
    fn test_compression_keeps_page_count_and_size_bound() {
        let images = sample_images();
        let plain = convert(&images, &ConversionOptions::default()).unwrap();

        let options = ConversionOptions {
            compress: true,
            ..Default::default()
        };
        let compressed = convert(&images, &options).unwrap();

        assert_eq!(compressed.metrics.page_count, plain.metrics.page_count);
        assert_eq!(inspect_pdf(&compressed.bytes).unwrap().page_count, 3);
        assert!(compressed.bytes.len() <= plain.bytes.len());
    }

    #[test]
    fn test_quality_does_not_change_output() {
        let images = sample_images();
        let low = ConversionOptions {
            compress: true,
            quality: crate::Quality::new(10).unwrap(),
            ..Default::default()
        };
        let high = ConversionOptions {
            compress: true,
            quality: crate::Quality::new(100).unwrap(),
            ..Default::default()
        };

        assert_eq!(
            convert(&images, &low).unwrap().bytes,
            convert(&images, &high).unwrap().bytes
        );
    }

    #[test]
    fn test_invalid_image_aborts_conversion() {
        let mut images = sample_images();
        images.insert(1, UploadedImage::new("broken.jpg", b"\xFF\xD8\xFFnope".to_vec()));

        let err = convert(&images, &ConversionOptions::default()).unwrap_err();
        match err {
            ConvertError::InvalidImage(msg) => assert!(msg.starts_with("image 2:"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_cleared_session_behaves_like_fresh_one() {
        let mut state = SessionState::new();
        state.ingest(sample_images());
        state.clear();

        let err = convert(state.images(), &ConversionOptions::default()).unwrap_err();
        assert_eq!(err, ConvertError::NoInput);
    }

    #[test]
    fn test_filename_quirk() {
        let options = ConversionOptions {
            filename: "report.pdf".into(),
            ..Default::default()
        };
        let result = convert(&sample_images(), &options).unwrap();
        assert_eq!(result.filename, "report.pdf.pdf");
    }
}
