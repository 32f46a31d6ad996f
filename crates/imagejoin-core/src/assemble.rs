//! Image-to-PDF assembly
//!
//! Builds one page per image, each sized to the image's native resolution.
//! JPEG data is embedded verbatim with DCTDecode; PNG samples are decoded
//! losslessly and stored with FlateDecode.

use crate::error::ConvertError;
use crate::images::{self, ColorSpace, ImageFormat, ImageInfo};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

/// Producer recorded by the assembly step
pub const ASSEMBLER_PRODUCER: &str = concat!("imagejoin ", env!("CARGO_PKG_VERSION"));

/// Assemble images into a single PDF
///
/// Page N shows image N. Any buffer that is not a valid JPEG or PNG fails
/// the whole call; no partial document is produced.
pub fn images_to_pdf(images: &[&[u8]]) -> Result<Vec<u8>, ConvertError> {
    if images.is_empty() {
        return Err(ConvertError::NoInput);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::with_capacity(images.len());

    for (i, bytes) in images.iter().enumerate() {
        let page_id = add_image_page(&mut doc, pages_id, bytes).map_err(|e| match e {
            ConvertError::InvalidImage(msg) => {
                ConvertError::InvalidImage(format!("image {}: {}", i + 1, msg))
            }
            other => other,
        })?;
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => page_ids.len() as i64,
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(ASSEMBLER_PRODUCER),
    });
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(|e| {
        ConvertError::PdfProcessing(format!("Failed to save assembled PDF: {}", e))
    })?;

    tracing::debug!(
        pages = page_ids.len(),
        bytes = buffer.len(),
        "assembled image PDF"
    );

    Ok(buffer)
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    bytes: &[u8],
) -> Result<ObjectId, ConvertError> {
    let info = images::read_info(bytes)?;
    let image_id = match info.format {
        ImageFormat::Jpeg => embed_jpeg(doc, bytes, &info)?,
        ImageFormat::Png => embed_png(doc, bytes, &info)?,
    };

    let (width, height) = info.page_size_pt();

    // Scale the unit image square to cover the whole page
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| ConvertError::PdfProcessing(format!("Failed to encode page: {}", e)))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            real(width),
            real(height),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
        "Contents" => content_id,
    };
    if info.rotation != 0 {
        page.set("Rotate", info.rotation as i64);
    }

    Ok(doc.add_object(page))
}

fn embed_jpeg(doc: &mut Document, bytes: &[u8], info: &ImageInfo) -> Result<ObjectId, ConvertError> {
    images::validate_jpeg(bytes)?;

    let mut dict = image_dict(info.width, info.height, info.color_space, info.bits_per_component);
    dict.set("Filter", "DCTDecode");
    if info.inverted_cmyk {
        dict.set(
            "Decode",
            [1, 0, 1, 0, 1, 0, 1, 0]
                .iter()
                .map(|&v| Object::Integer(v))
                .collect::<Vec<_>>(),
        );
    }

    let stream = Stream::new(dict, bytes.to_vec()).with_compression(false);
    Ok(doc.add_object(stream))
}

fn embed_png(doc: &mut Document, bytes: &[u8], info: &ImageInfo) -> Result<ObjectId, ConvertError> {
    let png_err = |e: png::DecodingError| ConvertError::InvalidImage(format!("PNG: {}", e));

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().map_err(png_err)?;

    let mut samples = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut samples).map_err(png_err)?;
    samples.truncate(frame.buffer_size());

    let (color_type, bit_depth) = reader.output_color_type();
    let bytes_per_sample = if bit_depth == png::BitDepth::Sixteen { 2 } else { 1 };
    let bits_per_component = (8 * bytes_per_sample) as u8;

    let (color_space, has_alpha) = match color_type {
        png::ColorType::Grayscale => (ColorSpace::Gray, false),
        png::ColorType::GrayscaleAlpha => (ColorSpace::Gray, true),
        png::ColorType::Rgb => (ColorSpace::Rgb, false),
        png::ColorType::Rgba => (ColorSpace::Rgb, true),
        png::ColorType::Indexed => {
            return Err(ConvertError::InvalidImage(
                "PNG: palette was not expanded".into(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        let (color, alpha) = split_alpha(&samples, color_type.samples(), bytes_per_sample);
        (color, Some(alpha))
    } else {
        (samples, None)
    };

    let mut dict = image_dict(info.width, info.height, color_space, bits_per_component);
    dict.set("Filter", "FlateDecode");

    if let Some(alpha) = alpha {
        let mut mask_dict =
            image_dict(info.width, info.height, ColorSpace::Gray, bits_per_component);
        mask_dict.set("Filter", "FlateDecode");
        let mask = Stream::new(mask_dict, deflate(&alpha)?).with_compression(false);
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    let stream = Stream::new(dict, deflate(&color)?).with_compression(false);
    Ok(doc.add_object(stream))
}

fn image_dict(width: u32, height: u32, color_space: ColorSpace, bits: u8) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space.pdf_name(),
        "BitsPerComponent" => bits as i64,
    }
}

/// Separate interleaved colour samples from the trailing alpha sample
fn split_alpha(samples: &[u8], channels: usize, bytes_per_sample: usize) -> (Vec<u8>, Vec<u8>) {
    let pixel_len = channels * bytes_per_sample;
    let color_len = (channels - 1) * bytes_per_sample;
    let pixels = samples.len() / pixel_len;

    let mut color = Vec::with_capacity(pixels * color_len);
    let mut alpha = Vec::with_capacity(pixels * bytes_per_sample);
    for pixel in samples.chunks_exact(pixel_len) {
        color.extend_from_slice(&pixel[..color_len]);
        alpha.extend_from_slice(&pixel[color_len..]);
    }

    (color, alpha)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let io_err = |e: std::io::Error| ConvertError::PdfProcessing(format!("Deflate failed: {}", e));

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(io_err)?;
    encoder.finish().map_err(io_err)
}

fn real(value: f64) -> Object {
    Object::Real(value as _)
}
