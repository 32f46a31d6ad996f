//! Image sniffing and header probing
//!
//! Reads just enough of a JPEG or PNG to size its PDF page. Pixel data is
//! never modified here.

use crate::error::ConvertError;
use serde::Serialize;
use std::io::Cursor;

/// Resolution assumed when an image carries no usable density metadata
pub const DEFAULT_DPI: f64 = 96.0;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// File extensions the upload control accepts
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Supported image container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Detect the format from magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&JPEG_SOI) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&PNG_SIGNATURE) {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Whether a file name carries one of the accepted extensions
    pub fn accepts_file_name(name: &str) -> bool {
        name.rsplit_once('.')
            .map(|(_, ext)| {
                ACCEPTED_EXTENSIONS
                    .iter()
                    .any(|accepted| ext.eq_ignore_ascii_case(accepted))
            })
            .unwrap_or(false)
    }
}

/// A single uploaded file, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    name: String,
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
}

impl UploadedImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let format = ImageFormat::sniff(&bytes);
        Self {
            name: name.into(),
            bytes,
            format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `None` when the content is neither JPEG nor PNG
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// PDF device colour space of the embedded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            Self::Gray => "DeviceGray",
            Self::Rgb => "DeviceRGB",
            Self::Cmyk => "DeviceCMYK",
        }
    }

    pub fn components(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

/// Header facts needed to place an image on a page
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub dpi_x: f64,
    pub dpi_y: f64,
    pub color_space: ColorSpace,
    pub bits_per_component: u8,
    /// Adobe-flavoured CMYK JPEGs store inverted samples
    pub inverted_cmyk: bool,
    /// Clockwise page rotation in degrees taken from the EXIF orientation
    pub rotation: u16,
}

impl ImageInfo {
    /// Page size in PDF points (1/72 inch)
    pub fn page_size_pt(&self) -> (f64, f64) {
        (
            self.width as f64 * 72.0 / self.dpi_x,
            self.height as f64 * 72.0 / self.dpi_y,
        )
    }
}

/// Read dimensions, resolution and colour layout from image headers
pub fn read_info(bytes: &[u8]) -> Result<ImageInfo, ConvertError> {
    match ImageFormat::sniff(bytes) {
        Some(ImageFormat::Jpeg) => read_jpeg_info(bytes),
        Some(ImageFormat::Png) => read_png_info(bytes),
        None => Err(ConvertError::InvalidImage(
            "unsupported image format (expected JPEG or PNG)".into(),
        )),
    }
}

/// Fully decode JPEG data so corrupt scans are rejected up front
pub(crate) fn validate_jpeg(bytes: &[u8]) -> Result<(), ConvertError> {
    ::image::load_from_memory_with_format(bytes, ::image::ImageFormat::Jpeg)
        .map(|_| ())
        .map_err(|e| ConvertError::InvalidImage(format!("JPEG: {}", e)))
}

fn truncated_jpeg() -> ConvertError {
    ConvertError::InvalidImage("JPEG: truncated header".into())
}

fn read_jpeg_info(bytes: &[u8]) -> Result<ImageInfo, ConvertError> {
    let exif = read_exif(bytes);
    let mut pos = 2;
    let mut density = None;
    let mut adobe = false;

    loop {
        if *bytes.get(pos).ok_or_else(truncated_jpeg)? != 0xFF {
            return Err(ConvertError::InvalidImage(format!(
                "JPEG: marker expected at offset {}",
                pos
            )));
        }
        // Any number of 0xFF fill bytes may precede the marker code
        while bytes.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *bytes.get(pos).ok_or_else(truncated_jpeg)?;
        pos += 1;

        // Standalone markers carry no length field
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            return Err(ConvertError::InvalidImage(
                "JPEG: no frame header before image data".into(),
            ));
        }

        let len = match bytes.get(pos..pos + 2) {
            Some(raw) => u16::from_be_bytes([raw[0], raw[1]]) as usize,
            None => return Err(truncated_jpeg()),
        };
        if len < 2 || pos + len > bytes.len() {
            return Err(truncated_jpeg());
        }
        let segment = &bytes[pos + 2..pos + len];

        match marker {
            0xE0 if density.is_none() => density = jfif_density(segment),
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            // SOF0..SOF15, minus DHT, JPG and DAC which share the range
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return frame_info(segment, density.or(exif.dpi), adobe, exif.rotation);
            }
            _ => {}
        }

        pos += len;
    }
}

fn frame_info(
    segment: &[u8],
    density: Option<(f64, f64)>,
    adobe: bool,
    rotation: u16,
) -> Result<ImageInfo, ConvertError> {
    if segment.len() < 6 {
        return Err(truncated_jpeg());
    }

    let precision = segment[0];
    let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
    let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
    let color_space = match segment[5] {
        1 => ColorSpace::Gray,
        3 => ColorSpace::Rgb,
        4 => ColorSpace::Cmyk,
        n => {
            return Err(ConvertError::InvalidImage(format!(
                "JPEG: unsupported component count {}",
                n
            )))
        }
    };

    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidImage("JPEG: zero dimensions".into()));
    }

    let (dpi_x, dpi_y) = density.unwrap_or((DEFAULT_DPI, DEFAULT_DPI));

    Ok(ImageInfo {
        format: ImageFormat::Jpeg,
        width,
        height,
        dpi_x,
        dpi_y,
        color_space,
        bits_per_component: precision,
        inverted_cmyk: adobe && color_space == ColorSpace::Cmyk,
        rotation,
    })
}

/// JFIF APP0: "JFIF\0", version (2), units (1), x density (2), y density (2)
fn jfif_density(segment: &[u8]) -> Option<(f64, f64)> {
    if segment.len() < 12 || !segment.starts_with(b"JFIF\0") {
        return None;
    }

    let x = u16::from_be_bytes([segment[8], segment[9]]) as f64;
    let y = u16::from_be_bytes([segment[10], segment[11]]) as f64;
    if x == 0.0 || y == 0.0 {
        return None;
    }

    match segment[7] {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        // Unit 0 is only an aspect ratio
        _ => None,
    }
}

/// Resolution and orientation recorded in an EXIF APP1 segment
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct ExifFacts {
    dpi: Option<(f64, f64)>,
    rotation: u16,
}

fn read_exif(bytes: &[u8]) -> ExifFacts {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::trace!("no usable EXIF data: {}", e);
            return ExifFacts::default();
        }
    };

    let rational = |tag| match exif.get_field(tag, exif::In::PRIMARY).map(|f| &f.value) {
        Some(exif::Value::Rational(values)) => values
            .first()
            .map(|r| r.to_f64())
            .filter(|v| v.is_finite() && *v > 0.0),
        _ => None,
    };
    let uint = |tag| {
        exif.get_field(tag, exif::In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
    };

    // ResolutionUnit 2 is inches and the default, 3 is centimetres
    let scale = match uint(exif::Tag::ResolutionUnit) {
        Some(3) => Some(2.54),
        Some(1) => None,
        _ => Some(1.0),
    };
    let dpi = match (
        rational(exif::Tag::XResolution),
        rational(exif::Tag::YResolution),
        scale,
    ) {
        (Some(x), Some(y), Some(scale)) => Some((x * scale, y * scale)),
        (Some(x), None, Some(scale)) => Some((x * scale, x * scale)),
        _ => None,
    };

    // Mirrored orientations (2, 4, 5, 7) cannot be expressed as a page rotation
    let rotation = match uint(exif::Tag::Orientation) {
        Some(3) => 180,
        Some(6) => 90,
        Some(8) => 270,
        Some(other @ (2 | 4 | 5 | 7)) => {
            tracing::debug!(orientation = other, "ignoring mirrored EXIF orientation");
            0
        }
        _ => 0,
    };

    ExifFacts { dpi, rotation }
}

fn read_png_info(bytes: &[u8]) -> Result<ImageInfo, ConvertError> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let reader = decoder
        .read_info()
        .map_err(|e| ConvertError::InvalidImage(format!("PNG: {}", e)))?;
    let info = reader.info();

    let (dpi_x, dpi_y) = info
        .pixel_dims
        .and_then(|dims| match dims.unit {
            png::Unit::Meter if dims.xppu > 0 && dims.yppu > 0 => Some((
                dims.xppu as f64 * 0.0254,
                dims.yppu as f64 * 0.0254,
            )),
            _ => None,
        })
        .unwrap_or((DEFAULT_DPI, DEFAULT_DPI));

    let color_space = match info.color_type {
        png::ColorType::Grayscale | png::ColorType::GrayscaleAlpha => ColorSpace::Gray,
        _ => ColorSpace::Rgb,
    };

    // Sub-byte and palette samples are expanded to 8 bits when embedded
    let bits_per_component = if info.bit_depth == png::BitDepth::Sixteen {
        16
    } else {
        8
    };

    Ok(ImageInfo {
        format: ImageFormat::Png,
        width: info.width,
        height: info.height,
        dpi_x,
        dpi_y,
        color_space,
        bits_per_component,
        inverted_cmyk: false,
        rotation: 0,
    })
}
