//! Test images and PDF readers shared by the unit tests

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::{Cursor, Read};

/// Deterministic RGB gradient, 3 bytes per pixel
pub fn rgb_samples(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8]);
        }
    }
    data
}

/// Encode a PNG; `ppm` sets pixels per metre on both axes
pub fn png_image(width: u32, height: u32, color: png::ColorType, ppm: Option<u32>) -> Vec<u8> {
    let rgb = rgb_samples(width, height);
    let data: Vec<u8> = match color {
        png::ColorType::Grayscale => rgb.chunks(3).map(|px| px[0]).collect(),
        png::ColorType::GrayscaleAlpha => rgb.chunks(3).flat_map(|px| [px[0], 200]).collect(),
        png::ColorType::Rgba => rgb
            .chunks(3)
            .flat_map(|px| [px[0], px[1], px[2], 128])
            .collect(),
        _ => rgb,
    };

    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(ppm) = ppm {
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&data).unwrap();
    }
    buffer
}

/// Encode a PNG from raw samples at any colour type and bit depth
pub fn png_raw(
    width: u32,
    height: u32,
    color: png::ColorType,
    depth: png::BitDepth,
    data: &[u8],
    palette: Option<&[u8]>,
) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        if let Some(palette) = palette {
            encoder.set_palette(palette.to_vec());
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
    }
    buffer
}

/// Encode a baseline RGB JPEG
pub fn jpeg_image(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_raw(width, height, rgb_samples(width, height)).unwrap();
    let mut buffer = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 90)
        .encode_image(&img)
        .unwrap();
    buffer
}

pub fn exif_field(tag: exif::Tag, value: exif::Value) -> exif::Field {
    exif::Field {
        tag,
        ifd_num: exif::In::PRIMARY,
        value,
    }
}

/// Add an EXIF APP1 segment after SOI
///
/// With `keep_jfif` false the leading JFIF APP0 segment is dropped, the
/// layout most cameras and phones write.
pub fn with_exif(jpeg: &[u8], fields: &[exif::Field], keep_jfif: bool) -> Vec<u8> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff.into_inner());

    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    app1.extend_from_slice(&payload);

    assert_eq!(&jpeg[2..4], &[0xFF, 0xE0], "expected a JFIF APP0 segment");
    let app0_end = 4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;

    let mut out = jpeg[..2].to_vec();
    if keep_jfif {
        out.extend_from_slice(&jpeg[2..app0_end]);
    }
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[app0_end..]);
    out
}

/// Inflate a FlateDecode stream body
pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Dictionary {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        other => other.as_dict().unwrap(),
    }
}

/// The `/Im0` image XObject of every page, in page order
pub fn page_image_streams(pdf: &[u8]) -> Vec<Stream> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let resources = resolve(&doc, page.get(b"Resources").unwrap());
            let xobjects = resolve(&doc, resources.get(b"XObject").unwrap());
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            doc.get_object(image_id).unwrap().as_stream().unwrap().clone()
        })
        .collect()
}

/// Width and height of every page's MediaBox, in page order
pub fn page_media_boxes(pdf: &[u8]) -> Vec<(f64, f64)> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let value = |i: usize| media_box[i].as_float().unwrap() as f64;
            (value(2) - value(0), value(3) - value(1))
        })
        .collect()
}

/// The `/SMask` of every page's image, in page order
pub fn page_soft_masks(pdf: &[u8]) -> Vec<Option<Stream>> {
    let doc = Document::load_mem(pdf).unwrap();
    page_image_streams(pdf)
        .iter()
        .map(|image| {
            image.dict.get(b"SMask").ok().map(|mask| {
                let id = mask.as_reference().unwrap();
                doc.get_object(id).unwrap().as_stream().unwrap().clone()
            })
        })
        .collect()
}

/// The `/Rotate` entry of every page, in page order
pub fn page_rotations(pdf: &[u8]) -> Vec<Option<i64>> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            page.get(b"Rotate").ok().map(|r| r.as_i64().unwrap())
        })
        .collect()
}
