//! Minimal PDF writer for the flow backend.
//!
//! Only what the flow layout draws: Helvetica text, hairline separators and
//! RGB images with an optional alpha soft mask. Callers work in top-down
//! page coordinates (origin at the top-left, y grows downward); the writer
//! flips them into PDF user space when it emits content streams.
//!
//! ```text
//! %PDF-1.7
//! 1 0 obj  Catalog
//! 2 0 obj  Pages
//! 3 0 obj  Helvetica (Type1, WinAnsi)
//! …        image XObjects (SMask first), then content + page per page
//! xref / trailer / startxref
//! ```

use image::GenericImageView;
use miniz_oxide::deflate::compress_to_vec_zlib;
use std::fmt::Write as _;
use std::io::Write as _;

const FONT_RESOURCE: &str = "F1";
const COMPRESSION_LEVEL: u8 = 6;

/// Decoded raster ready to be embedded.
#[derive(Debug, Clone)]
pub struct PdfImage {
    pub width_px: u32,
    pub height_px: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl PdfImage {
    /// Decode PNG (or any format `image` reads) into RGB plus optional alpha.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        let (width_px, height_px) = decoded.dimensions();

        let alpha = if decoded.color().has_alpha() {
            let rgba = decoded.to_rgba8();
            let alpha: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
            alpha.iter().any(|&a| a != 255).then_some(alpha)
        } else {
            None
        };

        Ok(Self {
            width_px,
            height_px,
            rgb: decoded.to_rgb8().into_raw(),
            alpha,
        })
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }
}

/// One drawing operation, in top-down coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Text whose baseline sits at `y`.
    Text { x: f64, y: f64, size: f64, text: String },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Image with its top-left corner at (`x`, `y`).
    Image { x: f64, y: f64, width: f64, height: f64, image: usize },
}

#[derive(Debug, Clone, Default)]
pub struct PdfPage {
    pub ops: Vec<DrawOp>,
}

/// A document under construction. Every page shares one size.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    width: f64,
    height: f64,
    pages: Vec<PdfPage>,
    images: Vec<PdfImage>,
    title: Option<String>,
}

impl PdfDocument {
    /// New document with one empty page.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            pages: vec![PdfPage::default()],
            images: Vec::new(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn add_page(&mut self) {
        self.pages.push(PdfPage::default());
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PdfPage] {
        &self.pages
    }

    /// Register an image; returns the handle used by [`DrawOp::Image`].
    pub fn add_image(&mut self, image: PdfImage) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    /// Push an op onto the last page.
    pub fn draw(&mut self, op: DrawOp) {
        if self.pages.is_empty() {
            self.pages.push(PdfPage::default());
        }
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    /// Serialise the whole document.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Slot 0 is the free-list head; 1 and 2 are filled in last.
        let mut objects: Vec<Vec<u8>> = vec![Vec::new(), Vec::new(), Vec::new()];

        objects.push(
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        );
        let font_id = objects.len() - 1;

        let image_ids: Vec<usize> = self
            .images
            .iter()
            .map(|img| push_image(&mut objects, img))
            .collect();

        let xobjects: String = image_ids
            .iter()
            .enumerate()
            .map(|(i, id)| format!("/Im{i} {id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        let resources = if xobjects.is_empty() {
            format!("/Font << /{FONT_RESOURCE} {font_id} 0 R >>")
        } else {
            format!("/Font << /{FONT_RESOURCE} {font_id} 0 R >> /XObject << {xobjects} >>")
        };

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let content = self.content_stream(page);
            let content_id = push_stream(&mut objects, "", content.as_bytes());

            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                     /Contents {} 0 R /Resources << {} >> >>",
                    self.width, self.height, content_id, resources
                )
                .into_bytes(),
            );
            page_ids.push(objects.len() - 1);
        }

        objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        objects[2] = format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, page_ids.len())
            .into_bytes();

        let info_id = self.title.as_ref().map(|title| {
            objects.push(
                format!(
                    "<< /Title ({}) /Producer (page-harvest) >>",
                    encode_text(title)
                )
                .into_bytes(),
            );
            objects.len() - 1
        });

        serialize(&objects, info_id)
    }

    fn content_stream(&self, page: &PdfPage) -> String {
        let mut out = String::new();
        for op in &page.ops {
            match op {
                DrawOp::Text { x, y, size, text } => {
                    let _ = writeln!(
                        out,
                        "BT /{} {:.2} Tf {:.2} {:.2} Td ({}) Tj ET",
                        FONT_RESOURCE,
                        size,
                        x,
                        self.height - y,
                        encode_text(text)
                    );
                }
                DrawOp::Line { x1, y1, x2, y2 } => {
                    let _ = writeln!(
                        out,
                        "0.5 w 0.75 G {:.2} {:.2} m {:.2} {:.2} l S",
                        x1,
                        self.height - y1,
                        x2,
                        self.height - y2
                    );
                }
                DrawOp::Image { x, y, width, height, image } => {
                    let _ = writeln!(
                        out,
                        "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im{} Do Q",
                        width,
                        height,
                        x,
                        self.height - y - height,
                        image
                    );
                }
            }
        }
        out
    }
}

fn push_stream(objects: &mut Vec<Vec<u8>>, dict_extra: &str, raw: &[u8]) -> usize {
    let compressed = compress_to_vec_zlib(raw, COMPRESSION_LEVEL);
    let mut data = Vec::with_capacity(compressed.len() + 96);
    let _ = write!(
        data,
        "<< {}/Length {} /Filter /FlateDecode >>\nstream\n",
        dict_extra,
        compressed.len()
    );
    data.extend_from_slice(&compressed);
    data.extend_from_slice(b"\nendstream");
    objects.push(data);
    objects.len() - 1
}

fn push_image(objects: &mut Vec<Vec<u8>>, image: &PdfImage) -> usize {
    let dims = format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /BitsPerComponent 8 ",
        image.width_px, image.height_px
    );

    let smask = image.alpha.as_ref().map(|alpha| {
        push_stream(objects, &format!("{dims}/ColorSpace /DeviceGray "), alpha)
    });
    let smask_ref = smask
        .map(|id| format!("/SMask {id} 0 R "))
        .unwrap_or_default();

    push_stream(
        objects,
        &format!("{dims}/ColorSpace /DeviceRGB {smask_ref}"),
        &image.rgb,
    )
}

fn serialize(objects: &[Vec<u8>], info_id: Option<usize>) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::new();
    let mut offsets = vec![0usize; objects.len()];

    output.extend_from_slice(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");

    for (i, data) in objects.iter().enumerate().skip(1) {
        offsets[i] = output.len();
        let _ = write!(output, "{i} 0 obj\n");
        output.extend_from_slice(data);
        output.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = output.len();
    let _ = write!(output, "xref\n0 {}\n0000000000 65535 f \n", objects.len());
    for offset in offsets.iter().skip(1) {
        let _ = write!(output, "{offset:010} 00000 n \n");
    }

    let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", objects.len());
    if let Some(id) = info_id {
        let _ = write!(output, " /Info {id} 0 R");
    }
    let _ = write!(output, " >>\nstartxref\n{xref_offset}\n%%EOF\n");
    output
}

/// Escape a string for a PDF literal in WinAnsiEncoding. Bytes outside
/// printable ASCII go out as octal escapes; unmappable characters become `?`.
pub fn encode_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(ch),
            _ => match winansi_byte(ch) {
                Some(b) => {
                    let _ = write!(out, "\\{:03o}", b);
                }
                None => out.push('?'),
            },
        }
    }
    out
}

/// WinAnsi (Windows-1252) byte for `ch`. Latin-1 maps to itself; the
/// 0x80..=0x9F block holds typographic punctuation and a few letters.
fn winansi_byte(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return u8::try_from(cp).ok();
    }
    let b = match ch {
        '\u{20ac}' => 0x80, // €
        '\u{201a}' => 0x82, // ‚
        '\u{0192}' => 0x83, // ƒ
        '\u{201e}' => 0x84, // „
        '\u{2026}' => 0x85, // …
        '\u{2020}' => 0x86, // †
        '\u{2021}' => 0x87, // ‡
        '\u{02c6}' => 0x88, // ˆ
        '\u{2030}' => 0x89, // ‰
        '\u{0160}' => 0x8A, // Š
        '\u{2039}' => 0x8B, // ‹
        '\u{0152}' => 0x8C, // Œ
        '\u{017d}' => 0x8E, // Ž
        '\u{2018}' => 0x91, // ‘
        '\u{2019}' => 0x92, // ’
        '\u{201c}' => 0x93, // “
        '\u{201d}' => 0x94, // ”
        '\u{2022}' => 0x95, // •
        '\u{2013}' => 0x96, // en dash
        '\u{2014}' => 0x97, // em dash
        '\u{02dc}' => 0x98, // ˜
        '\u{2122}' => 0x99, // ™
        '\u{0161}' => 0x9A, // š
        '\u{203a}' => 0x9B, // ›
        '\u{0153}' => 0x9C, // œ
        '\u{017e}' => 0x9E, // ž
        '\u{0178}' => 0x9F, // Ÿ
        _ => return None,
    };
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn escapes_literals() {
        assert_eq!(encode_text("a (b) \\ c"), "a \\(b\\) \\\\ c");
        assert_eq!(encode_text("café"), "caf\\351");
        assert_eq!(encode_text("→"), "?");
    }

    #[test]
    fn typographic_punctuation_uses_the_winansi_block() {
        assert_eq!(
            encode_text("It\u{2019}s \u{2013} \u{20ac}5 \u{201c}x\u{201d}"),
            "It\\222s \\226 \\2005 \\223x\\224"
        );
        assert_eq!(encode_text("\u{2026}\u{2122}\u{0178}"), "\\205\\231\\237");
    }

    #[test]
    fn empty_document_is_well_formed() {
        let bytes = PdfDocument::new(595.28, 841.89).to_bytes();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(contains(&bytes, b"/Count 1"));
        assert!(contains(&bytes, b"xref"));
        assert!(bytes.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn pages_and_images_are_written() {
        let mut doc = PdfDocument::new(200.0, 300.0).with_title("Harvest");
        let opaque = PdfImage::from_encoded(&encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            4,
            3,
            Rgb([1, 2, 3]),
        ))))
        .unwrap();
        assert!(!opaque.has_alpha());
        let id = doc.add_image(opaque);

        doc.draw(DrawOp::Text { x: 10.0, y: 20.0, size: 9.0, text: "hello".into() });
        doc.add_page();
        doc.draw(DrawOp::Image { x: 10.0, y: 10.0, width: 40.0, height: 30.0, image: id });
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages()[1].ops.len(), 1);

        let bytes = doc.to_bytes();
        assert!(contains(&bytes, b"/Count 2"));
        assert!(contains(&bytes, b"/Im0"));
        assert!(contains(&bytes, b"/Title (Harvest)"));
        assert!(!contains(&bytes, b"/SMask"));
    }

    #[test]
    fn translucent_images_get_a_soft_mask() {
        let png = encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 128]))));
        let image = PdfImage::from_encoded(&png).unwrap();
        assert!(image.has_alpha());

        let mut doc = PdfDocument::new(100.0, 100.0);
        doc.add_image(image);
        assert!(contains(&doc.to_bytes(), b"/SMask"));
    }

    #[test]
    fn coordinates_are_flipped() {
        let mut doc = PdfDocument::new(100.0, 500.0);
        doc.draw(DrawOp::Line { x1: 0.0, y1: 100.0, x2: 50.0, y2: 100.0 });
        let stream = doc.content_stream(&doc.pages()[0]);
        assert!(stream.contains("0.00 400.00 m 50.00 400.00 l S"));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(PdfImage::from_encoded(b"not an image").is_err());
    }
}
