//! Paginated flow backend: records stacked down A4 pages.
//!
//! Each record becomes a block: a text column on the left (URL, element id,
//! a `Data:` label, then the pretty-printed payload) and its snapshot on the
//! right, top-aligned with the text. Blocks after the first are preceded by
//! a separator line. A block that would cross the bottom margin starts a new
//! page instead, and a text column longer than the rest of the page carries
//! on at the top of the next one.

use super::pdf::{DrawOp, PdfDocument, PdfImage};
use super::{DocumentComposer, FinishedDocument};
use crate::config::FlowLayout;
use crate::error::HarvestError;
use crate::pipeline::harvest::HarvestedRecord;
use crate::pipeline::scale::{shrink_to_width, ScaledGeometry};
use tracing::debug;

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f64 = 0.5;

/// Where a block landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStart {
    /// True when this block opened a new page.
    pub page_break: bool,
    /// Separator position, for every block but the first.
    pub separator_y: Option<f64>,
    /// Top edge of the block's content.
    pub top: f64,
}

/// Vertical cursor over a sequence of pages.
#[derive(Debug, Clone)]
pub struct FlowCursor {
    layout: FlowLayout,
    y: f64,
    pages: usize,
    blocks: usize,
}

impl FlowCursor {
    pub fn new(layout: FlowLayout) -> Self {
        Self {
            y: layout.top_margin,
            layout,
            pages: 1,
            blocks: 0,
        }
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Reserve room for a block `row_height` tall.
    pub fn begin(&mut self, row_height: f64) -> BlockStart {
        let page_break = self.y + row_height + self.layout.bottom_margin > self.layout.page_height;
        if page_break {
            self.pages += 1;
            self.y = self.layout.top_margin;
        }

        let separator_y = (self.blocks > 0).then(|| {
            let at = self.y;
            self.y += self.layout.spacing;
            at
        });
        self.blocks += 1;

        BlockStart {
            page_break,
            separator_y,
            top: self.y,
        }
    }

    /// Top of a text line that would start at `y`. Opens a fresh page when
    /// the line would cross the bottom margin; the flag reports that.
    pub fn place_line(&mut self, y: f64) -> (f64, bool) {
        let overflows =
            y + self.layout.line_height + self.layout.bottom_margin > self.layout.page_height;
        if overflows && y > self.layout.top_margin {
            self.pages += 1;
            (self.layout.top_margin, true)
        } else {
            (y, false)
        }
    }

    /// Close a block whose text and image end at the given positions.
    pub fn end(&mut self, text_bottom: f64, image_bottom: f64) {
        self.y = text_bottom.max(image_bottom) + self.layout.spacing;
    }
}

/// Lays records into a [`PdfDocument`].
pub struct FlowComposer {
    layout: FlowLayout,
    cursor: FlowCursor,
    document: PdfDocument,
    records: usize,
}

impl FlowComposer {
    pub fn new(layout: FlowLayout) -> Self {
        Self {
            layout,
            cursor: FlowCursor::new(layout),
            document: PdfDocument::new(layout.page_width, layout.page_height)
                .with_title("Harvested elements"),
            records: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    pub fn document(&self) -> &PdfDocument {
        &self.document
    }

    /// Text lines for a record's left column, wrapped to the column width.
    pub fn text_lines(&self, url: &str, record: &HarvestedRecord) -> Vec<String> {
        let max_chars = ((self.layout.text_width / (self.layout.font_size * AVG_GLYPH_WIDTH))
            .floor() as usize)
            .max(1);

        let payload = serde_json::to_string_pretty(&record.payload)
            .unwrap_or_else(|_| record.payload.to_string());

        let mut raw = vec![url.to_string(), format!("ID: {}", record.id), "Data:".to_string()];
        raw.extend(payload.lines().map(str::to_string));

        raw.iter().flat_map(|line| wrap_line(line, max_chars)).collect()
    }
}

/// Hard-wrap `line` into chunks of at most `max_chars` characters.
fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

impl DocumentComposer for FlowComposer {
    fn geometry(&self, record: &HarvestedRecord) -> ScaledGeometry {
        shrink_to_width(
            record.natural_width,
            record.natural_height,
            self.layout.image_max_width,
        )
    }

    fn append(
        &mut self,
        url: &str,
        record: HarvestedRecord,
        geometry: ScaledGeometry,
    ) -> Result<(), HarvestError> {
        let image = PdfImage::from_encoded(&record.snapshot.png).map_err(|e| HarvestError::Compose {
            key: record.unique_key.clone(),
            detail: format!("Snapshot is not a readable image: {e}"),
        })?;

        let lines = self.text_lines(url, &record);
        let row_height = geometry.embed_height.max(self.layout.min_row_height);

        // ── Step 1: place the block ──────────────────────────────────────
        let start = self.cursor.begin(row_height);
        if start.page_break {
            self.document.add_page();
            debug!("Page {} opened for '{}'", self.document.page_count(), record.unique_key);
        }
        if let Some(y) = start.separator_y {
            self.document.draw(DrawOp::Line {
                x1: self.layout.text_x,
                y1: y,
                x2: self.layout.page_width - self.layout.text_x,
                y2: y,
            });
        }

        // ── Step 2: snapshot column ──────────────────────────────────────
        let handle = self.document.add_image(image);
        self.document.draw(DrawOp::Image {
            x: self.layout.image_x,
            y: start.top,
            width: geometry.embed_width,
            height: geometry.embed_height,
            image: handle,
        });

        // ── Step 3: text column, spilling onto new pages ─────────────────
        let mut y = start.top;
        let mut spilled = false;
        for line in &lines {
            let (top, page_break) = self.cursor.place_line(y);
            if page_break {
                self.document.add_page();
                spilled = true;
                debug!(
                    "Text of '{}' continues on page {}",
                    record.unique_key,
                    self.document.page_count()
                );
            }
            self.document.draw(DrawOp::Text {
                x: self.layout.text_x,
                y: top + self.layout.font_size,
                size: self.layout.font_size,
                text: line.clone(),
            });
            y = top + self.layout.line_height;
        }

        // The image stays on the block's first page.
        let image_bottom = if spilled { y } else { start.top + geometry.embed_height };
        self.cursor.end(y, image_bottom);
        self.records += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.records
    }

    fn finalize(self: Box<Self>) -> Result<FinishedDocument, HarvestError> {
        Ok(FinishedDocument {
            pages: self.document.page_count(),
            bytes: self.document.to_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::flatten::flatten;
    use crate::pipeline::harvest::{ContainerKind, Snapshot};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn bare_layout(page_height: f64) -> FlowLayout {
        FlowLayout {
            page_height,
            top_margin: 0.0,
            bottom_margin: 0.0,
            spacing: 0.0,
            ..FlowLayout::default()
        }
    }

    fn record(id: &str, w: u32, h: u32) -> HarvestedRecord {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 10, 10])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        let payload = json!({"title": "Hello", "n": 1});
        HarvestedRecord {
            id: id.to_string(),
            container_kind: ContainerKind::None,
            unique_key: id.to_string(),
            flattened: flatten("", &payload, 64).unwrap(),
            payload,
            natural_width: w as f64,
            natural_height: h as f64,
            element_index: 1,
            snapshot: Snapshot {
                path: PathBuf::from(format!("screenshots/{id}.png")),
                png,
            },
        }
    }

    #[test]
    fn three_blocks_per_page_when_each_is_a_third() {
        for n in 1..=10usize {
            let mut cursor = FlowCursor::new(bare_layout(300.0));
            let mut breaks = 0;
            for _ in 0..n {
                let start = cursor.begin(100.0);
                breaks += start.page_break as usize;
                cursor.end(start.top + 100.0, start.top);
            }
            assert_eq!(breaks, (n - 1) / 3, "n = {n}");
            assert_eq!(cursor.pages(), breaks + 1);
        }
    }

    #[test]
    fn first_block_has_no_separator() {
        let mut cursor = FlowCursor::new(FlowLayout::default());
        let first = cursor.begin(100.0);
        assert_eq!(first.separator_y, None);
        assert_eq!(first.top, 50.0);
        cursor.end(first.top + 40.0, first.top + 100.0);

        let second = cursor.begin(100.0);
        assert_eq!(second.separator_y, Some(170.0));
        assert_eq!(second.top, 190.0);
    }

    #[test]
    fn separator_is_drawn_at_top_of_a_fresh_page() {
        let mut cursor = FlowCursor::new(bare_layout(100.0));
        let a = cursor.begin(80.0);
        cursor.end(a.top + 80.0, a.top);
        let b = cursor.begin(80.0);
        assert!(b.page_break);
        assert_eq!(b.separator_y, Some(0.0));
    }

    #[test]
    fn wide_snapshots_shrink_to_column() {
        let composer = FlowComposer::new(FlowLayout::default());
        let g = composer.geometry(&record("wide", 450, 90));
        assert_eq!(g.embed_width, 225.0);
        assert_eq!(g.embed_height, 45.0);

        let g = composer.geometry(&record("small", 60, 40));
        assert_eq!(g.embed_width, 60.0);
    }

    #[test]
    fn text_lines_start_with_url_id_and_label() {
        let composer = FlowComposer::new(FlowLayout::default());
        let lines = composer.text_lines("https://a.example", &record("hero", 10, 10));
        assert_eq!(lines[0], "https://a.example");
        assert_eq!(lines[1], "ID: hero");
        assert_eq!(lines[2], "Data:");
        assert_eq!(lines[3], "{");
        assert!(lines.iter().any(|l| l.contains("\"title\": \"Hello\"")));
    }

    #[test]
    fn long_lines_are_wrapped() {
        assert_eq!(wrap_line("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_line("", 3), vec![""]);
    }

    #[test]
    fn many_records_spill_onto_new_pages() {
        let mut composer = Box::new(FlowComposer::new(FlowLayout::default()));
        for i in 0..12 {
            let rec = record(&format!("r{i}"), 300, 200);
            let g = composer.geometry(&rec);
            composer.append("https://a.example", rec, g).unwrap();
        }
        assert_eq!(composer.len(), 12);
        assert!(composer.page_count() > 1);

        let pages = composer.page_count();
        let doc = composer.finalize().unwrap();
        assert_eq!(doc.pages, pages);
        assert!(doc.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn place_line_wraps_to_the_top_margin() {
        let layout = FlowLayout::default();
        let mut cursor = FlowCursor::new(layout);
        assert_eq!(cursor.place_line(700.0), (700.0, false));
        assert_eq!(cursor.place_line(785.0), (50.0, true));
        assert_eq!(cursor.pages(), 2);
    }

    #[test]
    fn long_payload_text_never_crosses_the_bottom_margin() {
        let layout = FlowLayout::default();
        let mut composer = FlowComposer::new(layout);
        let mut rec = record("tall", 60, 40);
        rec.payload = serde_json::Value::Object(
            (0..80).map(|i| (format!("key_{i}"), json!(i))).collect(),
        );
        let g = composer.geometry(&rec);
        composer.append("https://a.example", rec, g).unwrap();

        assert!(composer.page_count() > 1);
        let limit = layout.page_height - layout.bottom_margin;
        for page in composer.document().pages() {
            for op in &page.ops {
                if let DrawOp::Text { y, .. } = op {
                    assert!(*y <= limit, "text at y = {y} is below {limit}");
                }
            }
        }

        // The next block starts below the spilled text, not on page one.
        let next = record("next", 60, 40);
        let g = composer.geometry(&next);
        composer.append("https://a.example", next, g).unwrap();
        let last = composer.document().pages().last().unwrap();
        assert!(last
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, .. } if text == "ID: next")));
    }

    #[test]
    fn unreadable_snapshot_is_a_compose_error() {
        let mut composer = FlowComposer::new(FlowLayout::default());
        let mut rec = record("bad", 10, 10);
        rec.snapshot.png = b"nope".to_vec();
        let g = composer.geometry(&rec);
        let err = composer.append("https://a.example", rec, g).unwrap_err();
        assert!(matches!(err, HarvestError::Compose { ref key, .. } if key == "bad"));
    }
}
