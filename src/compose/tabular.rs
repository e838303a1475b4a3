//! Spreadsheet backend: one row per record, three fixed columns.
//!
//! | Column | Content |
//! |--------|---------|
//! | A | source URL |
//! | B | `id:` + flattened payload + element index + page URL |
//! | C | snapshot, scaled to the record's embed geometry |
//!
//! Row 1 holds the headers. Each record row is as tall as its snapshot:
//! the embed height in pixels divided by [`PIXELS_PER_POINT`].

use super::{DocumentComposer, FinishedDocument};
use crate::error::HarvestError;
use crate::pipeline::harvest::HarvestedRecord;
use crate::pipeline::scale::{scale, EmbedBounds, ScaledGeometry};
use rust_xlsxwriter::{Format, FormatAlign, Image, Workbook, XlsxError};
use std::path::PathBuf;
use tracing::debug;

/// Pixel → row-height divisor.
pub const PIXELS_PER_POINT: f64 = 1.33;

const SHEET_NAME: &str = "Sheet1";

const COLUMNS: [(&str, f64); 3] = [
    ("URL", 30.0),
    ("Readable Key-Value Pairs", 50.0),
    ("Screenshot", 30.0),
];

/// One laid-out spreadsheet row.
#[derive(Debug, Clone)]
pub struct TabularRow {
    pub url: String,
    pub text: String,
    pub row_height: f64,
    pub geometry: ScaledGeometry,
    pub snapshot_path: PathBuf,
    png: Vec<u8>,
}

/// Accumulates rows and writes an `.xlsx` workbook on finalize.
pub struct TabularComposer {
    bounds: EmbedBounds,
    rows: Vec<TabularRow>,
}

impl TabularComposer {
    pub fn new(bounds: EmbedBounds) -> Self {
        Self {
            bounds,
            rows: Vec::new(),
        }
    }

    /// Rows appended so far, in order.
    pub fn rows(&self) -> &[TabularRow] {
        &self.rows
    }

    fn build_workbook(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        let header = Format::new().set_bold();
        let wrap = Format::new().set_text_wrap().set_align(FormatAlign::Top);

        for (col, (title, width)) in COLUMNS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width)?;
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string_with_format(r, 0, row.url.as_str(), &wrap)?;
            sheet.write_string_with_format(r, 1, row.text.as_str(), &wrap)?;
            sheet.set_row_height(r, row.row_height)?;

            let mut image = Image::new_from_buffer(&row.png)?;
            let (w, h) = (image.width(), image.height());
            if w > 0.0 && h > 0.0 {
                image = image
                    .set_scale_width(row.geometry.embed_width / w)
                    .set_scale_height(row.geometry.embed_height / h);
            }
            sheet.insert_image(r, 2, &image)?;
        }

        workbook.save_to_buffer()
    }
}

/// Text shown in column B.
pub fn row_text(url: &str, record: &HarvestedRecord) -> String {
    let mut text = format!("{}:\n", record.id);
    let payload = record.flattened.to_text();
    if !payload.is_empty() {
        text.push_str(&payload);
        text.push('\n');
    }
    text.push_str(&format!("Element Index: {}\nPage URL: {}", record.element_index, url));
    text
}

impl DocumentComposer for TabularComposer {
    fn geometry(&self, record: &HarvestedRecord) -> ScaledGeometry {
        scale(record.natural_width, record.natural_height, &self.bounds)
    }

    fn append(
        &mut self,
        url: &str,
        record: HarvestedRecord,
        geometry: ScaledGeometry,
    ) -> Result<(), HarvestError> {
        let row_height = geometry.embed_height / PIXELS_PER_POINT;
        debug!(
            "Row {} for '{}' ({:.1} pt)",
            self.rows.len() + 2,
            record.unique_key,
            row_height
        );
        self.rows.push(TabularRow {
            url: url.to_string(),
            text: row_text(url, &record),
            row_height,
            geometry,
            snapshot_path: record.snapshot.path,
            png: record.snapshot.png,
        });
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn finalize(self: Box<Self>) -> Result<FinishedDocument, HarvestError> {
        let bytes = self
            .build_workbook()
            .map_err(|e| HarvestError::Finalize(e.to_string()))?;
        Ok(FinishedDocument { bytes, pages: 1 })
    }
}
