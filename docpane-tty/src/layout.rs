//! Maps page images and their text overlays onto terminal cells.

use docpane_core::TextOverlay;

/// Terminal size in cells and, when the terminal reports it, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub columns: u32,
    pub rows: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl TerminalGeometry {
    fn cell_size(&self) -> Option<(f32, f32)> {
        if self.pixel_width == 0 || self.pixel_height == 0 || self.columns == 0 || self.rows == 0 {
            return None;
        }
        Some((
            self.pixel_width as f32 / self.columns as f32,
            self.pixel_height as f32 / self.rows as f32,
        ))
    }
}

/// Cell rectangle an image is stretched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub column: u32,
    pub row: u32,
    pub columns: u32,
    pub rows: u32,
}

/// Fits a `width`×`height` pixel image into the top `area_rows` rows,
/// keeping its aspect ratio and never enlarging it past its pixel size when
/// the cell size is known. The result is centred.
pub fn place_image(width: u32, height: u32, geometry: &TerminalGeometry, area_rows: u32) -> ImagePlacement {
    let total_cols = geometry.columns.max(1);
    let area_rows = area_rows.clamp(1, geometry.rows.max(1));
    let available_cols = total_cols.saturating_sub(total_cols.min(2)).max(1);
    let available_rows = area_rows.saturating_sub(area_rows.min(2)).max(1);

    let (mut cols, mut rows) = (available_cols as f32, available_rows as f32);
    if width > 0 && height > 0 {
        match geometry.cell_size() {
            Some((cell_width, cell_height)) => {
                let natural_cols = (width as f32 / cell_width).max(1.0);
                let natural_rows = (height as f32 / cell_height).max(1.0);
                let factor = (available_cols as f32 / natural_cols)
                    .min(available_rows as f32 / natural_rows)
                    .min(1.0);
                cols = natural_cols * factor;
                rows = natural_rows * factor;
            }
            None => {
                // Cells are roughly twice as tall as they are wide.
                let ratio = width as f32 / height as f32 * 2.0;
                rows = cols / ratio;
                if rows > available_rows as f32 {
                    rows = available_rows as f32;
                    cols = rows * ratio;
                }
            }
        }
    }

    let columns = (cols.round() as u32).clamp(1, available_cols);
    let rows = (rows.round() as u32).clamp(1, available_rows);
    ImagePlacement {
        column: (total_cols - columns) / 2,
        row: (area_rows - rows) / 2,
        columns,
        rows,
    }
}

/// A word of overlay text positioned in absolute terminal cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayCell {
    pub column: u32,
    pub row: u32,
    pub text: String,
}

/// Positions overlay spans over an image drawn at `placement`. Spans are
/// scaled by the same factor as the image so each word lands on its glyphs.
/// Words that would collide on a row are pushed right and clipped at the
/// image edge.
pub fn place_overlay(overlay: &TextOverlay, placement: &ImagePlacement) -> Vec<OverlayCell> {
    if overlay.image_width <= 0.0 || overlay.image_height <= 0.0 {
        return Vec::new();
    }
    let scale_x = placement.columns as f32 / overlay.image_width;
    let scale_y = placement.rows as f32 / overlay.image_height;

    let mut cells: Vec<(u32, u32, &str)> = overlay
        .spans
        .iter()
        .filter_map(|span| {
            let column = (span.left * scale_x).floor();
            let row = ((span.top + span.height / 2.0) * scale_y).floor();
            if column < 0.0 || row < 0.0 {
                return None;
            }
            let (column, row) = (column as u32, row as u32);
            (column < placement.columns && row < placement.rows).then_some((row, column, span.text.trim()))
        })
        .collect();
    cells.sort_by_key(|(row, column, _)| (*row, *column));

    let mut placed = Vec::with_capacity(cells.len());
    let mut cursor = (u32::MAX, 0);
    for (row, column, text) in cells {
        let start = if cursor.0 == row { column.max(cursor.1) } else { column };
        let room = placement.columns.saturating_sub(start) as usize;
        if room == 0 {
            continue;
        }
        let text: String = text.chars().take(room).collect();
        let width = text.chars().count() as u32;
        cursor = (row, start + width + 1);
        placed.push(OverlayCell {
            column: placement.column + start,
            row: placement.row + row,
            text,
        });
    }
    placed
}
