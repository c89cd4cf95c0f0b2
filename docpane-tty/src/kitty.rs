use std::io::Write;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
};
use docpane_core::Bitmap;
use png::{BitDepth, ColorType, Encoder};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Draws backend image bytes. PNG goes to the terminal as is, anything
    /// else is decoded and re-encoded first.
    pub fn draw_encoded(&mut self, data: &[u8], params: DrawParams) -> Result<()> {
        if data.starts_with(PNG_SIGNATURE) {
            let (width, height) = png_dimensions(data)?;
            return self.draw_png(data, width, height, params);
        }
        let image = image::load_from_memory(data)
            .map_err(|err| anyhow!("failed to decode page image: {err}"))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let bitmap = Bitmap {
            width,
            height,
            rgba: image.into_raw(),
        };
        self.draw_bitmap(&bitmap, params)
    }

    pub fn draw_bitmap(&mut self, bitmap: &Bitmap, params: DrawParams) -> Result<()> {
        let buffer = encode_png(bitmap)?;
        self.draw_png(&buffer, bitmap.width, bitmap.height, params)
    }

    /// Transmits PNG data and places it under the text layer (`z=-1`) so
    /// text printed into the same cells stays readable.
    pub fn draw_png(&mut self, png: &[u8], width: u32, height: u32, params: DrawParams) -> Result<()> {
        let encoded = BASE64.encode(png);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={}",
                    self.image_id,
                    self.placement_id,
                    params.columns,
                    params.rows,
                    width,
                    height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Removes every placed image, e.g. before drawing a markup unit.
    pub fn delete_images(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=A,q=2\u{1b}\\")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let expected = bitmap.width as usize * bitmap.height as usize * 4;
    if bitmap.rgba.len() != expected {
        return Err(anyhow!(
            "bitmap is {}x{} but holds {} bytes",
            bitmap.width,
            bitmap.height,
            bitmap.rgba.len()
        ));
    }
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, bitmap.width, bitmap.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bitmap.rgba)?;
    writer.finish()?;
    Ok(buffer)
}

/// Width and height from the IHDR chunk.
fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let header = data
        .get(16..24)
        .ok_or_else(|| anyhow!("truncated PNG header"))?;
    let width = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    Ok((width, height))
}
