//! Terminal rendering for docpane: kitty graphics transport, cell layout for
//! page images and their text overlays, markup to text, and key mapping.

use std::io::{self, Write};

mod input;
mod kitty;
mod layout;
mod markup;

pub use input::{EventMapper, InputMode, UiEvent};
pub use kitty::{DrawParams, KittyRenderer};
pub use layout::{place_image, place_overlay, ImagePlacement, OverlayCell, TerminalGeometry};
pub use markup::MarkupRenderer;

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
