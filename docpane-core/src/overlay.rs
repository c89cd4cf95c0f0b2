//! Selectable text laid over a rendered page image.
//!
//! The image and every span go through the same `display_scale`, otherwise
//! the text drifts away from the glyphs it covers.

use crate::types::{BoundingBox, PageRecord, TextSpan};

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpan {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
}

impl OverlaySpan {
    fn from_span(span: &TextSpan, scale: f32) -> Self {
        let bbox = span.bbox.scaled(scale);
        Self {
            text: span.text.clone(),
            left: bbox.x,
            top: bbox.y,
            width: bbox.width,
            height: bbox.height,
            font_size: bbox.height,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.left, self.top, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub image_width: f32,
    pub image_height: f32,
    pub scale: f32,
    pub spans: Vec<OverlaySpan>,
}

impl TextOverlay {
    /// Lays out `record`'s text layer at `display_scale`. Returns `None` for
    /// records without pixel dimensions or without a text layer.
    pub fn layout(record: &PageRecord, display_scale: f32) -> Option<Self> {
        let (width, height) = record.content.dimensions()?;
        let layer = record.text_layer.as_ref()?;
        let scale = if display_scale.is_finite() && display_scale > 0.0 {
            display_scale
        } else {
            1.0
        };
        let spans = layer
            .iter()
            .filter(|span| !span.text.trim().is_empty())
            .map(|span| OverlaySpan::from_span(span, scale))
            .collect();
        Some(Self {
            image_width: width as f32 * scale,
            image_height: height as f32 * scale,
            scale,
            spans,
        })
    }

    pub fn spans_in<'a>(&'a self, rect: &'a BoundingBox) -> impl Iterator<Item = &'a OverlaySpan> + 'a {
        self.spans
            .iter()
            .filter(move |span| span.bounds().intersects(rect))
    }

    /// Text of every span touching `rect`, in layer order.
    pub fn text_in(&self, rect: &BoundingBox) -> String {
        self.spans_in(rect)
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn full_text(&self) -> String {
        self.spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageContent;
    use bytes::Bytes;

    fn page_with_text() -> PageRecord {
        PageRecord {
            unit: 1,
            content: PageContent::Encoded {
                image_data: Bytes::from_static(b"png"),
                width: 200,
                height: 100,
            },
            text_layer: Some(vec![
                TextSpan {
                    text: "Invoice".into(),
                    bbox: BoundingBox::new(10.0, 10.0, 40.0, 12.0),
                },
                TextSpan {
                    text: "   ".into(),
                    bbox: BoundingBox::new(60.0, 10.0, 5.0, 12.0),
                },
                TextSpan {
                    text: "total".into(),
                    bbox: BoundingBox::new(10.0, 60.0, 30.0, 10.0),
                },
            ]),
        }
    }

    #[test]
    fn spans_share_image_scale() {
        let record = page_with_text();
        let overlay = TextOverlay::layout(&record, 1.5).unwrap();
        assert_eq!(overlay.image_width, 300.0);
        assert_eq!(overlay.image_height, 150.0);
        assert_eq!(overlay.spans.len(), 2);

        let layer = record.text_layer.as_ref().unwrap();
        let first = &overlay.spans[0];
        assert_eq!(first.left / overlay.image_width, layer[0].bbox.x / 200.0);
        assert_eq!(first.top / overlay.image_height, layer[0].bbox.y / 100.0);
        assert_eq!(first.font_size, first.height);
        assert_eq!(first.height, 18.0);
    }

    #[test]
    fn region_selection_picks_touching_spans() {
        let overlay = TextOverlay::layout(&page_with_text(), 1.0).unwrap();
        let top = BoundingBox::new(0.0, 0.0, 200.0, 30.0);
        assert_eq!(overlay.text_in(&top), "Invoice");
        let all = BoundingBox::new(0.0, 0.0, 200.0, 100.0);
        assert_eq!(overlay.text_in(&all), "Invoice total");
        assert_eq!(overlay.full_text(), "Invoice total");
    }

    #[test]
    fn markup_has_no_overlay() {
        let record = PageRecord {
            unit: 1,
            content: PageContent::Markup {
                html: "<p/>".into(),
            },
            text_layer: Some(Vec::new()),
        };
        assert!(TextOverlay::layout(&record, 1.0).is_none());
    }
}
