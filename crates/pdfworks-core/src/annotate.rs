//! Markup annotations: highlights, comments, sticky notes, underline and
//! strikethrough.
//!
//! Each annotation is placed at a top-left-origin [`NormalizedPosition`] and
//! drawn into the page content, so it survives viewers that ignore
//! annotation dictionaries. Comments and sticky notes additionally carry a
//! `/Text` annotation holding the note for viewers that show popups.

use crate::content::{Color, PageOverlay};
use crate::coords::{map_to_page, resolve_overlay_size, NormalizedPosition, OverlaySize, PageSize, PdfRect};
use crate::document::{load_document, page_ids, real, save_document};
use crate::error::PdfWorksError;
use crate::metadata::{encode_text_string, pdf_date};
use crate::pages::validate_page;
use crate::text::{wrap_text, StandardFont};
use chrono::Utc;
use lopdf::{dictionary, Dictionary, Object};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const PADDING: f64 = 4.0;
const LINE_SPACING: f64 = 1.2;
const MAX_BOX_WIDTH: f64 = 250.0;
const MIN_BOX_WIDTH: f64 = 72.0;
const NOTE_ICON: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Highlight,
    Comment,
    StickyNote,
    Underline,
    Strikethrough,
}

impl AnnotationKind {
    fn default_color(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight | AnnotationKind::StickyNote => "#FFEB3B",
            AnnotationKind::Comment => "#2196F3",
            AnnotationKind::Underline => "#000000",
            AnnotationKind::Strikethrough => "#F44336",
        }
    }

    /// Kinds that mark a region and can therefore omit text when sized
    fn marks_region(&self) -> bool {
        matches!(
            self,
            AnnotationKind::Highlight | AnnotationKind::Underline | AnnotationKind::Strikethrough
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// 1-indexed
    pub page: u32,
    #[serde(default)]
    pub position: NormalizedPosition,
    #[serde(default)]
    pub text: String,
    /// Hex color; each kind has its own default
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub author: Option<String>,
}

fn default_font_size() -> f64 {
    11.0
}

impl Annotation {
    pub fn new(kind: AnnotationKind, page: u32, position: NormalizedPosition, text: impl Into<String>) -> Self {
        Self {
            kind,
            page,
            position,
            text: text.into(),
            color: None,
            font_size: default_font_size(),
            author: None,
        }
    }

    fn color(&self) -> Color {
        Color::from_hex(self.color.as_deref().unwrap_or(self.kind.default_color()))
    }

    fn validate(&self, page_count: u32) -> Result<(), PdfWorksError> {
        validate_page(self.page, page_count)?;
        if self.font_size <= 0.0 {
            return Err(PdfWorksError::InvalidInput("Font size must be positive".into()));
        }
        let sized = self.position.nw.is_some() && self.position.nh.is_some();
        if self.text.trim().is_empty() && !(self.kind.marks_region() && sized) {
            return Err(PdfWorksError::MissingInput(format!(
                "{:?} annotation on page {} needs text",
                self.kind, self.page
            )));
        }
        Ok(())
    }
}

/// Text laid out inside an annotation box
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLayout {
    pub rect: PdfRect,
    pub lines: Vec<String>,
    pub line_height: f64,
}

/// Wrap the text to the width available from the anchor to the page edge and
/// place the resulting box through the coordinate mapper
pub fn layout_annotation(page: PageSize, annotation: &Annotation, font: StandardFont) -> AnnotationLayout {
    let pos = annotation.position.clamped();
    let available = page.width * (1.0 - pos.nx) - 2.0 * PADDING;
    let default_width = available.clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH).min(page.width);
    let width = resolve_overlay_size(page, &pos, OverlaySize::new(default_width, 0.0)).width;

    let lines = if annotation.text.trim().is_empty() {
        Vec::new()
    } else {
        wrap_text(
            annotation.text.trim(),
            font,
            annotation.font_size,
            (width - 2.0 * PADDING).max(annotation.font_size),
        )
    };
    let line_height = annotation.font_size * LINE_SPACING;
    let text_height = lines.len() as f64 * line_height + 2.0 * PADDING;
    let height = resolve_overlay_size(page, &pos, OverlaySize::new(width, text_height)).height;

    let size = OverlaySize::new(width, height);
    let origin = map_to_page(page, size, pos);
    AnnotationLayout {
        rect: PdfRect::new(origin.x, origin.y, width, height),
        lines,
        line_height,
    }
}

fn draw_lines(overlay: &mut PageOverlay, layout: &AnnotationLayout, font: StandardFont, size: f64, color: Color) {
    let mut baseline = layout.rect.top() - PADDING - size;
    for line in &layout.lines {
        overlay.text(line, layout.rect.x + PADDING, baseline, font, size, color, 1.0);
        baseline -= layout.line_height;
    }
}

fn note_annotation(annotation: &Annotation, rect: PdfRect, color: Color) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Text",
        "Rect" => rect.to_box().iter().map(|v| real(*v)).collect::<Vec<Object>>(),
        "Contents" => encode_text_string(annotation.text.trim()),
        "Name" => if annotation.kind == AnnotationKind::StickyNote { "Note" } else { "Comment" },
        "Open" => false,
        "F" => 4,
        "C" => vec![
            Object::Real(color.r),
            Object::Real(color.g),
            Object::Real(color.b),
        ],
        "M" => Object::string_literal(pdf_date(Utc::now())),
    };
    if let Some(author) = &annotation.author {
        dict.set("T", encode_text_string(author));
    }
    dict
}

fn draw_annotation(overlay: &mut PageOverlay, annotation: &Annotation) {
    let font = StandardFont::Helvetica;
    let size = annotation.font_size;
    let color = annotation.color();
    let layout = layout_annotation(overlay.size(), annotation, font);
    let rect = layout.rect;

    match annotation.kind {
        AnnotationKind::Highlight => {
            overlay.fill_rect(rect, color, 0.35);
            draw_lines(overlay, &layout, font, size, Color::BLACK);
        }
        AnnotationKind::Underline => {
            draw_lines(overlay, &layout, font, size, Color::BLACK);
            overlay.line(rect.x, rect.y + 1.0, rect.right(), rect.y + 1.0, color, 1.0, 1.0);
        }
        AnnotationKind::Strikethrough => {
            draw_lines(overlay, &layout, font, size, Color::BLACK);
            if layout.lines.is_empty() {
                let mid = rect.y + rect.height / 2.0;
                overlay.line(rect.x, mid, rect.right(), mid, color, 1.0, 1.0);
            }
            // one stroke through the x-height of every line
            let mut baseline = rect.top() - PADDING - size;
            for _ in &layout.lines {
                let y = baseline + size * 0.3;
                overlay.line(rect.x, y, rect.right(), y, color, 1.0, 1.0);
                baseline -= layout.line_height;
            }
        }
        AnnotationKind::Comment => {
            overlay.fill_rect(rect, Color::WHITE, 0.9);
            overlay.stroke_rect(rect, color, 1.0, 1.0);
            draw_lines(overlay, &layout, font, size, Color::BLACK);
            let icon = PdfRect::new(rect.x, rect.top() - NOTE_ICON, NOTE_ICON, NOTE_ICON);
            let user = overlay.to_user_rect(icon);
            overlay.annotation(note_annotation(annotation, user, color));
        }
        AnnotationKind::StickyNote => {
            overlay.fill_rect(rect, color, 0.9);
            overlay.stroke_rect(rect, Color::from_hex("#C8A600"), 0.75, 1.0);
            draw_lines(overlay, &layout, font, size, Color::BLACK);
            let icon = PdfRect::new(rect.right() - NOTE_ICON, rect.top() - NOTE_ICON, NOTE_ICON, NOTE_ICON);
            let user = overlay.to_user_rect(icon);
            overlay.annotation(note_annotation(annotation, user, color));
        }
    }
}

/// Draw every annotation onto its page. All annotations are validated before
/// the document is touched.
pub fn annotate_document(bytes: &[u8], annotations: &[Annotation]) -> Result<Vec<u8>, PdfWorksError> {
    if annotations.is_empty() {
        return Err(PdfWorksError::MissingInput("No annotations supplied".into()));
    }

    let mut doc = load_document(bytes, None)?;
    let ids = page_ids(&doc);
    for annotation in annotations {
        annotation.validate(ids.len() as u32)?;
    }

    let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
    for annotation in annotations {
        by_page.entry(annotation.page).or_default().push(annotation);
    }

    for (page, items) in &by_page {
        let id = ids[*page as usize - 1];
        let mut overlay = PageOverlay::for_page(&doc, id);
        for annotation in items {
            draw_annotation(&mut overlay, annotation);
        }
        overlay.apply(&mut doc, id)?;
    }

    debug!(
        "Drew {} annotations on {} pages",
        annotations.len(),
        by_page.len()
    );
    save_document(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, page_content};
    use crate::text::text_width;
    use lopdf::Document;

    fn annotations_on(bytes: &[u8], page: u32) -> Vec<Dictionary> {
        let doc = Document::load_mem(bytes).unwrap();
        let id = doc.get_pages()[&page];
        let page = doc.get_dictionary(id).unwrap();
        match page.get(b"Annots") {
            Ok(Object::Array(items)) => items
                .iter()
                .map(|o| doc.get_dictionary(o.as_reference().unwrap()).unwrap().clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_layout_wraps_to_available_width() {
        let text = "The quick brown fox jumps over the lazy dog again and again and again";
        let annotation = Annotation::new(
            AnnotationKind::Comment,
            1,
            NormalizedPosition::new(0.1, 0.1),
            text,
        );
        let layout = layout_annotation(PageSize::LETTER, &annotation, StandardFont::Helvetica);
        assert!(layout.lines.len() > 1);
        assert_eq!(layout.rect.width, MAX_BOX_WIDTH);
        for line in &layout.lines {
            assert!(text_width(line, StandardFont::Helvetica, 11.0) <= MAX_BOX_WIDTH - 2.0 * PADDING);
        }
        // top edge sits at the normalized anchor
        assert!((layout.rect.top() - 792.0 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_layout_near_right_edge_stays_on_page() {
        let annotation = Annotation::new(
            AnnotationKind::Highlight,
            1,
            NormalizedPosition::new(0.98, 0.99),
            "edge case",
        );
        let layout = layout_annotation(PageSize::LETTER, &annotation, StandardFont::Helvetica);
        assert!(layout.rect.right() <= 612.0 + 1e-9);
        assert!(layout.rect.y >= 0.0);
    }

    #[test]
    fn test_comment_adds_text_annotation() {
        let pdf = create_test_pdf(2, "A");
        let mut comment = Annotation::new(
            AnnotationKind::Comment,
            2,
            NormalizedPosition::new(0.2, 0.2),
            "Check this figure",
        );
        comment.author = Some("Reviewer".into());
        let out = annotate_document(&pdf, &[comment]).unwrap();

        assert!(annotations_on(&out, 1).is_empty());
        let annots = annotations_on(&out, 2);
        assert_eq!(annots.len(), 1);
        assert_eq!(annots[0].get(b"Subtype").unwrap().as_name().unwrap(), b"Text");

        let doc = Document::load_mem(&out).unwrap();
        assert!(doc.extract_text(&[2]).unwrap().contains("Check this figure"));
    }

    #[test]
    fn test_highlight_and_strikethrough_draw_without_annotation_dicts() {
        let pdf = create_test_pdf(1, "A");
        let annotations = vec![
            Annotation::new(
                AnnotationKind::Highlight,
                1,
                NormalizedPosition::new(0.1, 0.1).with_size(0.3, 0.05),
                "",
            ),
            Annotation::new(
                AnnotationKind::Strikethrough,
                1,
                NormalizedPosition::new(0.1, 0.5),
                "obsolete clause",
            ),
        ];
        let out = annotate_document(&pdf, &annotations).unwrap();
        assert!(annotations_on(&out, 1).is_empty());
        let content = page_content(&out, 1);
        assert!(content.contains(" re"));
        assert!(content.contains(" l"));
    }

    #[test]
    fn test_validation_happens_before_mutation() {
        let pdf = create_test_pdf(1, "A");
        let out_of_range = Annotation::new(
            AnnotationKind::StickyNote,
            3,
            NormalizedPosition::default(),
            "note",
        );
        assert!(matches!(
            annotate_document(&pdf, &[out_of_range]),
            Err(PdfWorksError::InvalidRange(_))
        ));

        let empty = Annotation::new(AnnotationKind::Comment, 1, NormalizedPosition::default(), " ");
        assert!(matches!(
            annotate_document(&pdf, &[empty]),
            Err(PdfWorksError::MissingInput(_))
        ));
        assert!(annotate_document(&pdf, &[]).is_err());
    }
}
