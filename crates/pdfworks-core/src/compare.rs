//! Side-by-side document comparison

use crate::content::{Color, PageOverlay};
use crate::coords::{PageSize, PdfRect};
use crate::document::{displayed_size, load_document, page_ids, save_document, DocumentBuilder};
use crate::error::PdfWorksError;
use crate::progress::ProgressReporter;
use crate::raster::{bounded_scale, embed_raster, import_objects, page_form, EmbeddedImage, PageRenderer, RasterLimits};
use crate::text::{text_width, StandardFont};
use lopdf::{dictionary, Dictionary, Document, Object};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

const GUTTER: f64 = 24.0;
const HEADER: f64 = 48.0;
const COMPARE_SCALE: f64 = 1.5;
const COMPARE_QUALITY: f64 = 0.8;

/// Jaccard similarity of the lower-cased whitespace tokens of two texts.
/// Two empty texts are identical.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.split_whitespace().map(|t| t.to_lowercase()).collect()
    };
    let left = tokens(a);
    let right = tokens(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageComparison {
    /// 1-indexed
    pub page: u32,
    pub in_left: bool,
    pub in_right: bool,
    pub similarity: f64,
    pub differs: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub left_pages: u32,
    pub right_pages: u32,
    pub pages: Vec<PageComparison>,
    /// Mean of the per-page similarities
    pub overall_similarity: f64,
    pub differing_pages: Vec<u32>,
}

pub struct ComparisonOutput {
    pub document: Vec<u8>,
    pub report: ComparisonReport,
}

enum Panel {
    Page(EmbeddedImage),
    Missing,
    Failed(String),
}

struct Side<'a> {
    bytes: &'a [u8],
    doc: Document,
    ids: Vec<lopdf::ObjectId>,
    /// Id offset of the imported objects when pages are embedded as vectors
    offset: Option<u32>,
}

impl<'a> Side<'a> {
    fn load(bytes: &'a [u8]) -> Result<Self, PdfWorksError> {
        let doc = load_document(bytes, None)?;
        let ids = page_ids(&doc);
        Ok(Self {
            bytes,
            doc,
            ids,
            offset: None,
        })
    }

    fn text(&self, page: u32) -> String {
        if page as usize > self.ids.len() {
            return String::new();
        }
        self.doc.extract_text(&[page]).unwrap_or_default()
    }

    fn size(&self, page: u32) -> Option<PageSize> {
        self.ids
            .get(page as usize - 1)
            .map(|id| displayed_size(&self.doc, *id))
    }

    fn panel(
        &self,
        target: &mut Document,
        page: u32,
        renderer: Option<&dyn PageRenderer>,
        limits: &RasterLimits,
    ) -> Panel {
        let Some(size) = self.size(page) else {
            return Panel::Missing;
        };
        let result = match (renderer, self.offset) {
            (Some(renderer), _) => {
                let scale = bounded_scale(size, COMPARE_SCALE, limits);
                renderer
                    .render_page(self.bytes, None, page - 1, scale)
                    .and_then(|image| embed_raster(target, &image, COMPARE_QUALITY))
            }
            (None, Some(offset)) => page_form(target, &self.doc, page, offset),
            (None, None) => Err(PdfWorksError::RenderError("No renderer".into())),
        };
        match result {
            Ok(image) => Panel::Page(image),
            Err(e) => {
                warn!("Comparison panel for page {} failed: {}", page, e);
                Panel::Failed(e.to_string())
            }
        }
    }
}

fn draw_centered(overlay: &mut PageOverlay, text: &str, rect: PdfRect, size: f64, color: Color) {
    let font = StandardFont::Helvetica;
    let width = text_width(text, font, size);
    let x = rect.x + ((rect.width - width) / 2.0).max(0.0);
    overlay.text(text, x, rect.y + rect.height / 2.0, font, size, color, 1.0);
}

fn draw_panel(overlay: &mut PageOverlay, panel: &Panel, rect: PdfRect) {
    match panel {
        Panel::Page(image) => overlay.image(image.id, rect, 1.0, 0.0),
        Panel::Missing => {
            overlay.fill_rect(rect, Color::from_hex("#EEEEEE"), 1.0);
            draw_centered(overlay, "Missing page", rect, 18.0, Color::from_hex("#757575"));
        }
        Panel::Failed(message) => {
            overlay.fill_rect(rect, Color::from_hex("#FDECEA"), 1.0);
            draw_centered(overlay, "Could not render page", rect, 18.0, Color::from_hex("#C62828"));
            let detail: String = message.chars().take(80).collect();
            let below = PdfRect::new(rect.x, rect.y, rect.width, rect.height - 48.0);
            draw_centered(overlay, &detail, below, 9.0, Color::from_hex("#C62828"));
        }
    }
    overlay.stroke_rect(rect, Color::from_hex("#9E9E9E"), 0.5, 1.0);
}

/// Compare two documents page by page.
///
/// The output has one landscape page per index up to the larger page count,
/// showing the left page beside the right one. Pages are rasterized through
/// `renderer` when one is given and embedded as vector forms otherwise. A
/// page that fails to render becomes an error panel instead of aborting.
pub fn compare_documents(
    left: &[u8],
    right: &[u8],
    renderer: Option<&dyn PageRenderer>,
    limits: &RasterLimits,
    progress: &mut ProgressReporter<'_>,
) -> Result<ComparisonOutput, PdfWorksError> {
    let mut left = Side::load(left)?;
    let mut right = Side::load(right)?;
    let total = left.ids.len().max(right.ids.len()) as u32;
    progress.processing(10, "Comparing pages");

    let mut builder = DocumentBuilder::new();
    if renderer.is_none() {
        left.offset = Some(import_objects(builder.document_mut(), &left.doc));
        right.offset = Some(import_objects(builder.document_mut(), &right.doc));
    }

    let mut pages = Vec::with_capacity(total as usize);
    for page in 1..=total {
        let left_text = left.text(page);
        let right_text = right.text(page);
        let in_left = (page as usize) <= left.ids.len();
        let in_right = (page as usize) <= right.ids.len();
        let similarity = if in_left && in_right {
            jaccard_similarity(&left_text, &right_text)
        } else {
            0.0
        };
        let same_text = left_text.split_whitespace().eq(right_text.split_whitespace());
        let comparison = PageComparison {
            page,
            in_left,
            in_right,
            similarity,
            differs: !(in_left && in_right && same_text),
        };

        let doc = builder.document_mut();
        let left_panel = left.panel(doc, page, renderer, limits);
        let right_panel = right.panel(doc, page, renderer, limits);

        let fallback = PageSize::LETTER;
        let l = left.size(page).or(right.size(page)).unwrap_or(fallback);
        let r = right.size(page).or(left.size(page)).unwrap_or(fallback);
        let panel_height = l.height.max(r.height);
        let width = l.width + r.width + 3.0 * GUTTER;
        let height = panel_height + HEADER + GUTTER;

        let mut overlay = PageOverlay::with_frame(PdfRect::new(0.0, 0.0, width, height), 0);
        let header = if comparison.differs {
            format!("Page {}: {:.0}% similar", page, similarity * 100.0)
        } else {
            format!("Page {}: no text differences", page)
        };
        let header_color = if comparison.differs {
            Color::from_hex("#C62828")
        } else {
            Color::from_hex("#2E7D32")
        };
        overlay.text(&header, GUTTER, height - 28.0, StandardFont::HelveticaBold, 14.0, header_color, 1.0);

        let left_rect = PdfRect::new(GUTTER, GUTTER + panel_height - l.height, l.width, l.height);
        let right_rect = PdfRect::new(2.0 * GUTTER + l.width, GUTTER + panel_height - r.height, r.width, r.height);
        overlay.text("Original", left_rect.x, left_rect.top() + 6.0, StandardFont::Helvetica, 10.0, Color::BLACK, 1.0);
        overlay.text("Modified", right_rect.x, right_rect.top() + 6.0, StandardFont::Helvetica, 10.0, Color::BLACK, 1.0);
        draw_panel(&mut overlay, &left_panel, left_rect);
        draw_panel(&mut overlay, &right_panel, right_rect);

        let page_id = builder.add_page(dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width as f32), Object::Real(height as f32)],
            "Resources" => Dictionary::new(),
        });
        overlay.apply(builder.document_mut(), page_id)?;

        pages.push(comparison);
        progress.step(
            page as usize,
            total as usize,
            10,
            90,
            &format!("Compared page {} of {}", page, total),
        );
    }

    let mut doc = builder.finish()?;
    doc.compress();
    let document = save_document(&mut doc)?;

    let overall_similarity = if pages.is_empty() {
        1.0
    } else {
        pages.iter().map(|p| p.similarity).sum::<f64>() / pages.len() as f64
    };
    let differing_pages: Vec<u32> = pages.iter().filter(|p| p.differs).map(|p| p.page).collect();
    info!(
        "Compared {} pages: {} differ, overall similarity {:.2}",
        total,
        differing_pages.len(),
        overall_similarity
    );

    Ok(ComparisonOutput {
        document,
        report: ComparisonReport {
            left_pages: left.ids.len() as u32,
            right_pages: right.ids.len() as u32,
            pages,
            overall_similarity,
            differing_pages,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::test_support::{create_test_pdf, FlatRenderer};

    fn compare(left: &[u8], right: &[u8], renderer: Option<&dyn PageRenderer>) -> ComparisonOutput {
        let mut sink = NoProgress;
        let mut progress = ProgressReporter::new(&mut sink);
        compare_documents(left, right, renderer, &RasterLimits::default(), &mut progress).unwrap()
    }

    fn page_text(bytes: &[u8], page: u32) -> String {
        Document::load_mem(bytes).unwrap().extract_text(&[page]).unwrap()
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity("a b c", "a b d"), 0.5);
        assert_eq!(jaccard_similarity("Hello World", "world hello"), 1.0);
        assert_eq!(jaccard_similarity("", "  "), 1.0);
        assert_eq!(jaccard_similarity("text", ""), 0.0);
    }

    #[test]
    fn test_identical_documents() {
        let pdf = create_test_pdf(2, "Same");
        let output = compare(&pdf, &pdf, None);
        assert_eq!(output.report.pages.len(), 2);
        assert!(output.report.differing_pages.is_empty());
        assert_eq!(output.report.overall_similarity, 1.0);
        assert_eq!(Document::load_mem(&output.document).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn test_missing_page_gets_placeholder() {
        let left = create_test_pdf(3, "Doc");
        let right = create_test_pdf(2, "Doc");
        let output = compare(&left, &right, None);

        let last = &output.report.pages[2];
        assert!(last.in_left);
        assert!(!last.in_right);
        assert!(last.differs);
        assert_eq!(output.report.differing_pages, vec![3]);
        assert!(page_text(&output.document, 3).contains("Missing page"));
    }

    #[test]
    fn test_changed_text_is_flagged() {
        let left = create_test_pdf(1, "Alpha");
        let right = create_test_pdf(1, "Beta");
        let output = compare(&left, &right, None);
        let page = &output.report.pages[0];
        assert!(page.differs);
        assert_eq!(page.similarity, 0.0);
    }

    #[test]
    fn test_render_failure_becomes_error_panel() {
        let pdf = create_test_pdf(2, "Doc");
        let renderer = FlatRenderer {
            failing_pages: vec![1],
            ..Default::default()
        };
        let output = compare(&pdf, &pdf, Some(&renderer));
        assert_eq!(Document::load_mem(&output.document).unwrap().get_pages().len(), 2);
        assert!(page_text(&output.document, 2).contains("Could not render page"));
        assert!(!page_text(&output.document, 1).contains("Could not render page"));
    }
}
