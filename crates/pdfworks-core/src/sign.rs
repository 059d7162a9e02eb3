//! Visual signatures
//!
//! Places a drawn (image) or typed signature on a page. This is a visible
//! mark only; no cryptographic signature dictionary is written.

use crate::content::{Color, PageOverlay};
use crate::coords::{map_to_page, resolve_overlay_size, NormalizedPosition, OverlaySize, PageSize, PdfRect};
use crate::document::{load_document, page_id, save_document};
use crate::error::PdfWorksError;
use crate::pages::validate_page;
use crate::raster::embed_image;
use crate::text::{text_width, StandardFont};
use tracing::debug;

/// Width of a signature when the caller gives none, in points
pub const DEFAULT_SIGNATURE_WIDTH: f64 = 150.0;
const DEFAULT_TYPED_SIZE: f64 = 28.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SignatureContent {
    /// PNG or JPEG bytes
    Image(Vec<u8>),
    Typed {
        text: String,
        font: StandardFont,
        color: String,
    },
}

impl SignatureContent {
    pub fn typed(text: impl Into<String>) -> Self {
        SignatureContent::Typed {
            text: text.into(),
            font: StandardFont::TimesItalic,
            color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRequest {
    pub content: SignatureContent,
    /// 1-indexed
    pub page: u32,
    pub position: NormalizedPosition,
    /// Overrides the default width; height follows the aspect ratio
    pub width: Option<f64>,
}

impl SignatureRequest {
    pub fn new(content: SignatureContent, page: u32) -> Self {
        Self {
            content,
            page,
            position: NormalizedPosition::default(),
            width: None,
        }
    }
}

/// Size of an image signature: explicit or default width, aspect-preserving
/// height, unless the position carries relative `nw`/`nh`
pub fn signature_size(page: PageSize, position: &NormalizedPosition, width: Option<f64>, aspect_ratio: f64) -> OverlaySize {
    let width = width.filter(|w| *w > 0.0).unwrap_or(DEFAULT_SIGNATURE_WIDTH);
    resolve_overlay_size(page, position, OverlaySize::new(width, width * aspect_ratio))
}

/// Draw a signature on one page
pub fn sign_document(bytes: &[u8], request: &SignatureRequest) -> Result<Vec<u8>, PdfWorksError> {
    match &request.content {
        SignatureContent::Image(data) if data.is_empty() => {
            return Err(PdfWorksError::MissingInput("Signature image is empty".into()));
        }
        SignatureContent::Typed { text, .. } if text.trim().is_empty() => {
            return Err(PdfWorksError::MissingInput("Signature text is empty".into()));
        }
        _ => {}
    }

    let mut doc = load_document(bytes, None)?;
    validate_page(request.page, doc.get_pages().len() as u32)?;
    let id = page_id(&doc, request.page)?;
    let mut overlay = PageOverlay::for_page(&doc, id);
    let page = overlay.size();

    let rect = match &request.content {
        SignatureContent::Image(data) => {
            let image = embed_image(&mut doc, data)?;
            let size = signature_size(page, &request.position, request.width, image.aspect_ratio());
            let origin = map_to_page(page, size, request.position);
            let rect = PdfRect::new(origin.x, origin.y, size.width, size.height);
            overlay.image(image.id, rect, 1.0, 0.0);
            rect
        }
        SignatureContent::Typed { text, font, color } => {
            let text = text.trim();
            let natural = text_width(text, *font, DEFAULT_TYPED_SIZE);
            let font_size = match request.width.filter(|w| *w > 0.0) {
                Some(width) if natural > 0.0 => DEFAULT_TYPED_SIZE * width / natural,
                _ => DEFAULT_TYPED_SIZE,
            };
            let size = OverlaySize::new(text_width(text, *font, font_size), font_size);
            let origin = map_to_page(page, size, request.position);
            // baseline sits a little above the box bottom to leave room for descenders
            overlay.text(
                text,
                origin.x,
                origin.y + font_size * 0.2,
                *font,
                font_size,
                Color::from_hex(color),
                1.0,
            );
            PdfRect::new(origin.x, origin.y, size.width, size.height)
        }
    };

    overlay.apply(&mut doc, id)?;
    debug!(
        "Signature on page {} at ({:.1}, {:.1}) {:.1}x{:.1}",
        request.page, rect.x, rect.y, rect.width, rect.height
    );
    save_document(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, create_test_png, page_content};
    use lopdf::Document;

    #[test]
    fn test_default_size_preserves_aspect() {
        let size = signature_size(PageSize::LETTER, &NormalizedPosition::default(), None, 0.4);
        assert_eq!(size, OverlaySize::new(150.0, 60.0));

        let size = signature_size(PageSize::LETTER, &NormalizedPosition::default(), Some(200.0), 0.5);
        assert_eq!(size, OverlaySize::new(200.0, 100.0));
    }

    #[test]
    fn test_relative_size_wins() {
        let pos = NormalizedPosition::new(0.1, 0.1).with_size(0.5, 0.1);
        let size = signature_size(PageSize::LETTER, &pos, Some(80.0), 1.0);
        assert!((size.width - 306.0).abs() < 1e-9);
        assert!((size.height - 79.2).abs() < 1e-9);
    }

    #[test]
    fn test_image_signature_is_placed_by_mapper() {
        let pdf = create_test_pdf(2, "Sign");
        let request = SignatureRequest {
            content: SignatureContent::Image(create_test_png(300, 100, [0, 0, 128])),
            page: 2,
            position: NormalizedPosition::new(0.7, 0.85),
            width: None,
        };
        let out = sign_document(&pdf, &request).unwrap();
        // 150 x 50 at (0.7, 0.85) lands at (428.4, 68.8)
        let content = page_content(&out, 2);
        assert!(content.contains("Do"));
        assert!(content.contains("428.4"), "{content}");
        assert!(content.contains("68.8"), "{content}");
        assert!(!page_content(&out, 1).contains("Do"));
    }

    #[test]
    fn test_typed_signature() {
        let pdf = create_test_pdf(1, "Sign");
        let request = SignatureRequest::new(SignatureContent::typed("Jane Q. Public"), 1);
        let out = sign_document(&pdf, &request).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        assert!(doc.extract_text(&[1]).unwrap().contains("Jane Q. Public"));
    }

    #[test]
    fn test_rejects_missing_content_and_bad_page() {
        let pdf = create_test_pdf(1, "Sign");
        let empty = SignatureRequest::new(SignatureContent::typed("  "), 1);
        assert!(matches!(
            sign_document(&pdf, &empty),
            Err(PdfWorksError::MissingInput(_))
        ));
        let wrong_page = SignatureRequest::new(SignatureContent::typed("X"), 4);
        assert!(matches!(
            sign_document(&pdf, &wrong_page),
            Err(PdfWorksError::InvalidRange(_))
        ));
    }
}
