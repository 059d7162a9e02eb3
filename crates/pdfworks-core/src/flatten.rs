//! Flattening: every page becomes a single image, dropping form fields,
//! annotations and all other interactive structure.

use crate::document::{load_document, save_document};
use crate::error::PdfWorksError;
use crate::metadata::{read_metadata, write_metadata};
use crate::progress::ProgressReporter;
use crate::raster::{rasterize_document, PageRenderer, RasterLimits, RasterPass};
use tracing::info;

/// JPEG quality for flattened pages
pub const FLATTEN_QUALITY: f64 = 0.92;

/// Rasterize each page at `limits.flatten_scale` (capped by the maximum raster
/// dimension) and rebuild the document from the images. Any render failure
/// aborts the whole operation.
pub fn flatten_document(
    bytes: &[u8],
    renderer: &dyn PageRenderer,
    limits: &RasterLimits,
    progress: &mut ProgressReporter<'_>,
) -> Result<Vec<u8>, PdfWorksError> {
    let source = load_document(bytes, None)?;
    let total = source.get_pages().len();
    progress.processing(10, "Rendering pages");

    let pass = RasterPass {
        password: None,
        scale: limits.flatten_scale,
        quality: FLATTEN_QUALITY,
        band: (10, 90),
    };
    let mut doc = rasterize_document(&source, bytes, renderer, &pass, limits, progress)?;
    write_metadata(&mut doc, &read_metadata(&source));
    let out = save_document(&mut doc)?;
    info!("Flattened {} pages ({} -> {} bytes)", total, bytes.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ConversionProgress, ProgressStatus};
    use crate::test_support::{create_test_pdf, create_test_pdf_with, page_content, FlatRenderer};
    use lopdf::{dictionary, Document, Object};

    #[test]
    fn test_flatten_replaces_content_with_images() {
        let pdf = create_test_pdf(3, "Flat");
        let mut events: Vec<ConversionProgress> = Vec::new();
        let mut sink = |e: ConversionProgress| events.push(e);
        let mut progress = ProgressReporter::new(&mut sink);

        let out = flatten_document(&pdf, &FlatRenderer::default(), &RasterLimits::default(), &mut progress)
            .unwrap();

        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(!doc.extract_text(&[1]).unwrap_or_default().contains("Flat-Page-1"));
        assert!(page_content(&out, 2).contains("Do"));

        assert!(events
            .windows(2)
            .all(|w| w[0].progress <= w[1].progress));
        assert!(events.iter().all(|e| e.status == ProgressStatus::Processing));
    }

    #[test]
    fn test_flatten_drops_annotations() {
        let pdf = create_test_pdf_with(1, "Flat", |_, pages| {
            pages[0].set(
                "Annots",
                vec![Object::Dictionary(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Text",
                    "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                })],
            );
        });
        let mut sink = crate::progress::NoProgress;
        let mut progress = ProgressReporter::new(&mut sink);
        let out = flatten_document(&pdf, &FlatRenderer::default(), &RasterLimits::default(), &mut progress)
            .unwrap();
        let doc = Document::load_mem(&out).unwrap();
        let id = doc.get_pages()[&1];
        assert!(!doc.get_dictionary(id).unwrap().has(b"Annots"));
    }

    #[test]
    fn test_render_failure_aborts() {
        let pdf = create_test_pdf(2, "Flat");
        let renderer = FlatRenderer {
            failing_pages: vec![1],
            ..Default::default()
        };
        let mut sink = crate::progress::NoProgress;
        let mut progress = ProgressReporter::new(&mut sink);
        let err = flatten_document(&pdf, &renderer, &RasterLimits::default(), &mut progress).unwrap_err();
        assert!(matches!(err, PdfWorksError::RenderError(_)));
    }
}
