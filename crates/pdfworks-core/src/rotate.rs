//! Page rotation

use crate::document::{load_document, page_id, rotation, save_document, set_rotation};
use crate::error::PdfWorksError;
use crate::pages::PageSelection;
use tracing::debug;

/// Rotation after applying `angle` clockwise to `existing`, normalized to 0-359
pub fn compose_rotation(existing: i64, angle: i64) -> i64 {
    (existing + angle).rem_euclid(360)
}

/// Rotate the selected pages clockwise by 90, 180 or 270 degrees
pub fn rotate_pages(bytes: &[u8], selection: &PageSelection, angle: i64) -> Result<Vec<u8>, PdfWorksError> {
    if !matches!(angle, 90 | 180 | 270) {
        return Err(PdfWorksError::InvalidInput(format!(
            "Rotation must be 90, 180 or 270 degrees, got {}",
            angle
        )));
    }

    let mut doc = load_document(bytes, None)?;
    let page_count = doc.get_pages().len() as u32;
    let pages = selection.resolve(page_count)?;

    for number in &pages {
        let id = page_id(&doc, *number)?;
        let new_rotation = compose_rotation(rotation(&doc, id), angle);
        set_rotation(&mut doc, id, new_rotation)?;
    }

    debug!("Rotated {} of {} pages by {}", pages.len(), page_count, angle);
    save_document(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, create_test_pdf_with};
    use lopdf::Document;

    fn rotations(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| rotation(&doc, *id))
            .collect()
    }

    #[test]
    fn test_compose_rotation() {
        assert_eq!(compose_rotation(0, 90), 90);
        assert_eq!(compose_rotation(270, 180), 90);
        assert_eq!(compose_rotation(90, 270), 0);
    }

    #[test]
    fn test_rotate_twice_by_90_is_180() {
        let pdf = create_test_pdf(2, "Rot");
        let once = rotate_pages(&pdf, &PageSelection::All, 90).unwrap();
        let twice = rotate_pages(&once, &PageSelection::All, 90).unwrap();
        assert_eq!(rotations(&twice), vec![180, 180]);
    }

    #[test]
    fn test_rotate_even_pages_only() {
        let pdf = create_test_pdf(4, "Rot");
        let out = rotate_pages(&pdf, &PageSelection::Even, 270).unwrap();
        assert_eq!(rotations(&out), vec![0, 270, 0, 270]);
    }

    #[test]
    fn test_rotate_composes_with_inherited_rotation() {
        let pdf = create_test_pdf_with(1, "Rot", |pages, _| {
            pages.set("Rotate", 180);
        });
        let out = rotate_pages(&pdf, &PageSelection::List(vec![1]), 270).unwrap();
        assert_eq!(rotations(&out), vec![90]);
    }

    #[test]
    fn test_rotate_rejects_bad_angle_and_empty_selection() {
        let pdf = create_test_pdf(1, "Rot");
        assert!(rotate_pages(&pdf, &PageSelection::All, 45).is_err());
        assert!(rotate_pages(&pdf, &PageSelection::All, 0).is_err());
        assert!(rotate_pages(&pdf, &PageSelection::Even, 90).is_err());
    }
}
