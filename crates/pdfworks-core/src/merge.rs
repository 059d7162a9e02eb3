//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document::{load_document, save_document, DocumentBuilder};
use crate::error::PdfWorksError;
use crate::metadata::{read_metadata, write_metadata, PRODUCER};
use tracing::info;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, validate it and return it as-is
/// 3. Load every source (a source that fails to load aborts the merge)
/// 4. Import each source's pages, in order, into a fresh document
/// 5. Carry over the first document's metadata, compress and serialize
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfWorksError> {
    if documents.is_empty() {
        return Err(PdfWorksError::MissingInput("No documents to merge".into()));
    }

    if documents.len() == 1 {
        load_document(&documents[0], None)?;
        return Ok(documents.into_iter().next().unwrap_or_default());
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.iter().enumerate() {
        let doc = load_document(bytes, None).map_err(|e| match e {
            PdfWorksError::ParseError(msg) => {
                PdfWorksError::ParseError(format!("Failed to load document {}: {}", i + 1, msg))
            }
            other => other,
        })?;
        loaded.push(doc);
    }

    let mut builder = DocumentBuilder::new();
    for source in &loaded {
        builder.import_pages(source, None)?;
    }
    let page_count = builder.page_count();
    let mut dest = builder.finish()?;

    let mut metadata = read_metadata(&loaded[0]);
    metadata.producer = Some(PRODUCER.to_string());
    write_metadata(&mut dest, &metadata);

    dest.compress();
    info!(
        "Merged {} documents into {} pages",
        loaded.len(),
        page_count
    );
    save_document(&mut dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pdf;
    use lopdf::Document;

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(vec![]);
        assert!(matches!(result, Err(PdfWorksError::MissingInput(_))));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let pdf = create_test_pdf(2, "Only");
        let result = merge_documents(vec![pdf.clone()]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_merge_single_invalid_document_fails() {
        assert!(merge_documents(vec![b"%PDF-1.7 garbage".to_vec()]).is_err());
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let pdf1 = create_test_pdf(2, "A");
        let pdf2 = create_test_pdf(3, "B");

        let result = merge_documents(vec![pdf1, pdf2]).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let pdf1 = create_test_pdf(2, "First");
        let pdf2 = create_test_pdf(1, "Second");
        let pdf3 = create_test_pdf(2, "Third");

        let result = merge_documents(vec![pdf1, pdf2, pdf3]).unwrap();
        let doc = Document::load_mem(&result).unwrap();

        let expected = [
            "First-Page-1",
            "First-Page-2",
            "Second-Page-1",
            "Third-Page-1",
            "Third-Page-2",
        ];
        for (i, marker) in expected.iter().enumerate() {
            let text = doc.extract_text(&[i as u32 + 1]).unwrap();
            assert!(text.contains(marker), "page {}: {:?}", i + 1, text);
        }
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let docs = vec![
            create_test_pdf(1, "S"),
            create_test_pdf(10, "M"),
            create_test_pdf(5, "L"),
        ];
        let result = merge_documents(docs).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 16, "Merged document should have 16 pages");
    }

    #[test]
    fn test_merge_reports_which_document_failed() {
        let err = merge_documents(vec![create_test_pdf(1, "Ok"), b"junk!!!!!".to_vec()])
            .unwrap_err();
        assert!(err.to_string().contains("document 2"), "{err}");
    }

    #[test]
    fn test_merge_sets_producer() {
        let result = merge_documents(vec![create_test_pdf(1, "A"), create_test_pdf(1, "B")]).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(read_metadata(&doc).producer.as_deref(), Some(PRODUCER));
    }
}
