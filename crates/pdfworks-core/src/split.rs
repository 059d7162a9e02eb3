//! PDF Split algorithm and page organization
//!
//! Every output is constructed by whitelist: only the requested pages are
//! imported into a fresh document, so resources used solely by dropped pages
//! never reach the output.

use crate::document::{load_document, save_document, DocumentBuilder};
use crate::error::PdfWorksError;
use crate::metadata::{read_metadata, write_metadata};
use crate::pages::validate_page;
use lopdf::Document;
use std::collections::BTreeSet;
use tracing::info;

fn build_from_pages(source: &Document, pages: &[u32]) -> Result<Vec<u8>, PdfWorksError> {
    let mut builder = DocumentBuilder::new();
    builder.import_pages(source, Some(pages))?;
    let mut doc = builder.finish()?;
    write_metadata(&mut doc, &read_metadata(source));
    doc.compress();
    save_document(&mut doc)
}

/// Validate 1-indexed inclusive ranges against the page count
pub fn validate_ranges(ranges: &[(u32, u32)], page_count: u32) -> Result<(), PdfWorksError> {
    if ranges.is_empty() {
        return Err(PdfWorksError::InvalidRange("No page ranges specified".into()));
    }
    for &(start, end) in ranges {
        if start == 0 || end == 0 {
            return Err(PdfWorksError::InvalidRange(
                "Page numbers must be >= 1".into(),
            ));
        }
        if start > end {
            return Err(PdfWorksError::InvalidRange(format!(
                "Start {} > end {}",
                start, end
            )));
        }
        validate_page(end, page_count)?;
    }
    Ok(())
}

/// Split a PDF into one document per 1-indexed inclusive range
pub fn split_document(bytes: &[u8], ranges: &[(u32, u32)]) -> Result<Vec<Vec<u8>>, PdfWorksError> {
    if ranges.is_empty() {
        return Err(PdfWorksError::InvalidRange("No page ranges specified".into()));
    }

    let doc = load_document(bytes, None)?;
    let page_count = doc.get_pages().len() as u32;
    validate_ranges(ranges, page_count)?;

    let outputs = ranges
        .iter()
        .map(|&(start, end)| {
            let pages: Vec<u32> = (start..=end).collect();
            build_from_pages(&doc, &pages)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Split {} pages into {} documents", page_count, outputs.len());
    Ok(outputs)
}

/// Extract the listed pages, in the listed order, into one document
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfWorksError> {
    if pages.is_empty() {
        return Err(PdfWorksError::InvalidRange("No pages specified".into()));
    }

    let doc = load_document(bytes, None)?;
    let page_count = doc.get_pages().len() as u32;
    for &page in pages {
        validate_page(page, page_count)?;
    }

    build_from_pages(&doc, pages)
}

/// Rearrange pages; `order` must name every page exactly once
pub fn reorder_pages(bytes: &[u8], order: &[u32]) -> Result<Vec<u8>, PdfWorksError> {
    let doc = load_document(bytes, None)?;
    let page_count = doc.get_pages().len() as u32;

    if order.len() != page_count as usize {
        return Err(PdfWorksError::InvalidRange(format!(
            "New order lists {} pages but the document has {}",
            order.len(),
            page_count
        )));
    }
    let mut seen = BTreeSet::new();
    for &page in order {
        validate_page(page, page_count)?;
        if !seen.insert(page) {
            return Err(PdfWorksError::InvalidRange(format!(
                "Page {} appears more than once",
                page
            )));
        }
    }

    build_from_pages(&doc, order)
}

/// Remove the listed pages; at least one page must remain
pub fn delete_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfWorksError> {
    if pages.is_empty() {
        return Err(PdfWorksError::InvalidRange("No pages specified".into()));
    }

    let doc = load_document(bytes, None)?;
    let page_count = doc.get_pages().len() as u32;
    for &page in pages {
        validate_page(page, page_count)?;
    }

    let removed: BTreeSet<u32> = pages.iter().copied().collect();
    let kept: Vec<u32> = (1..=page_count).filter(|p| !removed.contains(p)).collect();
    if kept.is_empty() {
        return Err(PdfWorksError::InvalidInput(
            "Cannot delete every page of a document".into(),
        ));
    }

    build_from_pages(&doc, &kept)
}
