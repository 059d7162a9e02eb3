//! Page selection and page range parsing

use crate::error::PdfWorksError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Which pages an operation applies to (1-indexed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "pages", rename_all = "lowercase")]
pub enum PageSelection {
    #[default]
    All,
    Odd,
    Even,
    List(Vec<u32>),
}

impl PageSelection {
    /// Resolve to sorted, unique 1-indexed page numbers.
    ///
    /// Fails when the selection names a page outside the document or matches nothing.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>, PdfWorksError> {
        if page_count == 0 {
            return Err(PdfWorksError::InvalidInput("Document has no pages".into()));
        }

        let pages: Vec<u32> = match self {
            PageSelection::All => (1..=page_count).collect(),
            PageSelection::Odd => (1..=page_count).filter(|p| p % 2 == 1).collect(),
            PageSelection::Even => (1..=page_count).filter(|p| p % 2 == 0).collect(),
            PageSelection::List(list) => {
                if list.is_empty() {
                    return Err(PdfWorksError::InvalidRange("No pages specified".into()));
                }
                for &page in list {
                    validate_page(page, page_count)?;
                }
                let unique: BTreeSet<u32> = list.iter().copied().collect();
                unique.into_iter().collect()
            }
        };

        if pages.is_empty() {
            return Err(PdfWorksError::InvalidRange(format!(
                "Selection {:?} matches no pages (document has {} pages)",
                self, page_count
            )));
        }

        Ok(pages)
    }
}

impl FromStr for PageSelection {
    type Err = PdfWorksError;

    /// Accepts `all`, `odd`, `even`, or a range list like `1-3, 5`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(PageSelection::All),
            "odd" => Ok(PageSelection::Odd),
            "even" => Ok(PageSelection::Even),
            other => Ok(PageSelection::List(parse_ranges(other)?)),
        }
    }
}

/// Check a 1-indexed page number against the document's page count
pub fn validate_page(page: u32, page_count: u32) -> Result<(), PdfWorksError> {
    if page == 0 {
        return Err(PdfWorksError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }
    if page > page_count {
        return Err(PdfWorksError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page, page_count
        )));
    }
    Ok(())
}

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers
pub fn parse_ranges(input: &str) -> Result<Vec<u32>, PdfWorksError> {
    let mut pages = BTreeSet::new();

    for (start, end) in parse_range_pairs(input)? {
        for page in start..=end {
            pages.insert(page);
        }
    }

    Ok(pages.into_iter().collect())
}

/// Parse "1-3, 5" into inclusive `(start, end)` pairs, preserving order
pub fn parse_range_pairs(input: &str) -> Result<Vec<(u32, u32)>, PdfWorksError> {
    let mut ranges = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfWorksError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfWorksError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfWorksError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            ranges.push((start, end));
        } else {
            let page: u32 = part
                .parse()
                .map_err(|_| PdfWorksError::InvalidRange(format!("Invalid page: {}", part)))?;
            ranges.push((page, page));
        }
    }

    Ok(ranges)
}
