//! Page numbers, headers and footers

use crate::content::{Color, PageOverlay};
use crate::coords::PageSize;
use crate::document::{load_document, page_ids, save_document};
use crate::error::PdfWorksError;
use crate::pages::PageSelection;
use crate::text::{text_width, StandardFont};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Bottom,
}

/// Where on the page a stamp goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StampPosition {
    pub vertical: VerticalAlign,
    pub horizontal: HorizontalAlign,
}

impl std::str::FromStr for StampPosition {
    type Err = PdfWorksError;

    /// `top-left`, `bottom-center`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (v, h) = lower
            .split_once('-')
            .ok_or_else(|| PdfWorksError::InvalidInput(format!("Invalid position: {}", s)))?;
        let vertical = match v {
            "top" => VerticalAlign::Top,
            "bottom" => VerticalAlign::Bottom,
            _ => return Err(PdfWorksError::InvalidInput(format!("Invalid position: {}", s))),
        };
        let horizontal = match h {
            "left" => HorizontalAlign::Left,
            "center" | "centre" => HorizontalAlign::Center,
            "right" => HorizontalAlign::Right,
            _ => return Err(PdfWorksError::InvalidInput(format!("Invalid position: {}", s))),
        };
        Ok(Self {
            vertical,
            horizontal,
        })
    }
}

/// Font, color, margin and numbering shared by page numbers and header/footer text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampStyle {
    pub font: StandardFont,
    pub font_size: f64,
    pub color: String,
    /// Distance from the page edge in points
    pub margin: f64,
    /// Number shown on the first page of the document
    pub start_number: u32,
    /// Value for `{date}`; today's date when absent
    pub date: Option<String>,
    pub pages: PageSelection,
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            font: StandardFont::Helvetica,
            font_size: 12.0,
            color: "#000000".to_string(),
            margin: 36.0,
            start_number: 1,
            date: None,
            pages: PageSelection::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumberOptions {
    /// Template; see [`render_template`]
    pub format: String,
    pub position: StampPosition,
    pub style: StampStyle,
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            format: "{page}".to_string(),
            position: StampPosition::default(),
            style: StampStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooterOptions {
    pub header: Option<String>,
    pub header_align: HorizontalAlign,
    pub footer: Option<String>,
    pub footer_align: HorizontalAlign,
    pub style: StampStyle,
}

/// Expand `{page}`, `{total}` and `{date}`
pub fn render_template(template: &str, page: u32, total: u32, date: &str) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{total}", &total.to_string())
        .replace("{date}", date)
}

/// Baseline origin for a line of text of `width` points
pub fn stamp_origin(page: PageSize, width: f64, font_size: f64, margin: f64, position: StampPosition) -> (f64, f64) {
    let x = match position.horizontal {
        HorizontalAlign::Left => margin,
        HorizontalAlign::Center => (page.width - width) / 2.0,
        HorizontalAlign::Right => page.width - margin - width,
    };
    let y = match position.vertical {
        VerticalAlign::Top => page.height - margin - font_size,
        VerticalAlign::Bottom => margin,
    };
    (x, y)
}

/// Draw one or more templated lines on each selected page
fn stamp_pages(bytes: &[u8], style: &StampStyle, lines: &[(String, StampPosition)]) -> Result<Vec<u8>, PdfWorksError> {
    if style.font_size <= 0.0 {
        return Err(PdfWorksError::InvalidInput("Font size must be positive".into()));
    }
    if style.margin < 0.0 {
        return Err(PdfWorksError::InvalidInput("Margin must be non-negative".into()));
    }

    let mut doc = load_document(bytes, None)?;
    let ids = page_ids(&doc);
    let page_count = ids.len() as u32;
    let selected = style.pages.resolve(page_count)?;

    let date = style
        .date
        .clone()
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
    let offset = style.start_number.saturating_sub(1);
    let total = page_count.checked_add(offset).ok_or_else(|| {
        PdfWorksError::InvalidInput(format!("Start number {} is too large", style.start_number))
    })?;
    let color = Color::from_hex(&style.color);

    for number in selected {
        let id = ids[number as usize - 1];
        // number <= page_count, so this cannot exceed total
        let shown = number + offset;
        let mut overlay = PageOverlay::for_page(&doc, id);
        let page = overlay.size();

        for (template, position) in lines {
            let text = render_template(template, shown, total, &date);
            if text.trim().is_empty() {
                continue;
            }
            let width = text_width(&text, style.font, style.font_size);
            let (x, y) = stamp_origin(page, width, style.font_size, style.margin, *position);
            overlay.text(&text, x, y, style.font, style.font_size, color, 1.0);
        }

        overlay.apply(&mut doc, id)?;
    }

    save_document(&mut doc)
}

/// Number the selected pages
pub fn add_page_numbers(bytes: &[u8], options: &PageNumberOptions) -> Result<Vec<u8>, PdfWorksError> {
    if options.format.trim().is_empty() {
        return Err(PdfWorksError::MissingInput("Page number format is empty".into()));
    }
    stamp_pages(
        bytes,
        &options.style,
        &[(options.format.clone(), options.position)],
    )
}

/// Add a header, a footer, or both to the selected pages
pub fn add_header_footer(bytes: &[u8], options: &HeaderFooterOptions) -> Result<Vec<u8>, PdfWorksError> {
    let mut lines = Vec::new();
    if let Some(header) = options.header.as_ref().filter(|h| !h.trim().is_empty()) {
        lines.push((
            header.clone(),
            StampPosition {
                vertical: VerticalAlign::Top,
                horizontal: options.header_align,
            },
        ));
    }
    if let Some(footer) = options.footer.as_ref().filter(|f| !f.trim().is_empty()) {
        lines.push((
            footer.clone(),
            StampPosition {
                vertical: VerticalAlign::Bottom,
                horizontal: options.footer_align,
            },
        ));
    }
    if lines.is_empty() {
        return Err(PdfWorksError::MissingInput(
            "Header or footer text is required".into(),
        ));
    }
    stamp_pages(bytes, &options.style, &lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pdf;
    use lopdf::Document;

    fn texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        (1..=doc.get_pages().len() as u32)
            .map(|p| doc.extract_text(&[p]).unwrap())
            .collect()
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("Page {page} of {total} ({date})", 2, 9, "2024-05-01"),
            "Page 2 of 9 (2024-05-01)"
        );
        assert_eq!(render_template("plain", 1, 1, ""), "plain");
    }

    #[test]
    fn test_stamp_position_parse() {
        let pos: StampPosition = "top-right".parse().unwrap();
        assert_eq!(pos.vertical, VerticalAlign::Top);
        assert_eq!(pos.horizontal, HorizontalAlign::Right);
        assert!("middle".parse::<StampPosition>().is_err());
    }

    #[test]
    fn test_stamp_origin_alignment() {
        let page = PageSize::LETTER;
        let bottom_center = StampPosition::default();
        assert_eq!(stamp_origin(page, 100.0, 12.0, 36.0, bottom_center), (256.0, 36.0));
        let top_right = StampPosition {
            vertical: VerticalAlign::Top,
            horizontal: HorizontalAlign::Right,
        };
        assert_eq!(stamp_origin(page, 100.0, 12.0, 36.0, top_right), (476.0, 744.0));
    }

    #[test]
    fn test_page_numbers_with_start_number() {
        let pdf = create_test_pdf(3, "N");
        let options = PageNumberOptions {
            format: "Page {page} of {total}".into(),
            style: StampStyle {
                start_number: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = add_page_numbers(&pdf, &options).unwrap();
        let texts = texts(&out);
        assert!(texts[0].contains("Page 5 of 7"), "{:?}", texts[0]);
        assert!(texts[2].contains("Page 7 of 7"), "{:?}", texts[2]);
    }

    #[test]
    fn test_start_number_overflow_is_rejected() {
        let pdf = create_test_pdf(2, "N");
        let options = PageNumberOptions {
            style: StampStyle {
                start_number: u32::MAX,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = add_page_numbers(&pdf, &options).unwrap_err();
        assert!(matches!(err, PdfWorksError::InvalidInput(_)));

        let header = HeaderFooterOptions {
            header: Some("{page}".into()),
            style: StampStyle {
                start_number: u32::MAX - 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = add_header_footer(&create_test_pdf(1, "N"), &header).unwrap();
        assert!(texts(&out)[0].contains(&(u32::MAX - 1).to_string()));
    }

    #[test]
    fn test_header_and_footer_with_date() {
        let pdf = create_test_pdf(2, "HF");
        let options = HeaderFooterOptions {
            header: Some("Quarterly report".into()),
            footer: Some("Printed {date}".into()),
            footer_align: HorizontalAlign::Right,
            style: StampStyle {
                date: Some("2024-02-29".into()),
                pages: PageSelection::Odd,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = add_header_footer(&pdf, &options).unwrap();
        let texts = texts(&out);
        assert!(texts[0].contains("Quarterly report"));
        assert!(texts[0].contains("Printed 2024-02-29"));
        assert!(!texts[1].contains("Quarterly report"));
    }

    #[test]
    fn test_header_footer_requires_text() {
        let pdf = create_test_pdf(1, "HF");
        let err = add_header_footer(&pdf, &HeaderFooterOptions::default()).unwrap_err();
        assert!(matches!(err, PdfWorksError::MissingInput(_)));
    }
}
