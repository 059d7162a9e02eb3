//! Cropping by margins

use crate::coords::PdfRect;
use crate::document::{load_document, media_box, page_id, real, save_document};
use crate::error::PdfWorksError;
use crate::pages::PageSelection;
use lopdf::Object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginUnit {
    #[default]
    Pt,
    In,
    Cm,
    Mm,
}

impl MarginUnit {
    /// Points per unit
    pub fn to_points(&self) -> f64 {
        match self {
            MarginUnit::Pt => 1.0,
            MarginUnit::In => 72.0,
            MarginUnit::Cm => 28.35,
            MarginUnit::Mm => 2.835,
        }
    }
}

impl std::str::FromStr for MarginUnit {
    type Err = PdfWorksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" | "points" => Ok(MarginUnit::Pt),
            "in" | "inch" | "inches" => Ok(MarginUnit::In),
            "cm" => Ok(MarginUnit::Cm),
            "mm" => Ok(MarginUnit::Mm),
            other => Err(PdfWorksError::InvalidInput(format!(
                "Unknown margin unit: {}",
                other
            ))),
        }
    }
}

/// Margins to trim from each edge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
    #[serde(default)]
    pub unit: MarginUnit,
}

impl CropMargins {
    pub fn uniform(value: f64, unit: MarginUnit) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
            unit,
        }
    }

    /// `(top, right, bottom, left)` in points
    pub fn in_points(&self) -> (f64, f64, f64, f64) {
        let k = self.unit.to_points();
        (self.top * k, self.right * k, self.bottom * k, self.left * k)
    }
}

/// Crop box left after removing `margins` from `media`
pub fn compute_crop_box(media: PdfRect, margins: &CropMargins) -> Result<PdfRect, PdfWorksError> {
    let (top, right, bottom, left) = margins.in_points();
    if [top, right, bottom, left].iter().any(|m| *m < 0.0 || !m.is_finite()) {
        return Err(PdfWorksError::InvalidInput(
            "Margins must be non-negative".into(),
        ));
    }

    let crop = PdfRect::new(
        media.x + left,
        media.y + bottom,
        media.width - left - right,
        media.height - top - bottom,
    );
    if crop.width <= 0.0 || crop.height <= 0.0 {
        return Err(PdfWorksError::InvalidInput(format!(
            "Margins leave no visible area on a {:.1} x {:.1} pt page",
            media.width, media.height
        )));
    }
    if !media.contains(&crop) {
        return Err(PdfWorksError::InvalidInput(
            "Crop box falls outside the page".into(),
        ));
    }
    Ok(crop)
}

/// Set the crop box of the selected pages. Every page is validated before
/// any page is changed.
pub fn crop_pages(bytes: &[u8], selection: &PageSelection, margins: &CropMargins) -> Result<Vec<u8>, PdfWorksError> {
    let mut doc = load_document(bytes, None)?;
    let pages = selection.resolve(doc.get_pages().len() as u32)?;

    let mut planned = Vec::with_capacity(pages.len());
    for number in pages {
        let id = page_id(&doc, number)?;
        let crop = compute_crop_box(media_box(&doc, id), margins).map_err(|e| match e {
            PdfWorksError::InvalidInput(msg) => {
                PdfWorksError::InvalidInput(format!("Page {}: {}", number, msg))
            }
            other => other,
        })?;
        planned.push((id, crop));
    }

    for (id, crop) in planned {
        let b = crop.to_box();
        let page = doc.get_dictionary_mut(id)?;
        page.set(
            "CropBox",
            Object::Array(b.iter().map(|v| real(*v)).collect()),
        );
    }

    save_document(&mut doc)
}
