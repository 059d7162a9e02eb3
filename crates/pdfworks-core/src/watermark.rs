//! Text and image watermarks

use crate::content::{Color, PageOverlay};
use crate::coords::{map_to_page, resolve_overlay_size, NormalizedPosition, OverlaySize, PageSize, PdfRect};
use crate::document::{load_document, page_ids, save_document};
use crate::error::PdfWorksError;
use crate::pages::PageSelection;
use crate::raster::{embed_image, embed_pdf_page, EmbeddedImage};
use crate::text::{text_width, StandardFont};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stock watermark texts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPreset {
    #[default]
    Confidential,
    Draft,
    Sample,
    Copy,
    Approved,
    DoNotCopy,
}

impl WatermarkPreset {
    pub fn text(&self) -> &'static str {
        match self {
            WatermarkPreset::Confidential => "CONFIDENTIAL",
            WatermarkPreset::Draft => "DRAFT",
            WatermarkPreset::Sample => "SAMPLE",
            WatermarkPreset::Copy => "COPY",
            WatermarkPreset::Approved => "APPROVED",
            WatermarkPreset::DoNotCopy => "DO NOT COPY",
        }
    }
}

impl std::str::FromStr for WatermarkPreset {
    type Err = PdfWorksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "confidential" => Ok(WatermarkPreset::Confidential),
            "draft" => Ok(WatermarkPreset::Draft),
            "sample" => Ok(WatermarkPreset::Sample),
            "copy" => Ok(WatermarkPreset::Copy),
            "approved" => Ok(WatermarkPreset::Approved),
            "do_not_copy" => Ok(WatermarkPreset::DoNotCopy),
            other => Err(PdfWorksError::InvalidInput(format!(
                "Unknown watermark preset: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkStyle {
    pub font: StandardFont,
    pub font_size: f64,
    pub color: String,
    /// 0 (invisible) to 1 (opaque)
    pub opacity: f64,
    /// Counter-clockwise, in degrees
    pub rotation: f64,
    /// Centered on the page when absent
    pub position: Option<NormalizedPosition>,
    /// Image width as a fraction of the page width
    pub image_scale: f64,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font: StandardFont::HelveticaBold,
            font_size: 48.0,
            color: "#808080".to_string(),
            opacity: 0.3,
            rotation: 45.0,
            position: None,
            image_scale: 0.5,
        }
    }
}

/// Watermark options as supplied by a caller; any content field may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkRequest {
    pub text: Option<String>,
    /// PNG, JPEG or PDF bytes; a PDF contributes its first page
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    pub preset: Option<WatermarkPreset>,
    pub style: WatermarkStyle,
    pub pages: PageSelection,
}

/// What actually gets drawn, resolved once from a [`WatermarkRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkContent {
    Text(String),
    Image(Vec<u8>),
    PdfPage(Vec<u8>),
}

impl WatermarkRequest {
    /// Custom text wins, then an image (only without text), then a preset
    pub fn resolve_content(&self) -> Result<WatermarkContent, PdfWorksError> {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(WatermarkContent::Text(text.to_string()));
        }
        if let Some(image) = self.image.as_ref().filter(|i| !i.is_empty()) {
            let head = &image[..image.len().min(1024)];
            if head.windows(5).any(|w| w == b"%PDF-") {
                return Ok(WatermarkContent::PdfPage(image.clone()));
            }
            return Ok(WatermarkContent::Image(image.clone()));
        }
        if let Some(preset) = self.preset {
            return Ok(WatermarkContent::Text(preset.text().to_string()));
        }
        Err(PdfWorksError::MissingInput(
            "Watermark needs text, an image or a preset".into(),
        ))
    }
}

/// Rectangle the watermark occupies before rotation
pub fn watermark_rect(page: PageSize, overlay: OverlaySize, position: Option<&NormalizedPosition>) -> PdfRect {
    match position {
        Some(pos) => {
            let p = map_to_page(page, overlay, *pos);
            PdfRect::new(p.x, p.y, overlay.width, overlay.height)
        }
        // an overlay larger than the page is pinned to 0, as in map_to_page
        None => PdfRect::new(
            ((page.width - overlay.width) / 2.0).max(0.0),
            ((page.height - overlay.height) / 2.0).max(0.0),
            overlay.width,
            overlay.height,
        ),
    }
}

fn image_overlay_size(page: PageSize, image: &EmbeddedImage, style: &WatermarkStyle) -> OverlaySize {
    let width = page.width * style.image_scale.clamp(0.01, 1.0);
    let fallback = OverlaySize::new(width, width * image.aspect_ratio());
    match &style.position {
        Some(pos) => resolve_overlay_size(page, pos, fallback),
        None => fallback,
    }
}

/// Stamp a watermark on every selected page
pub fn add_watermark(bytes: &[u8], request: &WatermarkRequest) -> Result<Vec<u8>, PdfWorksError> {
    let content = request.resolve_content()?;
    let style = &request.style;
    if style.font_size <= 0.0 {
        return Err(PdfWorksError::InvalidInput("Font size must be positive".into()));
    }

    let mut doc = load_document(bytes, None)?;
    let ids = page_ids(&doc);
    let selected = request.pages.resolve(ids.len() as u32)?;

    let image = match &content {
        WatermarkContent::Text(_) => None,
        WatermarkContent::Image(data) => Some(embed_image(&mut doc, data)?),
        WatermarkContent::PdfPage(data) => Some(embed_pdf_page(&mut doc, data)?),
    };
    let color = Color::from_hex(&style.color);

    for number in &selected {
        let id = ids[*number as usize - 1];
        let mut overlay = PageOverlay::for_page(&doc, id);
        let page = overlay.size();

        match (&content, image) {
            (WatermarkContent::Text(text), _) => {
                let size = OverlaySize::new(text_width(text, style.font, style.font_size), style.font_size);
                let rect = watermark_rect(page, size, style.position.as_ref());
                overlay.rotated_text(
                    text,
                    rect.x + rect.width / 2.0,
                    rect.y + rect.height / 2.0,
                    style.font,
                    style.font_size,
                    color,
                    style.opacity,
                    style.rotation,
                );
            }
            (_, Some(image)) => {
                let size = image_overlay_size(page, &image, style);
                let rect = watermark_rect(page, size, style.position.as_ref());
                overlay.image(image.id, rect, style.opacity, style.rotation);
            }
            (_, None) => {}
        }

        overlay.apply(&mut doc, id)?;
    }

    if matches!(content, WatermarkContent::PdfPage(_)) {
        doc.prune_objects();
    }

    debug!("Watermarked {} pages", selected.len());
    save_document(&mut doc)
}
