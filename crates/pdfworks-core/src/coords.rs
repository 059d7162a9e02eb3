//! Coordinate transformation between UI placement space and PDF page space
//!
//! UI placements use a top-left origin with y growing downward, expressed as
//! fractions of the page (0-1). PDF page space uses a bottom-left origin in
//! points with y growing upward. Stored coordinates are always the overlay's
//! bottom-left corner, while a normalized `ny` describes the overlay's top edge.

use serde::{Deserialize, Serialize};

/// Default horizontal placement when no position is supplied
pub const DEFAULT_NX: f64 = 0.7;
/// Default vertical placement when no position is supplied
pub const DEFAULT_NY: f64 = 0.85;

/// Page dimensions in points, at native scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Overlay dimensions in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySize {
    pub width: f64,
    pub height: f64,
}

impl OverlaySize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Point in page space (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

/// Rectangle in page space: `(x, y)` is the bottom-left corner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Whether `other` lies fully inside this rectangle
    pub fn contains(&self, other: &PdfRect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.top() <= self.top() + EPS
    }

    /// `[llx lly urx ury]` as used by PDF box arrays
    pub fn to_box(&self) -> [f64; 4] {
        [self.x, self.y, self.right(), self.top()]
    }

    /// Build from a PDF box array, normalizing swapped corners
    pub fn from_box(b: [f64; 4]) -> Self {
        let (x0, x1) = if b[0] <= b[2] { (b[0], b[2]) } else { (b[2], b[0]) };
        let (y0, y1) = if b[1] <= b[3] { (b[1], b[3]) } else { (b[3], b[1]) };
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Placement relative to the page, top-left origin.
///
/// `nw`/`nh` optionally size the overlay as a fraction of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPosition {
    pub nx: f64,
    pub ny: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nh: Option<f64>,
}

impl Default for NormalizedPosition {
    fn default() -> Self {
        Self::new(DEFAULT_NX, DEFAULT_NY)
    }
}

impl NormalizedPosition {
    pub fn new(nx: f64, ny: f64) -> Self {
        Self {
            nx,
            ny,
            nw: None,
            nh: None,
        }
    }

    pub fn with_size(mut self, nw: f64, nh: f64) -> Self {
        self.nw = Some(nw);
        self.nh = Some(nh);
        self
    }

    /// Copy with every component forced into `[0, 1]` (NaN becomes 0)
    pub fn clamped(&self) -> Self {
        Self {
            nx: unit(self.nx),
            ny: unit(self.ny),
            nw: self.nw.map(unit),
            nh: self.nh.map(unit),
        }
    }
}

fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Map a normalized top-left placement to the overlay's bottom-left corner in page space.
///
/// `x = W * nx` clamped to `[0, W - w]`, `y = H * (1 - ny) - h` clamped to
/// `[0, H - h]`. An overlay larger than the page is pinned to 0 on that axis.
pub fn map_to_page(page: PageSize, overlay: OverlaySize, pos: NormalizedPosition) -> PagePoint {
    let pos = pos.clamped();

    let max_x = (page.width - overlay.width).max(0.0);
    let max_y = (page.height - overlay.height).max(0.0);

    let x = (page.width * pos.nx).clamp(0.0, max_x);
    let y = (page.height * (1.0 - pos.ny) - overlay.height).clamp(0.0, max_y);

    PagePoint { x, y }
}

/// Inverse of [`map_to_page`]: recover the normalized top-left placement
pub fn page_to_normalized(page: PageSize, overlay: OverlaySize, point: PagePoint) -> NormalizedPosition {
    let nx = if page.width > 0.0 {
        point.x / page.width
    } else {
        0.0
    };
    let ny = if page.height > 0.0 {
        1.0 - (point.y + overlay.height) / page.height
    } else {
        0.0
    };
    NormalizedPosition::new(nx, ny)
}

/// Resolve the overlay size: relative `nw`/`nh` win, otherwise `fallback`
pub fn resolve_overlay_size(page: PageSize, pos: &NormalizedPosition, fallback: OverlaySize) -> OverlaySize {
    let width = pos
        .nw
        .filter(|w| *w > 0.0)
        .map(|w| unit(w) * page.width)
        .unwrap_or(fallback.width);
    let height = pos
        .nh
        .filter(|h| *h > 0.0)
        .map(|h| unit(h) * page.height)
        .unwrap_or(fallback.height);
    OverlaySize::new(width, height)
}

/// Convert a point on a scaled preview surface (pixels, top-left origin) to a
/// normalized position, so preview scale never leaks into page math
pub fn preview_to_normalized(
    px: f64,
    py: f64,
    preview_width: f64,
    preview_height: f64,
) -> NormalizedPosition {
    let nx = if preview_width > 0.0 { px / preview_width } else { 0.0 };
    let ny = if preview_height > 0.0 { py / preview_height } else { 0.0 };
    NormalizedPosition::new(nx, ny).clamped()
}

/// Convert a normalized position back to preview pixels
pub fn normalized_to_preview(
    pos: NormalizedPosition,
    preview_width: f64,
    preview_height: f64,
) -> (f64, f64) {
    (pos.nx * preview_width, pos.ny * preview_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize::LETTER;

    #[test]
    fn test_watermark_placement_scenario() {
        let p = map_to_page(
            LETTER,
            OverlaySize::new(150.0, 50.0),
            NormalizedPosition::new(0.7, 0.85),
        );
        assert!((p.x - 428.4).abs() < 1e-9);
        assert!((p.y - 68.8).abs() < 1e-9);
    }

    #[test]
    fn test_default_position_is_bottom_right() {
        let pos = NormalizedPosition::default();
        assert_eq!(pos.nx, DEFAULT_NX);
        assert_eq!(pos.ny, DEFAULT_NY);
    }

    #[test]
    fn test_top_left_corner() {
        let p = map_to_page(
            LETTER,
            OverlaySize::new(100.0, 40.0),
            NormalizedPosition::new(0.0, 0.0),
        );
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 792.0 - 40.0);
    }

    #[test]
    fn test_clamps_to_keep_overlay_on_page() {
        let p = map_to_page(
            LETTER,
            OverlaySize::new(200.0, 100.0),
            NormalizedPosition::new(0.95, 0.99),
        );
        assert_eq!(p.x, 612.0 - 200.0);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_oversized_overlay_pins_to_zero() {
        let p = map_to_page(
            PageSize::new(100.0, 100.0),
            OverlaySize::new(300.0, 400.0),
            NormalizedPosition::new(0.5, 0.5),
        );
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let p = map_to_page(
            LETTER,
            OverlaySize::new(10.0, 10.0),
            NormalizedPosition::new(-3.0, f64::NAN),
        );
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 792.0 - 10.0);
    }

    #[test]
    fn test_resolve_overlay_size_prefers_relative() {
        let pos = NormalizedPosition::new(0.1, 0.1).with_size(0.5, 0.25);
        let size = resolve_overlay_size(LETTER, &pos, OverlaySize::new(150.0, 50.0));
        assert_eq!(size, OverlaySize::new(306.0, 198.0));

        let fallback = resolve_overlay_size(
            LETTER,
            &NormalizedPosition::default(),
            OverlaySize::new(150.0, 50.0),
        );
        assert_eq!(fallback, OverlaySize::new(150.0, 50.0));
    }

    #[test]
    fn test_preview_to_normalized() {
        let pos = preview_to_normalized(459.0, 594.0, 918.0, 1188.0);
        assert!((pos.nx - 0.5).abs() < 1e-12);
        assert!((pos.ny - 0.5).abs() < 1e-12);
        let (x, y) = normalized_to_preview(pos, 918.0, 1188.0);
        assert!((x - 459.0).abs() < 1e-9);
        assert!((y - 594.0).abs() < 1e-9);
    }

    #[test]
    fn test_rect_box_roundtrip() {
        let r = PdfRect::from_box([612.0, 792.0, 0.0, 0.0]);
        assert_eq!(r, PdfRect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(r.to_box(), [0.0, 0.0, 612.0, 792.0]);
    }

}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimension() -> impl Strategy<Value = f64> {
        1.0f64..2000.0
    }

    fn fraction() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    proptest! {
        /// Property: page -> normalized reproduces ny whenever the overlay fits
        /// and the placement did not need clamping
        #[test]
        fn roundtrip_normalized_to_page(
            page_w in dimension(),
            page_h in dimension(),
            w_frac in fraction(),
            h_frac in fraction(),
            a in fraction(),
            b in fraction(),
        ) {
            let page = PageSize::new(page_w, page_h);
            let overlay = OverlaySize::new(page_w * w_frac, page_h * h_frac);
            // Only positions that keep the overlay on the page survive unclamped
            let nx = a * (1.0 - w_frac);
            let ny = b * (1.0 - h_frac);

            let p = map_to_page(page, overlay, NormalizedPosition::new(nx, ny));
            let back = page_to_normalized(page, overlay, p);

            prop_assert!((back.ny - ny).abs() < 1e-9, "ny {} -> {}", ny, back.ny);
            prop_assert!((back.nx - nx).abs() < 1e-9, "nx {} -> {}", nx, back.nx);
        }

        /// Property: the overlay is never placed partially off-page
        #[test]
        fn overlay_stays_on_page(
            page_w in dimension(),
            page_h in dimension(),
            w in 0.0f64..3000.0,
            h in 0.0f64..3000.0,
            nx in -1.0f64..2.0,
            ny in -1.0f64..2.0,
        ) {
            let p = map_to_page(
                PageSize::new(page_w, page_h),
                OverlaySize::new(w, h),
                NormalizedPosition::new(nx, ny),
            );
            prop_assert!(p.x >= 0.0 && p.y >= 0.0);
            if w <= page_w {
                prop_assert!(p.x + w <= page_w + 1e-9);
            } else {
                prop_assert_eq!(p.x, 0.0);
            }
            if h <= page_h {
                prop_assert!(p.y + h <= page_h + 1e-9);
            } else {
                prop_assert_eq!(p.y, 0.0);
            }
        }
    }
}
