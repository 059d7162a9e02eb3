//! Adaptive compression
//!
//! Two strategies are tried in order:
//!
//! 1. Structural re-serialization: copy the pages into a fresh document, drop
//!    unreferenced objects and deflate streams. Lossless and cheap, accepted
//!    only when it saves enough.
//! 2. Rasterization: re-render every page to a JPEG at a scale and quality
//!    chosen from the requested level and whether the document is
//!    image-heavy.
//!
//! Whatever happens, the returned bytes are never larger than the input.

use crate::document::{load_document, rebuild_document, save_document};
use crate::error::PdfWorksError;
use crate::metadata::{read_metadata, write_metadata};
use crate::progress::ProgressReporter;
use crate::raster::{rasterize_document, PageRenderer, RasterLimits, RasterPass};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
    Extreme,
    /// Quality recommended by a [`CompressionAdvisor`]
    Smart,
}

impl FromStr for CompressionLevel {
    type Err = PdfWorksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            "extreme" | "max" => Ok(CompressionLevel::Extreme),
            "smart" | "auto" => Ok(CompressionLevel::Smart),
            other => Err(PdfWorksError::InvalidInput(format!(
                "Unknown compression level: {}",
                other
            ))),
        }
    }
}

/// Thresholds and floors of the heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionTuning {
    /// Above this many bytes per page a document counts as image-heavy
    pub image_heavy_bytes_per_page: u64,
    /// Fraction of the input a structural pass must save to be accepted
    pub min_structural_saving: f64,
    pub min_render_scale: f64,
    pub min_image_quality: f64,
    /// Lowest advised quality accepted for image-heavy documents
    pub smart_image_heavy_floor: f64,
    /// Lowest advised quality accepted for any document
    pub smart_floor: f64,
    /// Quality percentage used when the advisor has no answer
    pub default_advice: f64,
}

impl Default for CompressionTuning {
    fn default() -> Self {
        Self {
            image_heavy_bytes_per_page: 200_000,
            min_structural_saving: 0.05,
            min_render_scale: 0.7,
            min_image_quality: 0.40,
            smart_image_heavy_floor: 0.5,
            smart_floor: 0.4,
            default_advice: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub size_bytes: usize,
    pub page_count: u32,
}

impl DocumentStats {
    pub fn bytes_per_page(&self) -> u64 {
        self.size_bytes as u64 / self.page_count.max(1) as u64
    }

    pub fn is_image_heavy(&self, tuning: &CompressionTuning) -> bool {
        self.bytes_per_page() > tuning.image_heavy_bytes_per_page
    }
}

/// Raster parameters for the lossy path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionPlan {
    /// Pixels per point
    pub render_scale: f64,
    /// JPEG quality, 0-1
    pub image_quality: f64,
}

/// Source of a recommended image quality for [`CompressionLevel::Smart`]
pub trait CompressionAdvisor {
    /// Recommended quality as a percentage (0-100) or a fraction (0-1);
    /// `None` when no recommendation is available
    fn recommend_quality(&self, stats: &DocumentStats) -> Option<f64>;
}

/// Advisor that always answers with the same value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvice(pub f64);

impl CompressionAdvisor for FixedAdvice {
    fn recommend_quality(&self, _stats: &DocumentStats) -> Option<f64> {
        Some(self.0)
    }
}

/// Advisor with no opinion; the tuning default applies
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvice;

impl CompressionAdvisor for NoAdvice {
    fn recommend_quality(&self, _stats: &DocumentStats) -> Option<f64> {
        None
    }
}

/// Bring a quality given as a percentage or a fraction into `[0, 1]`
pub fn normalize_quality(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    fraction.clamp(0.0, 1.0)
}

fn level_parameters(level: CompressionLevel, image_heavy: bool) -> (f64, f64) {
    match (level, image_heavy) {
        (CompressionLevel::Low, false) => (1.5, 0.85),
        (CompressionLevel::Low, true) => (1.3, 0.75),
        (CompressionLevel::Medium, false) => (1.2, 0.7),
        (CompressionLevel::Medium, true) => (1.0, 0.6),
        (CompressionLevel::High, false) => (1.0, 0.55),
        (CompressionLevel::High, true) => (0.85, 0.5),
        (CompressionLevel::Extreme, false) => (0.75, 0.35),
        (CompressionLevel::Extreme, true) => (0.6, 0.3),
        // only reached without advice; callers go through plan_compression
        (CompressionLevel::Smart, _) => (1.2, 0.7),
    }
}

fn scale_for_quality(quality: f64) -> f64 {
    if quality >= 0.8 {
        1.5
    } else if quality >= 0.65 {
        1.2
    } else if quality >= 0.5 {
        1.0
    } else {
        0.85
    }
}

/// Pick render scale and image quality.
///
/// `advice` is only consulted for [`CompressionLevel::Smart`]; the scale and
/// quality floors of `tuning` apply to every level.
pub fn plan_compression(
    level: CompressionLevel,
    image_heavy: bool,
    advice: Option<f64>,
    tuning: &CompressionTuning,
) -> CompressionPlan {
    let (scale, quality) = match level {
        CompressionLevel::Smart => {
            let mut quality = normalize_quality(advice.unwrap_or(tuning.default_advice));
            quality = quality.max(tuning.smart_floor);
            if image_heavy {
                quality = quality.max(tuning.smart_image_heavy_floor);
            }
            (scale_for_quality(quality), quality)
        }
        _ => level_parameters(level, image_heavy),
    };

    CompressionPlan {
        render_scale: scale.max(tuning.min_render_scale),
        image_quality: normalize_quality(quality).max(tuning.min_image_quality),
    }
}

/// Lossless pass: fresh copy of every page, unreferenced objects dropped,
/// streams deflated
pub fn structural_compress(source: &Document) -> Result<Vec<u8>, PdfWorksError> {
    let mut doc = rebuild_document(source)?;
    doc.prune_objects();
    doc.compress();
    save_document(&mut doc)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Structural,
    Rasterized,
    /// Nothing helped; the input is returned unchanged
    Original,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub method: CompressionMethod,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Raster parameters, when the lossy path ran
    pub plan: Option<CompressionPlan>,
}

impl CompressionOutcome {
    fn new(bytes: Vec<u8>, method: CompressionMethod, original_size: usize, plan: Option<CompressionPlan>) -> Self {
        Self {
            compressed_size: bytes.len(),
            bytes,
            method,
            original_size,
            plan,
        }
    }

    /// Fraction of the input saved, 0 when nothing was saved
    pub fn saved_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.compressed_size as f64 / self.original_size as f64
    }
}

/// Compress a document; see the module docs for the strategy.
///
/// Without a renderer only the structural pass is available and the smaller
/// of its output and the input is returned.
#[allow(clippy::too_many_arguments)]
pub fn compress_document(
    bytes: &[u8],
    level: CompressionLevel,
    advisor: &dyn CompressionAdvisor,
    renderer: Option<&dyn PageRenderer>,
    tuning: &CompressionTuning,
    limits: &RasterLimits,
    progress: &mut ProgressReporter<'_>,
) -> Result<CompressionOutcome, PdfWorksError> {
    let source = load_document(bytes, None)?;
    let original_size = bytes.len();
    let stats = DocumentStats {
        size_bytes: original_size,
        page_count: source.get_pages().len() as u32,
    };
    let image_heavy = stats.is_image_heavy(tuning);
    debug!(
        "Compressing {} bytes over {} pages ({} bytes/page, image-heavy: {})",
        stats.size_bytes,
        stats.page_count,
        stats.bytes_per_page(),
        image_heavy
    );
    progress.processing(10, "Analyzing document");

    let mut structural: Option<Vec<u8>> = None;
    if !image_heavy && level != CompressionLevel::Extreme {
        progress.processing(20, "Optimizing document structure");
        let candidate = structural_compress(&source)?;
        let saved = 1.0 - candidate.len() as f64 / original_size as f64;
        if saved >= tuning.min_structural_saving {
            info!(
                "Structural compression saved {:.1}% ({} -> {} bytes)",
                saved * 100.0,
                original_size,
                candidate.len()
            );
            return Ok(CompressionOutcome::new(
                candidate,
                CompressionMethod::Structural,
                original_size,
                None,
            ));
        }
        debug!("Structural pass saved only {:.1}%, rasterizing", saved * 100.0);
        structural = Some(candidate);
    }

    let Some(renderer) = renderer else {
        warn!("No page renderer available; skipping rasterization");
        return Ok(match structural {
            Some(candidate) if candidate.len() < original_size => CompressionOutcome::new(
                candidate,
                CompressionMethod::Structural,
                original_size,
                None,
            ),
            _ => CompressionOutcome::new(bytes.to_vec(), CompressionMethod::Original, original_size, None),
        });
    };

    let advice = match level {
        CompressionLevel::Smart => advisor.recommend_quality(&stats),
        _ => None,
    };
    let plan = plan_compression(level, image_heavy, advice, tuning);
    info!(
        "Rasterizing at scale {:.2}, quality {:.2} (level {:?})",
        plan.render_scale, plan.image_quality, level
    );
    progress.processing(35, "Rendering pages");

    let pass = RasterPass {
        password: None,
        scale: plan.render_scale,
        quality: plan.image_quality,
        band: (35, 90),
    };
    let mut doc = rasterize_document(&source, bytes, renderer, &pass, limits, progress)?;
    write_metadata(&mut doc, &read_metadata(&source));
    let rasterized = save_document(&mut doc)?;
    if rasterized.len() >= original_size {
        warn!(
            "Rasterized output ({} bytes) is not smaller than the input ({} bytes); keeping the original",
            rasterized.len(),
            original_size
        );
        return Ok(CompressionOutcome::new(
            bytes.to_vec(),
            CompressionMethod::Original,
            original_size,
            Some(plan),
        ));
    }

    info!(
        "Rasterized compression: {} -> {} bytes",
        original_size,
        rasterized.len()
    );
    Ok(CompressionOutcome::new(
        rasterized,
        CompressionMethod::Rasterized,
        original_size,
        Some(plan),
    ))
}
