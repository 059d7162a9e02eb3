//! Tunable engine settings

use crate::compress::CompressionTuning;
use crate::raster::RasterLimits;
use serde::{Deserialize, Serialize};

/// Everything the engine lets a deployment adjust. Missing sections and
/// fields keep their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub compression: CompressionTuning,
    pub raster: RasterLimits,
}
