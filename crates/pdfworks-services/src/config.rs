//! Settings for the external collaborators

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Office-format converter invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Converter executable, looked up on `PATH` when not absolute
    pub binary: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("soffice"),
            timeout_secs: 180,
        }
    }
}

/// AI/OCR advisory endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Requests fail with `ServiceUnavailable` while unset
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Quality percentage returned when no recommendation can be obtained
    pub fallback_compression_quality: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout_secs: 60,
            fallback_compression_quality: 70.0,
        }
    }
}
