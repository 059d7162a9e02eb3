//! Application configuration
//!
//! Read from a TOML file, then overridden by `PDFWORKS_*` environment
//! variables (a `.env` file is loaded first by `main`).

use anyhow::{Context, Result};
use pdfworks_core::EngineConfig;
use pdfworks_services::{AiConfig, ConverterConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File read when no `--config` is given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "pdfworks.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub converter: ConverterConfig,
    pub ai: AiConfig,
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Directory holding the pdfium shared library; system paths when unset
    pub library_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Load `path`, or the default file when present, then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::read(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&text)
    }

    /// Override settings from `PDFWORKS_*` variables as returned by `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(binary) = lookup("PDFWORKS_CONVERTER_BIN") {
            self.converter.binary = PathBuf::from(binary);
        }
        if let Some(secs) = lookup("PDFWORKS_CONVERT_TIMEOUT_SECS") {
            self.converter.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("PDFWORKS_CONVERT_TIMEOUT_SECS is not a number: {}", secs))?;
        }
        if let Some(endpoint) = lookup("PDFWORKS_AI_ENDPOINT") {
            self.ai.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        if let Some(key) = lookup("PDFWORKS_AI_API_KEY") {
            self.ai.api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(dir) = lookup("PDFWORKS_PDFIUM_DIR") {
            self.renderer.library_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_parse_sections() {
        let config = AppConfig::from_str(
            r#"
            [engine.compression]
            image_heavy_bytes_per_page = 150000

            [engine.raster]
            max_dimension_px = 2048

            [converter]
            binary = "/opt/libreoffice/program/soffice"
            timeout_secs = 240

            [ai]
            endpoint = "https://ai.example.com/v1/advise"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.compression.image_heavy_bytes_per_page, 150_000);
        assert_eq!(config.engine.raster.max_dimension_px, 2048);
        assert_eq!(config.engine.raster.flatten_scale, 2.0);
        assert_eq!(config.converter.timeout_secs, 240);
        assert_eq!(config.ai.endpoint.as_deref(), Some("https://ai.example.com/v1/advise"));
        assert_eq!(config.ai.fallback_compression_quality, 70.0);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(AppConfig::from_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_str("[converter]\ntimeout_secs = 60\n").unwrap();
        let env: HashMap<&str, &str> = [
            ("PDFWORKS_CONVERT_TIMEOUT_SECS", "120"),
            ("PDFWORKS_AI_API_KEY", "secret"),
            ("PDFWORKS_AI_ENDPOINT", ""),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.converter.timeout_secs, 120);
        assert_eq!(config.ai.api_key.as_deref(), Some("secret"));
        assert_eq!(config.ai.endpoint, None);
    }

    #[test]
    fn test_bad_env_number_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_env(|k| (k == "PDFWORKS_CONVERT_TIMEOUT_SECS").then(|| "soon".to_string()))
            .is_err());
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[renderer]\nlibrary_dir = \"/usr/lib/pdfium\"\n").unwrap();
        let config = AppConfig::read(&path).unwrap();
        assert_eq!(config.renderer.library_dir, Some(PathBuf::from("/usr/lib/pdfium")));
    }
}
