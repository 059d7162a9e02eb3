//! Office-format conversion through an external headless converter

use crate::config::ConverterConfig;
use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Docx => "docx",
            TargetFormat::Xlsx => "xlsx",
            TargetFormat::Pptx => "pptx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TargetFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            TargetFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

impl FromStr for TargetFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "docx" | "word" => Ok(TargetFormat::Docx),
            "xlsx" | "excel" => Ok(TargetFormat::Xlsx),
            "pptx" | "powerpoint" => Ok(TargetFormat::Pptx),
            other => Err(ServiceError::InvalidInput(format!(
                "Unsupported target format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub bytes: Vec<u8>,
    /// Original file name; its extension tells the converter the input format
    pub file_name: String,
    pub target: TargetFormat,
}

#[derive(Debug, Clone)]
pub struct ConversionResponse {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, request: ConversionRequest) -> ServiceResult<ConversionResponse>;
}

/// Runs `<binary> --headless --convert-to <ext> --outdir <dir> <file>` in a
/// scratch directory that is removed after every call
pub struct OfficeConverter {
    config: ConverterConfig,
}

impl OfficeConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    async fn convert_in(&self, dir: &Path, request: &ConversionRequest) -> ServiceResult<ConversionResponse> {
        let input = dir.join(safe_file_name(&request.file_name));
        tokio::fs::write(&input, &request.bytes).await?;

        let extension = request.target.extension();
        let child = Command::new(&self.config.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(extension)
            .arg("--outdir")
            .arg(dir)
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ServiceError::ServiceUnavailable(format!(
                    "Cannot start converter {}: {}",
                    self.config.binary.display(),
                    e
                ))
            })?;

        // dropping the child on timeout kills it
        let limit = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(ServiceError::Timeout(self.config.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::ConversionFailed(format!(
                "Converter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let produced = output_path(dir, &input, extension);
        let bytes = match tokio::fs::read(&produced).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(ServiceError::ConversionFailed("Converter produced an empty file".into())),
            Err(_) => {
                return Err(ServiceError::ConversionFailed(format!(
                    "Converter produced no {} output",
                    extension
                )))
            }
        };

        Ok(ConversionResponse {
            bytes,
            mime_type: request.target.mime_type(),
        })
    }
}

#[async_trait]
impl DocumentConverter for OfficeConverter {
    async fn convert(&self, request: ConversionRequest) -> ServiceResult<ConversionResponse> {
        if request.bytes.is_empty() {
            return Err(ServiceError::InvalidInput("File is empty".into()));
        }

        let started = Instant::now();
        let dir = tempfile::Builder::new().prefix("pdfworks-convert-").tempdir()?;
        debug!("Converting {} in {}", request.file_name, dir.path().display());

        let result = self.convert_in(dir.path(), &request).await;

        let dir_path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!("Failed to remove {}: {}", dir_path.display(), e);
        }

        match &result {
            Ok(response) => info!(
                "Converted {} to {} in {} ms ({} -> {} bytes)",
                request.file_name,
                request.target.extension(),
                started.elapsed().as_millis(),
                request.bytes.len(),
                response.bytes.len()
            ),
            Err(e) => warn!("Conversion of {} failed: {}", request.file_name, e),
        }
        result
    }
}

/// Keep only the final path component so a caller cannot write outside the scratch directory
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("input")
        .to_string()
}

/// Same base name, new extension
fn output_path(dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    dir.join(format!("{}.{}", stem, extension))
}
