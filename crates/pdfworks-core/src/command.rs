use crate::annotate::{annotate_document, Annotation};
use crate::compare::{compare_documents, ComparisonReport};
use crate::compress::{compress_document, CompressionAdvisor, CompressionLevel, CompressionOutcome, NoAdvice};
use crate::config::EngineConfig;
use crate::coords::NormalizedPosition;
use crate::crop::{crop_pages, CropMargins};
use crate::error::PdfWorksError;
use crate::flatten::flatten_document;
use crate::merge::merge_documents;
use crate::metadata::{update_metadata, DocumentMetadata};
use crate::pages::PageSelection;
use crate::progress::{ProgressReporter, ProgressSink};
use crate::protect::{protect_document, unlock_document};
use crate::raster::PageRenderer;
use crate::rotate::rotate_pages;
use crate::security::EncryptionSettings;
use crate::sign::{sign_document, SignatureContent, SignatureRequest};
use crate::split::{delete_pages, extract_pages, reorder_pages, split_document};
use crate::stamp::{add_header_footer, add_page_numbers, HeaderFooterOptions, PageNumberOptions};
use crate::watermark::{add_watermark, WatermarkRequest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Binary payloads travel as base64 strings
mod base64_bytes {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }

    pub mod list {
        use super::BASE64;
        use base64::Engine;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
            Vec::<String>::deserialize(d)?
                .iter()
                .map(|s| BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
                .collect()
        }
    }

    pub mod option {
        use super::BASE64;
        use base64::Engine;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Merge {
        #[serde(deserialize_with = "base64_bytes::list::deserialize")]
        files: Vec<Vec<u8>>,
    },
    Split {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        ranges: Vec<(u32, u32)>,
    },
    Extract {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        pages: Vec<u32>,
    },
    Reorder {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        order: Vec<u32>,
    },
    Delete {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        pages: Vec<u32>,
    },
    Rotate {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        #[serde(default)]
        pages: PageSelection,
        angle: i64,
    },
    Crop {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        #[serde(default)]
        pages: PageSelection,
        margins: CropMargins,
    },
    Watermark {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        /// PNG, JPEG or PDF used when no text is given
        #[serde(default, deserialize_with = "base64_bytes::option::deserialize")]
        image: Option<Vec<u8>>,
        #[serde(default)]
        options: WatermarkRequest,
    },
    PageNumbers {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        #[serde(default)]
        options: PageNumberOptions,
    },
    HeaderFooter {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        options: HeaderFooterOptions,
    },
    Flatten {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
    },
    Annotate {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        annotations: Vec<Annotation>,
    },
    Sign {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        page: u32,
        #[serde(default)]
        position: NormalizedPosition,
        #[serde(default)]
        width: Option<f64>,
        /// Signature image; typed `text` is used when absent
        #[serde(default, deserialize_with = "base64_bytes::option::deserialize")]
        image: Option<Vec<u8>>,
        #[serde(default)]
        text: Option<String>,
    },
    Compress {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        #[serde(default)]
        level: CompressionLevel,
    },
    Unlock {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        password: String,
    },
    Protect {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        settings: EncryptionSettings,
    },
    Compare {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        left: Vec<u8>,
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        right: Vec<u8>,
    },
    Metadata {
        #[serde(deserialize_with = "base64_bytes::deserialize")]
        file: Vec<u8>,
        #[serde(default)]
        password: Option<String>,
        metadata: DocumentMetadata,
    },
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Split { .. } => "split",
            PdfCommand::Extract { .. } => "extract",
            PdfCommand::Reorder { .. } => "reorder",
            PdfCommand::Delete { .. } => "delete",
            PdfCommand::Rotate { .. } => "rotate",
            PdfCommand::Crop { .. } => "crop",
            PdfCommand::Watermark { .. } => "watermark",
            PdfCommand::PageNumbers { .. } => "page-numbers",
            PdfCommand::HeaderFooter { .. } => "header-footer",
            PdfCommand::Flatten { .. } => "flatten",
            PdfCommand::Annotate { .. } => "annotate",
            PdfCommand::Sign { .. } => "sign",
            PdfCommand::Compress { .. } => "compress",
            PdfCommand::Unlock { .. } => "unlock",
            PdfCommand::Protect { .. } => "protect",
            PdfCommand::Compare { .. } => "compare",
            PdfCommand::Metadata { .. } => "metadata",
        }
    }

    /// Total size of the input documents
    pub fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::Compare { left, right } => left.len() + right.len(),
            PdfCommand::Split { file, .. }
            | PdfCommand::Extract { file, .. }
            | PdfCommand::Reorder { file, .. }
            | PdfCommand::Delete { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Crop { file, .. }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::PageNumbers { file, .. }
            | PdfCommand::HeaderFooter { file, .. }
            | PdfCommand::Flatten { file }
            | PdfCommand::Annotate { file, .. }
            | PdfCommand::Sign { file, .. }
            | PdfCommand::Compress { file, .. }
            | PdfCommand::Unlock { file, .. }
            | PdfCommand::Protect { file, .. }
            | PdfCommand::Metadata { file, .. } => file.len(),
        }
    }
}

/// Collaborators and settings shared by every command
pub struct EngineContext<'a> {
    pub config: EngineConfig,
    pub renderer: Option<&'a dyn PageRenderer>,
    pub advisor: &'a dyn CompressionAdvisor,
}

impl Default for EngineContext<'_> {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            renderer: None,
            advisor: &NoAdvice,
        }
    }
}

impl<'a> EngineContext<'a> {
    fn require_renderer(&self) -> Result<&'a dyn PageRenderer, PdfWorksError> {
        self.renderer
            .ok_or_else(|| PdfWorksError::RenderError("No page renderer is available".into()))
    }
}

/// What a command produced
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Document(Vec<u8>),
    Documents(Vec<Vec<u8>>),
    Compressed(CompressionOutcome),
    Compared {
        document: Vec<u8>,
        report: ComparisonReport,
    },
}

impl CommandOutput {
    /// The primary output document, if there is exactly one
    pub fn document(&self) -> Option<&[u8]> {
        match self {
            CommandOutput::Document(bytes) => Some(bytes),
            CommandOutput::Compressed(outcome) => Some(&outcome.bytes),
            CommandOutput::Compared { document, .. } => Some(document),
            CommandOutput::Documents(_) => None,
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            CommandOutput::Documents(docs) => docs.iter().map(Vec::len).sum(),
            other => other.document().map_or(0, <[u8]>::len),
        }
    }
}

/// Run one command, reporting progress and a terminal event to `progress`
pub fn execute_command(
    command: &PdfCommand,
    ctx: &EngineContext<'_>,
    progress: &mut ProgressReporter<'_>,
) -> Result<CommandOutput, PdfWorksError> {
    let limits = &ctx.config.raster;
    progress.run(|progress| {
        progress.processing(5, &format!("Starting {}", command.name()));
        let output = match command {
            PdfCommand::Merge { files } => CommandOutput::Document(merge_documents(files.clone())?),
            PdfCommand::Split { file, ranges } => CommandOutput::Documents(split_document(file, ranges)?),
            PdfCommand::Extract { file, pages } => CommandOutput::Document(extract_pages(file, pages)?),
            PdfCommand::Reorder { file, order } => CommandOutput::Document(reorder_pages(file, order)?),
            PdfCommand::Delete { file, pages } => CommandOutput::Document(delete_pages(file, pages)?),
            PdfCommand::Rotate { file, pages, angle } => {
                CommandOutput::Document(rotate_pages(file, pages, *angle)?)
            }
            PdfCommand::Crop { file, pages, margins } => {
                CommandOutput::Document(crop_pages(file, pages, margins)?)
            }
            PdfCommand::Watermark { file, image, options } => {
                let request = WatermarkRequest {
                    image: image.clone(),
                    ..options.clone()
                };
                CommandOutput::Document(add_watermark(file, &request)?)
            }
            PdfCommand::PageNumbers { file, options } => {
                CommandOutput::Document(add_page_numbers(file, options)?)
            }
            PdfCommand::HeaderFooter { file, options } => {
                CommandOutput::Document(add_header_footer(file, options)?)
            }
            PdfCommand::Flatten { file } => {
                CommandOutput::Document(flatten_document(file, ctx.require_renderer()?, limits, progress)?)
            }
            PdfCommand::Annotate { file, annotations } => {
                CommandOutput::Document(annotate_document(file, annotations)?)
            }
            PdfCommand::Sign {
                file,
                page,
                position,
                width,
                image,
                text,
            } => {
                let content = match (image, text) {
                    (Some(image), _) => SignatureContent::Image(image.clone()),
                    (None, Some(text)) => SignatureContent::typed(text.clone()),
                    (None, None) => {
                        return Err(PdfWorksError::MissingInput(
                            "A signature image or text is required".into(),
                        ))
                    }
                };
                let request = SignatureRequest {
                    position: *position,
                    width: *width,
                    ..SignatureRequest::new(content, *page)
                };
                CommandOutput::Document(sign_document(file, &request)?)
            }
            PdfCommand::Compress { file, level } => CommandOutput::Compressed(compress_document(
                file,
                *level,
                ctx.advisor,
                ctx.renderer,
                &ctx.config.compression,
                limits,
                progress,
            )?),
            PdfCommand::Unlock { file, password } => {
                CommandOutput::Document(unlock_document(file, password, ctx.renderer, limits, progress)?)
            }
            PdfCommand::Protect { file, settings } => {
                CommandOutput::Document(protect_document(file, settings)?)
            }
            PdfCommand::Compare { left, right } => {
                let output = compare_documents(left, right, ctx.renderer, limits, progress)?;
                CommandOutput::Compared {
                    document: output.document,
                    report: output.report,
                }
            }
            PdfCommand::Metadata {
                file,
                password,
                metadata,
            } => CommandOutput::Document(update_metadata(file, password.as_deref(), metadata)?),
        };
        progress.completed(&format!("Finished {}", command.name()));
        Ok(output)
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    /// Base64-encoded PDFs, for commands producing several documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Command-specific report (compression outcome, comparison)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    fn failure(error: &PdfWorksError) -> Self {
        Self {
            success: false,
            data: None,
            files: None,
            details: None,
            error: Some(error.to_string()),
            metrics: None,
        }
    }
}

fn details(output: &CommandOutput) -> Result<Option<serde_json::Value>, PdfWorksError> {
    let value = match output {
        CommandOutput::Compressed(outcome) => serde_json::json!({
            "method": outcome.method,
            "original_size": outcome.original_size,
            "compressed_size": outcome.compressed_size,
            "saved_ratio": outcome.saved_ratio(),
            "plan": outcome.plan,
        }),
        CommandOutput::Compared { report, .. } => serde_json::to_value(report)
            .map_err(|e| PdfWorksError::SerializationError(e.to_string()))?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Execute a command and package the outcome for a caller that only speaks JSON
pub fn process_command(
    command: &PdfCommand,
    ctx: &EngineContext<'_>,
    sink: &mut dyn ProgressSink,
) -> ProcessResult {
    let started = Instant::now();
    let mut progress = ProgressReporter::new(sink);
    let output = match execute_command(command, ctx, &mut progress) {
        Ok(output) => output,
        Err(e) => {
            warn!("{} failed: {}", command.name(), e);
            return ProcessResult::failure(&e);
        }
    };

    let details = match details(&output) {
        Ok(details) => details,
        Err(e) => return ProcessResult::failure(&e),
    };
    let page_count = match &output {
        CommandOutput::Documents(docs) => docs
            .iter()
            .map(|d| crate::get_page_count(d).unwrap_or(0))
            .sum(),
        other => other
            .document()
            .and_then(|d| crate::get_page_count(d).ok())
            .unwrap_or(0),
    };
    let metrics = ProcessMetrics {
        input_size_bytes: command.input_size(),
        output_size_bytes: output.output_size(),
        page_count,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "{} finished in {} ms ({} -> {} bytes)",
        command.name(),
        metrics.processing_time_ms,
        metrics.input_size_bytes,
        metrics.output_size_bytes
    );

    let (data, files) = match &output {
        CommandOutput::Documents(docs) => (None, Some(docs.iter().map(|d| BASE64.encode(d)).collect())),
        other => (other.document().map(|d| BASE64.encode(d)), None),
    };
    ProcessResult {
        success: true,
        data,
        files,
        details,
        error: None,
        metrics: Some(metrics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ConversionProgress, NoProgress, ProgressStatus};
    use crate::test_support::create_test_pdf;

    fn encoded(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    #[test]
    fn test_command_deserializes_merge() {
        let json = r#"{"type":"Merge","files":[]}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, PdfCommand::Merge { .. }));
    }

    #[test]
    fn test_command_deserializes_split() {
        let json = format!(
            r#"{{"type":"Split","file":"{}","ranges":[[1,3],[5,5]]}}"#,
            encoded(b"%PDF-1.7")
        );
        let cmd: PdfCommand = serde_json::from_str(&json).unwrap();
        match cmd {
            PdfCommand::Split { file, ranges } => {
                assert_eq!(file, b"%PDF-1.7");
                assert_eq!(ranges, vec![(1, 3), (5, 5)]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_command_rejects_bad_base64() {
        let json = r#"{"type":"Flatten","file":"not base64!"}"#;
        assert!(serde_json::from_str::<PdfCommand>(json).is_err());
    }

    #[test]
    fn test_rotate_command_defaults_to_all_pages() {
        let json = format!(r#"{{"type":"Rotate","file":"{}","angle":90}}"#, encoded(b"x"));
        let cmd: PdfCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            cmd,
            PdfCommand::Rotate {
                pages: PageSelection::All,
                angle: 90,
                ..
            }
        ));
    }

    #[test]
    fn test_process_split_returns_files() {
        let cmd = PdfCommand::Split {
            file: create_test_pdf(4, "Split"),
            ranges: vec![(1, 2), (3, 4)],
        };
        let result = process_command(&cmd, &EngineContext::default(), &mut NoProgress);
        assert!(result.success);
        assert!(result.data.is_none());
        assert_eq!(result.files.as_ref().unwrap().len(), 2);
        assert_eq!(result.metrics.unwrap().page_count, 4);
    }

    #[test]
    fn test_process_compress_reports_details() {
        let cmd = PdfCommand::Compress {
            file: create_test_pdf(2, "Small"),
            level: CompressionLevel::Medium,
        };
        let result = process_command(&cmd, &EngineContext::default(), &mut NoProgress);
        assert!(result.success);
        assert!(result.data.is_some());
        let details = result.details.unwrap();
        assert!(details.get("method").is_some());
    }

    #[test]
    fn test_failure_emits_one_error_event() {
        let cmd = PdfCommand::Split {
            file: create_test_pdf(2, "Split"),
            ranges: vec![(1, 5)],
        };
        let mut events: Vec<ConversionProgress> = Vec::new();
        let mut sink = |e: ConversionProgress| events.push(e);
        let result = process_command(&cmd, &EngineContext::default(), &mut sink);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("page range"));
        let errors = events
            .iter()
            .filter(|e| e.status == ProgressStatus::Error)
            .count();
        assert_eq!(errors, 1);
        assert_eq!(events.last().unwrap().status, ProgressStatus::Error);
    }

    #[test]
    fn test_flatten_without_renderer_fails() {
        let cmd = PdfCommand::Flatten {
            file: create_test_pdf(1, "Flat"),
        };
        let result = process_command(&cmd, &EngineContext::default(), &mut NoProgress);
        assert!(!result.success);
    }

    #[test]
    fn test_sign_needs_image_or_text() {
        let cmd = PdfCommand::Sign {
            file: create_test_pdf(1, "Sign"),
            page: 1,
            position: NormalizedPosition::default(),
            width: None,
            image: None,
            text: None,
        };
        let mut progress_sink = NoProgress;
        let mut progress = ProgressReporter::new(&mut progress_sink);
        let err = execute_command(&cmd, &EngineContext::default(), &mut progress).unwrap_err();
        assert!(matches!(err, PdfWorksError::MissingInput(_)));
    }
}
