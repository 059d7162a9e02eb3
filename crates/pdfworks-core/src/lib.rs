//! PDF transform engine
//!
//! Each operation takes document bytes, applies one pass of changes with
//! lopdf and returns new bytes. Nothing is shared between calls.
//!
//! - Page structure: [`merge`], [`split`], [`rotate`], [`crop`]
//! - Drawing onto pages: [`watermark`], [`stamp`], [`annotate`], [`sign`]
//! - Rasterizing passes: [`flatten`], [`compress`], [`compare`], through a [`raster::PageRenderer`]
//! - Security: [`protect`]
//! - Placement math shared by the drawing operations: [`coords`]
//!
//! [`command::PdfCommand`] wraps every operation in a serialisable form.

pub mod annotate;
pub mod command;
pub mod compare;
pub mod compress;
pub mod config;
pub mod content;
pub mod coords;
pub mod crop;
pub mod document;
pub mod error;
pub mod flatten;
pub mod merge;
pub mod metadata;
pub mod pages;
pub mod progress;
pub mod protect;
pub mod raster;
pub mod rotate;
pub mod security;
pub mod sign;
pub mod split;
pub mod stamp;
pub mod text;
pub mod watermark;

#[cfg(test)]
pub(crate) mod test_support;

pub use annotate::{annotate_document, Annotation, AnnotationKind};
pub use command::{execute_command, process_command, EngineContext, PdfCommand, ProcessMetrics, ProcessResult};
pub use compare::{compare_documents, ComparisonReport};
pub use compress::{compress_document, CompressionAdvisor, CompressionLevel, CompressionOutcome, FixedAdvice, NoAdvice};
pub use config::EngineConfig;
pub use coords::{map_to_page, NormalizedPosition, OverlaySize, PagePoint, PageSize};
pub use crop::{crop_pages, CropMargins, MarginUnit};
pub use document::{inspect_document, DocumentInfo};
pub use error::PdfWorksError;
pub use flatten::flatten_document;
pub use merge::merge_documents;
pub use metadata::{update_metadata, DocumentMetadata};
pub use pages::{parse_ranges, PageSelection};
pub use progress::{ConversionProgress, NoProgress, ProgressReporter, ProgressSink, ProgressStatus};
pub use protect::{protect_document, unlock_document};
pub use raster::{PageRenderer, RasterLimits};
pub use rotate::rotate_pages;
pub use security::{EncryptionAlgorithm, EncryptionSettings, Permissions};
pub use sign::{sign_document, SignatureContent, SignatureRequest};
pub use split::{delete_pages, extract_pages, reorder_pages, split_document};
pub use stamp::{add_header_footer, add_page_numbers, HeaderFooterOptions, PageNumberOptions};
pub use watermark::{add_watermark, WatermarkRequest};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfWorksError> {
    let doc = document::load_document(bytes, None)?;
    Ok(doc.get_pages().len() as u32)
}
