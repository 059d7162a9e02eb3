//! Collaborators the PDF engine calls out to
//!
//! - [`convert`]: office documents to and from PDF through a headless converter process
//! - [`ai`]: summaries, translation, key facts, OCR and compression advice over HTTP

pub mod ai;
pub mod config;
pub mod convert;
pub mod error;

pub use ai::{AiClient, KeyInfo};
pub use config::{AiConfig, ConverterConfig};
pub use convert::{ConversionRequest, ConversionResponse, DocumentConverter, OfficeConverter, TargetFormat};
pub use error::{ServiceError, ServiceResult};
