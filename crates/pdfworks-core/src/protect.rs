//! Adding and removing password protection
//!
//! Both directions copy every page into a fresh document: encryption state is
//! fixed when a file is written, so toggling it in place is not enough.

use crate::document::{check_header, is_encrypted, load_document, rebuild_document, save_document};
use crate::error::PdfWorksError;
use crate::flatten::FLATTEN_QUALITY;
use crate::progress::ProgressReporter;
use crate::raster::{rasterize_document, PageRenderer, RasterLimits, RasterPass};
use crate::security::{decrypt_document, encrypt_document, EncryptionSettings};
use lopdf::Document;
use tracing::{info, warn};

/// Encrypt a document with user/owner passwords and permission flags
pub fn protect_document(bytes: &[u8], settings: &EncryptionSettings) -> Result<Vec<u8>, PdfWorksError> {
    if settings.user_password.is_empty() && settings.owner_password.is_empty() {
        return Err(PdfWorksError::MissingInput("A password is required".into()));
    }

    let source = load_document(bytes, None)?;
    let mut doc = rebuild_document(&source)?;
    // streams must be deflated before their bytes are encrypted
    doc.compress();
    encrypt_document(&mut doc, settings)?;

    info!(
        "Protected {} pages with {:?}",
        doc.get_pages().len(),
        settings.algorithm
    );
    save_document(&mut doc)
}

/// Remove protection given the user or owner password.
///
/// Documents using a security handler that cannot be decrypted here are
/// rasterized through `renderer` instead, when one is available.
pub fn unlock_document(
    bytes: &[u8],
    password: &str,
    renderer: Option<&dyn PageRenderer>,
    limits: &RasterLimits,
    progress: &mut ProgressReporter<'_>,
) -> Result<Vec<u8>, PdfWorksError> {
    check_header(bytes)?;
    let mut doc = Document::load_mem(bytes).map_err(|e| PdfWorksError::ParseError(e.to_string()))?;
    if !is_encrypted(&doc) {
        return Err(PdfWorksError::InvalidInput(
            "Document is not password protected".into(),
        ));
    }
    progress.processing(10, "Decrypting document");

    match decrypt_document(&mut doc, password.as_bytes()) {
        Ok(()) => {
            progress.processing(50, "Rebuilding document");
            let mut unlocked = rebuild_document(&doc)?;
            unlocked.compress();
            save_document(&mut unlocked)
        }
        Err(PdfWorksError::UnsupportedEncryption(reason)) => {
            let Some(renderer) = renderer else {
                return Err(PdfWorksError::UnsupportedEncryption(reason));
            };
            warn!("Cannot decrypt structurally ({}); rasterizing pages", reason);
            let pass = RasterPass {
                password: Some(password),
                scale: limits.flatten_scale,
                quality: FLATTEN_QUALITY,
                band: (20, 90),
            };
            let mut unlocked = rasterize_document(&doc, bytes, renderer, &pass, limits, progress)?;
            save_document(&mut unlocked)
        }
        Err(e) => Err(e),
    }
}
