use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfWorksError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// The document is encrypted and no password was supplied
    #[error("Document is password protected; a password is required")]
    NeedsPassword,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Page rendering failed: {0}")]
    RenderError(String),

    #[error("Image encoding failed: {0}")]
    EncodeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PdfWorksError {
    /// True for errors caused by the caller's input rather than by the document or engine
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PdfWorksError::InvalidRange(_)
                | PdfWorksError::InvalidInput(_)
                | PdfWorksError::MissingInput(_)
        )
    }

    /// True for errors that a password would resolve
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            PdfWorksError::NeedsPassword | PdfWorksError::IncorrectPassword
        )
    }
}

impl From<lopdf::Error> for PdfWorksError {
    fn from(e: lopdf::Error) -> Self {
        PdfWorksError::OperationError(e.to_string())
    }
}
