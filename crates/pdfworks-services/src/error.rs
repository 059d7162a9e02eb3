use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The converter ran but did not produce a usable document
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Conversion timed out after {0} seconds")]
    Timeout(u64),

    /// The collaborator could not be reached or refused the request
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
