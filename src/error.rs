use thiserror::Error;

/// I/O errors that can occur when reading from chunk storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Local filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

/// Errors raised while parsing multiscale or array metadata
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Document is not valid JSON or does not match the expected schema
    #[error("Invalid {document}: {message}")]
    Malformed {
        document: &'static str,
        message: String,
    },

    /// A required document or field is missing
    #[error("Missing {0}")]
    Missing(String),

    /// A field has an unexpected value
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Array metadata that `zarrs` rejects (unknown codec, data type, ...)
    #[error("Cannot open array {path}: {message}")]
    Array { path: String, message: String },
}

/// Errors that abort opening a pyramid or building one of its views
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// I/O error while reading metadata
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Malformed multiscale or array metadata
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// The group attributes carry no multiscales entry
    #[error("No multiscales metadata found in {0}")]
    NoMultiscales(String),

    /// Non-spatial or otherwise unsupported axis layout
    #[error("Unsupported axis: {0}")]
    UnsupportedAxis(String),

    /// Level scale ratios the multiplexer cannot express
    #[error("Unsupported pyramid ({reason}): {detail}")]
    UnsupportedPyramid { reason: &'static str, detail: String },

    /// A scale path was requested that the descriptor does not list
    #[error("Scale {0} not available")]
    ScaleNotAvailable(String),

    /// The pyramid has no levels
    #[error("Pyramid has no levels")]
    EmptyPyramid,
}

/// Per-request read errors. The pyramid stays usable after any of these.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// Step vector the selection cannot satisfy
    #[error("Invalid step {step:?}: {reason}")]
    InvalidStep { step: [u64; 3], reason: &'static str },

    /// Chunk fetch or decode failure reported by `zarrs`
    #[error("Failed to read {path}: {message}")]
    Array { path: String, message: String },
}
