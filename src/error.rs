use thiserror::Error;

/// User-facing failure kinds, one per operation boundary.
///
/// Every failure in the library is converted into one of these at the
/// boundary of the operation that produced it, then rendered to a string in
/// the session's single error field. Nothing is retried and nothing is fatal.
#[derive(Debug, Error)]
pub enum RetouchError {
    /// Fetching the source image over HTTP failed.
    #[error("failed to load image: {0}")]
    Load(String),

    /// Reading a local image file failed.
    #[error("failed to read file: {0}")]
    Read(String),

    /// Generation was attempted without a prompt or a source image.
    #[error("{0}")]
    Validation(String),

    /// The edit service failed, or returned nothing usable.
    #[error("generation failed: {0}")]
    Generation(String),
}
