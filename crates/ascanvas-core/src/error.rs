use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid input: {0}")]
    InvalidArgument(String),

    #[error("out of bounds")]
    OutOfBounds,

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("item already exists: {0}")]
    AlreadyExists(String),

    #[error("broadcaster closed")]
    Closed,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CanvasError {
    /// Errors caused by the caller's input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CanvasError::InvalidArgument(_) | CanvasError::OutOfBounds
        )
    }
}

pub type Result<T> = std::result::Result<T, CanvasError>;

/// Collapse a list of validation failures into one `InvalidArgument`.
pub(crate) fn check_violations(errs: Vec<&str>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        Err(CanvasError::InvalidArgument(errs.join(", ")))
    }
}
