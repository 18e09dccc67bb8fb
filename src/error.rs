use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("workspace not found: {0}")]
    NotFound(String),

    #[error("another workspace operation is already running")]
    Busy,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad workspace file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
