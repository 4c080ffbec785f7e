use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("resource {0} not found")]
    ResourceNotFound(String),

    #[error("query timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("result decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
