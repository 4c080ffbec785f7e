use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event timestamp {ts} outside hour boundary [{start}, {end})")]
    OutOfHourBounds { ts: i64, start: i64, end: i64 },

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("block corruption: {0}")]
    Corruption(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file {0} has no footer and could not be recovered")]
    NoFooter(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
