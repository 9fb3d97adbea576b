pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("virtual user error: {0}")]
    Vu(String),

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`stages` must be a non-empty list of {{ duration, target }} with a positive total duration")]
    InvalidStages,

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid threshold: {0}")]
    InvalidThreshold(String),
}
