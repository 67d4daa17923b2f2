use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitepulseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Rank provider error: {0}")]
    Provider(String),

    #[error("Summary error: {0}")]
    Summary(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
