use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedtapError>;

#[derive(Error, Debug)]
pub enum FeedtapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),
}
