use thiserror::Error;

pub type Result<T> = std::result::Result<T, PluginPageError>;

#[derive(Debug, Error)]
pub enum PluginPageError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PluginPageError {
    fn from(err: reqwest::Error) -> Self {
        PluginPageError::Network(err.to_string())
    }
}

impl From<url::ParseError> for PluginPageError {
    fn from(err: url::ParseError) -> Self {
        PluginPageError::Parse(err.to_string())
    }
}
