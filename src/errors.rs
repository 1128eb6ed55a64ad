use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Remote API returned an error: {0}")]
    ApiError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Stream failed: {0}")]
    StreamError(String),

    #[error("Remote API returned an empty response")]
    EmptyResponse,

    #[error("Failed to access Discord API: {0}")]
    PlatformError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl RelayError {
    /// True for failures of the remote generation API (as opposed to platform failures).
    #[must_use]
    pub const fn is_remote_api_error(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_)
                | Self::HttpError(_)
                | Self::ParseError(_)
                | Self::StreamError(_)
                | Self::EmptyResponse
        )
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(error: reqwest::Error) -> Self {
        RelayError::HttpError(error.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::ParseError(error.to_string())
    }
}

impl From<serenity::Error> for RelayError {
    fn from(error: serenity::Error) -> Self {
        RelayError::PlatformError(error.to_string())
    }
}
