use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Rate limited while requesting {0}")]
    RateLimited(String),

    #[error("Response from {url} is not JSON: {reason}")]
    NotJson { url: String, reason: String },

    #[error("YouTube data unparsable: {0}")]
    Unparsable(String),

    #[error("{0} not found in response")]
    MissingField(String),

    #[error("Unrecognized youtube link: {0}")]
    UnrecognizedLink(String),

    #[error("Failed to parse subtitle XML: {0}")]
    XmlParseError(String),

    #[error("No subtitles found")]
    NoSubtitles,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Upstream sent something we could not make sense of. Only the current
    /// pagination branch is abandoned; the caller may carry on.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            Self::NotJson { .. } | Self::MissingField(_) | Self::Unparsable(_) | Self::XmlParseError(_)
        )
    }

    pub(crate) fn missing(what: impl Into<String>) -> Self {
        Self::MissingField(what.into())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
