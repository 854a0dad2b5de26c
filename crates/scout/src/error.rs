use thiserror::Error;

/// Configuration errors raised while building endpoints or a registry.
///
/// Network failures never surface here: they are reported as
/// [`Outcome::Failure`](crate::Outcome::Failure) on the outcome stream.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Endpoint id must not be nil")]
    NilId,

    #[error("Endpoint address must not be empty")]
    EmptyAddress,

    #[error("Check interval must be greater than zero")]
    ZeroInterval,

    #[error("Invalid duration '{0}': {1}")]
    InvalidDuration(String, String),

    #[error("Invalid expected body pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Invalid resolve override '{0}', expected ip or ip:port")]
    InvalidResolveTo(String),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
