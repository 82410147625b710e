use std::error::Error as StdError;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    Http(hyper::http::Error),
    Io(std::io::Error),
    Hyper(hyper::Error),
    Reqwest(reqwest::Error),
    Json(serde_json::Error),
    Url(url::ParseError),
    /// The upstream answered with a non-success status
    Upstream(u16, String),
    InvalidFeedId,
    Generic(String),
}

impl From<hyper::http::Error> for Error {
    fn from(err: hyper::http::Error) -> Self {
        Error::Http(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::Hyper(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Reqwest(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Url(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Generic(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Hyper(e) => write!(f, "Hyper error: {}", e),
            Error::Reqwest(e) => write!(f, "Request error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Url(e) => write!(f, "URL error: {}", e),
            Error::Upstream(status, reason) => {
                write!(f, "API response error: {} {}", status, reason)
            }
            Error::InvalidFeedId => write!(f, "Invalid feed id"),
            Error::Generic(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Hyper(e) => Some(e),
            Error::Reqwest(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Url(e) => Some(e),
            Error::Upstream(..) | Error::InvalidFeedId | Error::Generic(_) => None,
        }
    }
}
