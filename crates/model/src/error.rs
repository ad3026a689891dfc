use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The credential was rejected by the provider.
    Unauthorized,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The request was malformed, e.g. an unknown model or a bad parameter.
    InvalidRequest,
    /// The provider could not be reached.
    Network,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::InvalidRequest => write!(f, "invalid request"),
            ErrorKind::Network => write!(f, "network failure"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}
