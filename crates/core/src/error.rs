use std::error::Error as StdError;

use palaver_model::{ErrorKind, ProviderError};

use crate::template::TemplateError;

/// The error type for the conversation engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine was configured with invalid values.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The completion provider failed.
    #[error("provider error ({kind}): {source}")]
    Provider {
        /// The kind reported by the provider.
        kind: ErrorKind,
        /// The original error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The provider finished without returning any candidate.
    #[error("the provider returned no completion candidates")]
    NoCandidates,
}

impl Error {
    pub(crate) fn provider<E: ProviderError>(err: E) -> Self {
        Self::Provider {
            kind: err.kind(),
            source: Box::new(err),
        }
    }

    /// Returns the provider error kind, if this is a provider error.
    #[inline]
    pub fn provider_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Describes why the engine configuration was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The selected model is not in the available set.
    #[error(
        "model `{model}` must be one of the available models: [{}]",
        .available.join(", ")
    )]
    UnavailableModel {
        /// The selected model.
        model: String,
        /// The models that are available.
        available: Vec<String>,
    },
    /// No model is selected, or the selection is not a string.
    #[error("no model is selected")]
    MissingModel,
    /// A template failed to parse.
    #[error("invalid {which} template: {source}")]
    Template {
        /// Which template is invalid.
        which: &'static str,
        /// The parse error.
        #[source]
        source: TemplateError,
    },
}

#[cfg(test)]
mod tests {
    use std::fmt::{self, Display, Formatter};

    use super::*;

    #[derive(Debug)]
    struct Throttled;

    impl Display for Throttled {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "slow down")
        }
    }

    impl StdError for Throttled {}

    impl ProviderError for Throttled {
        fn kind(&self) -> ErrorKind {
            ErrorKind::RateLimitExceeded
        }
    }

    #[test]
    fn test_display() {
        let err = Error::from(ConfigurationError::UnavailableModel {
            model: "not-a-real-model".to_owned(),
            available: vec!["davinci".to_owned(), "curie".to_owned()],
        });
        assert_eq!(
            err.to_string(),
            "invalid configuration: model `not-a-real-model` must be one of \
             the available models: [davinci, curie]"
        );
        assert_eq!(err.provider_kind(), None);

        let err = Error::provider(Throttled);
        assert_eq!(
            err.to_string(),
            "provider error (rate limit exceeded): slow down"
        );
        assert_eq!(err.provider_kind(), Some(ErrorKind::RateLimitExceeded));
        assert_eq!(err.source().unwrap().to_string(), "slow down");
    }
}
