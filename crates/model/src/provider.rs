use std::error::Error;

use crate::error::ErrorKind;
use crate::request::CompletionRequest;
use crate::response::CompletionResponse;

/// The error type for a completion provider.
pub trait ProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a completion provider, which is an entry for
/// listing models and sampling completions.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait CompletionProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ProviderError;

    /// The response type for this provider.
    type Response: CompletionResponse<Error = Self::Error>;

    /// Sends a completion request to the provider.
    fn send_request(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;

    /// Lists the identifiers of the models this provider currently
    /// exposes.
    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static;
}
