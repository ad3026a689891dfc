use crate::GenerationParams;

/// A request to be sent to the completion provider.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// The prompt text to continue.
    pub prompt: String,
    /// Sampling parameters, including the model selection.
    pub params: GenerationParams,
    /// Sequences where the provider will stop generating further text.
    /// The returned text never contains the stop sequence itself.
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// Creates a request with the given prompt and parameters, and no stop
    /// sequences.
    #[inline]
    pub fn new<S: Into<String>>(prompt: S, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
            stop: vec![],
        }
    }

    /// Sets the stop sequences.
    #[inline]
    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}
