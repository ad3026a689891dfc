use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

/// A response from the completion provider.
pub trait CompletionResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>>;
}

/// The reason why a candidate completion has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    /// The model reached a natural stop point or a stop sequence.
    Stop,
    /// The output length limit was reached.
    Length,
}

/// The event from a completion response.
///
/// A single request may produce several candidates, so every event
/// carries the index of the candidate it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionEvent {
    /// Received a text delta for a candidate.
    TextDelta {
        /// Index of the candidate.
        index: u32,
        /// The text appended to the candidate.
        text: String,
    },
    /// A candidate has been completed.
    Finished {
        /// Index of the candidate.
        index: u32,
        /// Why the candidate stopped.
        reason: FinishReason,
    },
}
