//! A local fake completion provider for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use palaver_model::{
    CompletionEvent, CompletionProvider, CompletionRequest, CompletionResponse,
    ErrorKind, ProviderError,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestCompletionResponse {
    events: VecDeque<CompletionEvent>,
    failure: Option<ErrorKind>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestCompletionResponse {
    fn from_preset(preset: PresetCompletion) -> Self {
        let mut events = VecDeque::new();
        for (position, candidate) in preset.candidates.into_iter().enumerate()
        {
            let index = candidate.index.unwrap_or(position as u32);
            for text in candidate.deltas {
                events.push_back(CompletionEvent::TextDelta { index, text });
            }
            events.push_back(CompletionEvent::Finished {
                index,
                reason: candidate.finish_reason,
            });
        }
        let failure = match preset.failure {
            Some(PresetFailure::Stream(kind)) => Some(kind),
            _ => None,
        };
        Self {
            events,
            failure,
            delay: preset.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        }
    }
}

impl CompletionResponse for TestCompletionResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(kind) = this.failure.take() {
                this.events.clear();
                return Poll::Ready(Err(Error {
                    message: "stream interrupted",
                    kind,
                }));
            }
            // Returns `None` once drained, also when called after completion.
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<PresetCompletion>,
    requests: Vec<CompletionRequest>,
    models: Vec<String>,
    models_failure: Option<ErrorKind>,
}

/// A local fake completion provider for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// provider should respond to each request. Presets are consumed in order,
/// one per request. If there are no enough presets in the script, an error
/// will be returned.
///
/// Clones share the same script and request log, so a test can keep a
/// clone around to inspect what the code under test has sent.
#[derive(Clone, Default)]
pub struct TestCompletionProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl TestCompletionProvider {
    /// Creates a provider that exposes the given models.
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        provider.lock().models = models.into_iter().map(Into::into).collect();
        provider
    }

    /// Appends a preset completion to the script.
    #[inline]
    pub fn add_completion(&self, preset: PresetCompletion) {
        self.lock().script.push_back(preset);
    }

    /// Appends a single-candidate completion with `text` to the script.
    #[inline]
    pub fn add_reply<S: Into<String>>(&self, text: S) {
        self.add_completion(PresetCompletion::with_text(text));
    }

    /// Makes every subsequent `list_models` call fail with `kind`.
    #[inline]
    pub fn fail_list_models(&self, kind: ErrorKind) {
        self.lock().models_failure = Some(kind);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    /// Returns the most recent request.
    #[inline]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock().requests.last().cloned()
    }

    /// Returns the number of presets not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // The state is never left inconsistent, so a poisoned lock is fine.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Debug for TestCompletionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TestCompletionProvider")
            .field("remaining", &state.script.len())
            .field("requests", &state.requests.len())
            .field("models", &state.models)
            .finish()
    }
}

impl CompletionProvider for TestCompletionProvider {
    type Error = crate::Error;
    type Response = TestCompletionResponse;

    fn send_request(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut state = self.lock();
        state.requests.push(req.clone());
        let result = match state.script.pop_front() {
            None => Err(Error {
                message: "no enough presets",
                kind: ErrorKind::Other,
            }),
            Some(PresetCompletion {
                failure: Some(PresetFailure::Request(kind)),
                ..
            }) => Err(Error {
                message: "request rejected",
                kind,
            }),
            Some(preset) => Ok(TestCompletionResponse::from_preset(preset)),
        };
        ready(result)
    }

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        let state = self.lock();
        let result = match state.models_failure {
            Some(kind) => Err(Error {
                message: "listing models failed",
                kind,
            }),
            None => Ok(state.models.clone()),
        };
        ready(result)
    }
}
