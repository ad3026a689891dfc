use std::collections::BTreeMap;
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use palaver_model::{
    CompletionEvent, CompletionProvider, CompletionRequest, CompletionResponse,
    FinishReason,
};
use tracing::Instrument;

use crate::Error;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;
type SendRequestFn =
    Arc<dyn Fn(CompletionRequest) -> BoxedFuture<Completion> + Send + Sync>;
type ListModelsFn = Arc<dyn Fn() -> BoxedFuture<Vec<String>> + Send + Sync>;

/// A wrapper around a completion provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct CompletionClient {
    send_request_fn: SendRequestFn,
    list_models_fn: ListModelsFn,
}

impl CompletionClient {
    pub fn new<P: CompletionProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `CompletionClient` doesn't
        // have a generic parameter and we don't want it either.
        let provider = Arc::new(provider);

        let send_request_fn: SendRequestFn = {
            let provider = Arc::clone(&provider);
            Arc::new(move |req| {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        // The provider generates one candidate if `n` is
                        // not given.
                        let limit = req.params.n().unwrap_or(1);
                        let resp = fut.await.map_err(|err| {
                            error!("got an error: {err:?}");
                            Error::provider(err)
                        })?;
                        collect_candidates::<P>(resp, limit).await
                    }
                    .instrument(trace_span!("completion client req")),
                )
            })
        };

        let list_models_fn: ListModelsFn = Arc::new(move || {
            let fut = provider.list_models();
            Box::pin(async move {
                fut.await.map_err(|err| {
                    error!("failed to list models: {err:?}");
                    Error::provider(err)
                })
            })
        });

        Self {
            send_request_fn,
            list_models_fn,
        }
    }

    /// Sends a request and waits for the complete response.
    #[inline]
    pub async fn send_request(
        &self,
        req: CompletionRequest,
    ) -> Result<Completion, Error> {
        (self.send_request_fn)(req).await
    }

    /// Lists the models exposed by the provider.
    #[inline]
    pub async fn list_models(&self) -> Result<Vec<String>, Error> {
        (self.list_models_fn)().await
    }
}

/// A completely received response from the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// Candidates ordered by their index.
    pub candidates: Vec<Candidate>,
}

impl Completion {
    /// Returns the text of the candidate with index 0, if the provider
    /// sent anything for it.
    #[inline]
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .filter(|c| c.index == 0)
            .map(|c| c.text.as_str())
    }
}

/// One generated continuation of a prompt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Index of the candidate in the request, not necessarily its position
    /// in [`Completion::candidates`].
    pub index: u32,
    /// The generated text.
    pub text: String,
    /// Why the generation stopped, if the provider said so.
    pub finish_reason: Option<FinishReason>,
}

async fn collect_candidates<P: CompletionProvider + 'static>(
    resp: P::Response,
    limit: u64,
) -> Result<Completion, Error> {
    let mut candidates: BTreeMap<u32, Candidate> = BTreeMap::new();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event = poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx))
            .await
            .map_err(|err| {
                error!("got an error: {err:?}");
                Error::provider(err)
            })?;
        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        let index = match &event {
            CompletionEvent::TextDelta { index, .. }
            | CompletionEvent::Finished { index, .. } => *index,
        };
        if u64::from(index) >= limit {
            warn!("ignoring an event of unrequested candidate {index}");
            continue;
        }
        let candidate = candidates.entry(index).or_insert_with(|| Candidate {
            index,
            ..Default::default()
        });
        match event {
            CompletionEvent::TextDelta { text, .. } => {
                candidate.text.push_str(&text);
            }
            CompletionEvent::Finished { reason, .. } => {
                candidate.finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(Completion {
        candidates: candidates.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use palaver_model::{ErrorKind, GenerationParams};
    use palaver_test_model::{
        PresetCandidate, PresetCompletion, TestCompletionProvider,
    };

    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest::new("Hi", GenerationParams::new().with_n(2))
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestCompletionProvider::default();
        provider.add_completion(PresetCompletion::with_candidates([
            PresetCandidate::deltas(["How ", "are ", "you?"]),
            PresetCandidate::text("Hello.")
                .with_finish_reason(FinishReason::Length),
        ]));

        let client = CompletionClient::new(provider);
        let completion = client.send_request(request()).await.unwrap();
        assert_eq!(completion.first_text(), Some("How are you?"));
        assert_eq!(
            completion.candidates[0].finish_reason,
            Some(FinishReason::Stop)
        );
        assert_eq!(completion.candidates[1].text, "Hello.");
        assert_eq!(
            completion.candidates[1].finish_reason,
            Some(FinishReason::Length)
        );
    }

    #[tokio::test]
    async fn test_sparse_indices() {
        let provider = TestCompletionProvider::default();
        provider.add_completion(PresetCompletion::with_candidates([
            PresetCandidate::text("second").with_index(1),
            PresetCandidate::text("far away").with_index(u32::MAX),
        ]));
        provider.add_completion(PresetCompletion::with_candidates([
            PresetCandidate::text("huge").with_index(5_000_000),
        ]));

        let client = CompletionClient::new(provider);
        let completion = client.send_request(request()).await.unwrap();
        assert_eq!(completion.candidates.len(), 1);
        assert_eq!(completion.candidates[0].index, 1);
        assert_eq!(completion.candidates[0].text, "second");
        assert_eq!(completion.first_text(), None);

        let completion = client.send_request(request()).await.unwrap();
        assert!(completion.candidates.is_empty());
        assert_eq!(completion.first_text(), None);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let provider = TestCompletionProvider::default();
        provider.add_completion(PresetCompletion::broken_stream(
            ErrorKind::Network,
        ));
        let client = CompletionClient::new(provider);

        let err = client.send_request(request()).await.unwrap_err();
        assert_eq!(err.provider_kind(), Some(ErrorKind::Network));

        // Nothing scripted anymore.
        let err = client.send_request(request()).await.unwrap_err();
        assert_eq!(err.provider_kind(), Some(ErrorKind::Other));
    }

    #[tokio::test]
    async fn test_list_models() {
        let provider = TestCompletionProvider::with_models(["davinci"]);
        let client = CompletionClient::new(provider.clone());
        assert_eq!(client.list_models().await.unwrap(), ["davinci"]);

        provider.fail_list_models(ErrorKind::Unauthorized);
        let err = client.list_models().await.unwrap_err();
        assert_eq!(err.provider_kind(), Some(ErrorKind::Unauthorized));
    }
}
