use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use palaver_model::{
    CompletionEvent, CompletionProvider, CompletionRequest, CompletionResponse,
    ErrorKind, FinishReason, GenerationParams, ProviderError,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeProviderError(ErrorKind);

impl Display for FakeProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeProviderError {}

impl ProviderError for FakeProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last line of the prompt back word by word, and honors the
/// stop sequences of the request.
#[derive(Debug)]
struct FakeCompletionResponse {
    fake_items: VecDeque<String>,
    stopped: bool,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeCompletionResponse {
    fn new(req: &CompletionRequest) -> Self {
        let last_line = req.prompt.lines().last().unwrap_or_default();
        let mut text = format!("You said {last_line}\nHUMAN: thanks");
        for stop in &req.stop {
            if let Some(idx) = text.find(stop.as_str()) {
                text.truncate(idx);
            }
        }
        let fake_items = text
            .split_inclusive(' ')
            .map(ToString::to_string)
            .collect();
        Self {
            fake_items,
            stopped: false,
            sleep: None,
        }
    }
}

impl CompletionResponse for FakeCompletionResponse {
    type Error = FakeProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(text) = this.fake_items.pop_front() {
                return Poll::Ready(Ok(Some(CompletionEvent::TextDelta {
                    index: 0,
                    text,
                })));
            }
            if !this.stopped {
                this.stopped = true;
                return Poll::Ready(Ok(Some(CompletionEvent::Finished {
                    index: 0,
                    reason: FinishReason::Stop,
                })));
            }

            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeCompletionProvider;

impl CompletionProvider for FakeCompletionProvider {
    type Error = FakeProviderError;
    type Response = FakeCompletionResponse;

    fn send_request(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = if req.prompt.is_empty() {
            Err(FakeProviderError(ErrorKind::InvalidRequest))
        } else {
            Ok(FakeCompletionResponse::new(req))
        };
        ready(result)
    }

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        ready(Ok(vec!["echo".to_owned()]))
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    async fn collect_text(mut resp: FakeCompletionResponse) -> String {
        let mut text = String::new();
        loop {
            let resp_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match resp_fut.await {
                Ok(Some(CompletionEvent::TextDelta { index, text: delta })) => {
                    assert_eq!(index, 0);
                    text.push_str(&delta);
                }
                Ok(Some(CompletionEvent::Finished { reason, .. })) => {
                    assert_eq!(reason, FinishReason::Stop);
                }
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }
        text
    }

    #[tokio::test]
    async fn test_completion() {
        let provider = FakeCompletionProvider;
        let req = CompletionRequest::new(
            "HUMAN:Good morning",
            GenerationParams::new().with_model("echo"),
        );
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(
            collect_text(resp).await,
            "You said HUMAN:Good morning\nHUMAN: thanks"
        );
    }

    #[tokio::test]
    async fn test_stop_sequences() {
        let provider = FakeCompletionProvider;
        let req = CompletionRequest::new("Good morning", GenerationParams::new())
            .with_stop(["HUMAN:", "BOT:"]);
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_text(resp).await, "You said Good morning\n");
    }

    #[tokio::test]
    async fn test_list_models() {
        let provider = FakeCompletionProvider;
        assert_eq!(provider.list_models().await.unwrap(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeCompletionProvider;
        let req = CompletionRequest::new("", GenerationParams::new());
        let result = provider.send_request(&req).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
