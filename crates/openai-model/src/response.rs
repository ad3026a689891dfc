use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use palaver_model::{CompletionEvent, CompletionResponse, ErrorKind};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{ChunksError, Sse, SseError};
use crate::proto::CompletionChunk;

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // One chunk may carry choices of several candidates, the events that
    // are parsed but not yet returned are kept here.
    pending_events: VecDeque<CompletionEvent>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<CompletionEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_events: Default::default(),
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl CompletionResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<CompletionEvent>, PartialState), Error> {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(SseError::ChunksError(err)) => {
                let message = match err {
                    ChunksError::TimedOut => "response timed out",
                    ChunksError::Interrupted => "response was interrupted",
                };
                return Err(Error::new(message, ErrorKind::Network));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let chunk = serde_json::from_str::<CompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // Text always goes before the finish event of the same choice.
        for choice in chunk.choices {
            let index = choice.index;
            let reason = choice.finish_reason();
            if !choice.text.is_empty() {
                partial_state
                    .pending_events
                    .push_back(CompletionEvent::TextDelta {
                        index,
                        text: choice.text,
                    });
            }
            if let Some(reason) = reason {
                partial_state
                    .pending_events
                    .push_back(CompletionEvent::Finished { index, reason });
            }
        }
    }

    Ok((None, partial_state))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use palaver_model::{FinishReason, ProviderError};

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(
        chunks: Vec<Bytes>,
    ) -> Result<Vec<CompletionEvent>, Error> {
        let sse = Sse::new(Chunks::scripted(chunks));
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        // Polling after completion keeps returning `None`.
        assert_eq!(
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?,
            None
        );
        Ok(events)
    }

    #[tokio::test]
    async fn test_simple_events() {
        let events = collect_events(vec![Bytes::from_static(include_bytes!(
            "../fixtures/test_response.txt"
        ))])
        .await
        .unwrap();

        let mut texts = [String::new(), String::new()];
        let mut reasons = [None, None];
        for event in events {
            match event {
                CompletionEvent::TextDelta { index, text } => {
                    assert!(reasons[index as usize].is_none());
                    texts[index as usize].push_str(&text);
                }
                CompletionEvent::Finished { index, reason } => {
                    reasons[index as usize] = Some(reason);
                }
            }
        }
        assert_eq!(texts[0], " Hello Sam!\n");
        assert_eq!(texts[1], " Hi there, how are");
        assert_eq!(reasons, [Some(FinishReason::Stop), Some(FinishReason::Length)]);
    }

    #[tokio::test]
    async fn test_id_mismatch() {
        let err = collect_events(vec![
            Bytes::from_static(
                b"data: {\"id\":\"a\",\"choices\":[{\"text\":\"x\",\"index\":0,\"finish_reason\":null}]}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"id\":\"b\",\"choices\":[{\"text\":\"y\",\"index\":0,\"finish_reason\":null}]}\n\n",
            ),
        ])
        .await
        .unwrap_err();
        assert_eq!(err.message(), "chunk id mismatch");
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let err = collect_events(vec![Bytes::from_static(b"data: {oops\n\n")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
