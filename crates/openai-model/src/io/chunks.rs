#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Why a body stopped before its end.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The connection broke.
    Interrupted,
    /// The request timeout elapsed.
    TimedOut,
}

/// Byte chunks of a streamed completion body.
pub enum Chunks {
    Http(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

impl Chunks {
    pub fn from_http(response: Response) -> Self {
        Chunks::Http(response)
    }

    /// Chunks replayed from memory, to feed the SSE reader in tests.
    #[cfg(test)]
    pub fn scripted<I: IntoIterator<Item = Bytes>>(chunks: I) -> Self {
        Chunks::Scripted(chunks.into_iter().collect())
    }

    /// Returns the next chunk, or `None` at the end of the body.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let response = match self {
            Chunks::Http(response) => response,
            #[cfg(test)]
            Chunks::Scripted(queue) => return Ok(queue.pop_front()),
        };
        match response.chunk().await {
            Ok(chunk) => Ok(chunk),
            Err(err) if err.is_timeout() => Err(Error::TimedOut),
            Err(err) => {
                debug!("body stream broke: {err}");
                Err(Error::Interrupted)
            }
        }
    }
}
