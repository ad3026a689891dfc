use std::time::Duration;

use palaver_model::{ErrorKind, FinishReason};
use serde::{Deserialize, Serialize};

/// One candidate in a preset completion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetCandidate {
    /// Text deltas of this candidate, streamed in order.
    pub deltas: Vec<String>,
    /// The finish reason reported after the last delta.
    pub finish_reason: FinishReason,
    /// Index reported for this candidate, its position by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl PresetCandidate {
    /// Creates a candidate that streams `text` in one delta.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            deltas: vec![text.into()],
            finish_reason: FinishReason::Stop,
            index: None,
        }
    }

    /// Creates a candidate that streams the given deltas.
    #[inline]
    pub fn deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            finish_reason: FinishReason::Stop,
            index: None,
        }
    }

    /// Overrides the finish reason.
    #[inline]
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Reports the candidate under `index` instead of its position.
    #[inline]
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }
}

/// A scripted failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresetFailure {
    /// The request itself is rejected.
    Request(#[serde(with = "error_kind")] ErrorKind),
    /// The request is accepted, but the stream breaks before any event.
    Stream(#[serde(with = "error_kind")] ErrorKind),
}

/// The preset completion for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetCompletion {
    /// Candidates in this completion.
    pub candidates: Vec<PresetCandidate>,
    /// If set, the request fails instead of producing candidates.
    pub failure: Option<PresetFailure>,
    /// Delay before each event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
}

impl PresetCompletion {
    /// Creates a completion with a single candidate.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_candidates([PresetCandidate::text(text)])
    }

    /// Creates a completion with the given candidates.
    #[inline]
    pub fn with_candidates(
        candidates: impl Into<Vec<PresetCandidate>>,
    ) -> Self {
        Self {
            candidates: candidates.into(),
            failure: None,
            delay: None,
        }
    }

    /// Creates a completion whose request fails with `kind`.
    #[inline]
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            candidates: vec![],
            failure: Some(PresetFailure::Request(kind)),
            delay: None,
        }
    }

    /// Creates a completion whose stream breaks with `kind`.
    #[inline]
    pub fn broken_stream(kind: ErrorKind) -> Self {
        Self {
            candidates: vec![],
            failure: Some(PresetFailure::Stream(kind)),
            delay: None,
        }
    }

    /// Sets the delay before each event.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

mod error_kind {
    use palaver_model::ErrorKind;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        kind: &ErrorKind,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match kind {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Network => "network",
            ErrorKind::Other => "other",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<ErrorKind, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "unauthorized" => ErrorKind::Unauthorized,
            "rate_limit_exceeded" => ErrorKind::RateLimitExceeded,
            "invalid_request" => ErrorKind::InvalidRequest,
            "network" => ErrorKind::Network,
            _ => ErrorKind::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let completion = PresetCompletion::with_candidates([
            PresetCandidate::deltas(["Hello ", "there!"]),
            PresetCandidate::text("Hi")
                .with_finish_reason(FinishReason::Length),
        ])
        .with_delay(Duration::from_millis(5));

        let serialized = serde_json::to_string(&completion).unwrap();
        let deserialized: PresetCompletion =
            serde_json::from_str(&serialized).unwrap();
        assert_eq!(completion, deserialized);

        let failing = PresetCompletion::failing(ErrorKind::RateLimitExceeded);
        let serialized = serde_json::to_string(&failing).unwrap();
        assert!(serialized.contains("rate_limit_exceeded"));
        let deserialized: PresetCompletion =
            serde_json::from_str(&serialized).unwrap();
        assert_eq!(failing, deserialized);
    }
}
