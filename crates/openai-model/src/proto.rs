use palaver_model::{CompletionRequest, FinishReason, GenerationParams};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

/// Keys that the request body owns, they are never taken from the
/// generation parameters.
const RESERVED_KEYS: &[&str] = &["prompt", "stop", "stream"];

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CompletionChunk {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub text: String,
    pub finish_reason: Option<String>,
}

impl Choice {
    #[inline]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.finish_reason.as_deref()? {
            "length" => Some(FinishReason::Length),
            _ => Some(FinishReason::Stop),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelObject>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ModelObject {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateCompletionRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
    #[serde(flatten)]
    params: GenerationParams,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &CompletionRequest,
    config: &OpenAIConfig,
) -> CreateCompletionRequest {
    let mut params = req.params.clone();
    let model = params
        .remove(GenerationParams::MODEL)
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| config.model.clone());
    for key in RESERVED_KEYS {
        params.remove(key);
    }
    CreateCompletionRequest {
        model,
        prompt: req.prompt.clone(),
        stop: req.stop.clone(),
        stream: true,
        params,
    }
}
