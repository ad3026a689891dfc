mod builder;

use std::fmt::{self, Debug, Formatter};

use chrono::{DateTime, Utc};
use palaver_model::{CompletionRequest, GenerationParams};
use serde_json::Value;

use crate::completion_client::{Completion, CompletionClient};
use crate::conversation::{Conversation, DEFAULT_HUMAN_NAME};
use crate::error::{ConfigurationError, Error};
use crate::template::{MessageTemplate, StartTemplate};
pub use builder::{AgentBuilder, DEFAULT_MODEL, default_params};

/// A conversation engine, which maintains a transcript between a human and
/// an AI persona, and asks a completion provider for the persona's replies.
///
/// Every operation that changes the conversation takes `&mut self`, so
/// calls on one agent are always serialized. Clone the agent to fork a
/// conversation.
#[derive(Clone)]
pub struct Agent {
    client: CompletionClient,
    name: Option<String>,
    start_template: StartTemplate,
    message_template: MessageTemplate,
    params: GenerationParams,
    available_models: Vec<String>,
    conversation: Conversation,
}

/// A turn prefix that has been rendered but not yet applied.
///
/// Rendering may need to (re)start the conversation. The restart is carried
/// here and only applied together with the prefix, so a failed provider
/// call leaves the conversation untouched.
struct PreparedTurn {
    restart: Option<Restart>,
    human_name: String,
    prefix: String,
}

struct Restart {
    transcript: String,
    human_name: Option<String>,
}

impl Agent {
    /// Returns the persona's display name.
    ///
    /// This is the configured name, or the upper-cased model identifier
    /// when no name is configured or the configured name is itself the id
    /// of an available model.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) if !self.available_models.contains(name) => {
                name.clone()
            }
            _ => self.model().to_uppercase(),
        }
    }

    /// Returns the selected model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        self.params.model().unwrap_or_default()
    }

    /// Returns the generation parameters.
    #[inline]
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Returns the models this agent was validated against.
    #[inline]
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Returns the start template.
    #[inline]
    pub fn start_template(&self) -> &StartTemplate {
        &self.start_template
    }

    /// Returns the message template.
    #[inline]
    pub fn message_template(&self) -> &MessageTemplate {
        &self.message_template
    }

    /// Returns the conversation state.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the full transcript.
    #[inline]
    pub fn transcript(&self) -> &str {
        self.conversation.transcript()
    }

    /// Returns `true` once a conversation has been started.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.conversation.is_active()
    }

    /// Returns the human name used for rendering turns and stop sequences.
    #[inline]
    pub fn human_name(&self) -> &str {
        self.conversation.human_name()
    }

    /// Returns the time the current conversation was started.
    #[inline]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.conversation.started_at()
    }

    /// Returns every message recorded so far.
    #[inline]
    pub fn messages(&self) -> &[String] {
        self.conversation.messages()
    }

    /// Returns every non-empty reply recorded so far.
    #[inline]
    pub fn replies(&self) -> &[String] {
        self.conversation.replies()
    }

    /// Returns the number of human turns in the transcript.
    ///
    /// See [`Conversation::turn_count`].
    #[inline]
    pub fn len(&self) -> usize {
        self.conversation.turn_count()
    }

    /// Returns `true` if the transcript has no human turn.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Agent {
    /// Starts a new conversation, discarding the previous transcript.
    ///
    /// The transcript becomes the rendered start template, the human is
    /// described as `"a person named {human_name}"`, or `"a human"` when no
    /// name is given. The human name used for the following turns defaults
    /// to `"HUMAN"`.
    pub fn start_conversation(&mut self, human_name: Option<&str>) {
        let restart = self.render_restart(human_name);
        self.apply_restart(restart);
    }

    /// Replaces the transcript verbatim, e.g. to restore a conversation
    /// from external storage. The activity flag is not changed.
    pub fn set_conversation<S: Into<String>>(&mut self, transcript: S) {
        self.conversation.replace_transcript(transcript.into());
    }

    /// Renders the prefix of a turn for `message`.
    ///
    /// The conversation is started first when it isn't active, or when
    /// `continue_conversation` is `false`. The prefix is not appended to
    /// the transcript.
    pub fn render_turn_prefix(
        &mut self,
        message: &str,
        human_name: Option<&str>,
        continue_conversation: bool,
    ) -> String {
        let turn =
            self.prepare_turn(message, human_name, continue_conversation);
        if let Some(restart) = turn.restart {
            self.apply_restart(restart);
        }
        turn.prefix
    }

    /// Appends a turn with `message` and an optional `reply` to the
    /// transcript, and records them in the message and reply logs.
    pub fn update_conversation(&mut self, message: &str, reply: Option<&str>) {
        let turn = self.prepare_turn(message, None, true);
        self.commit_turn(turn, message, reply);
    }

    /// Records a human message without asking for a reply.
    #[inline]
    pub fn send_message(&mut self, message: &str) {
        self.update_conversation(message, None);
    }

    /// Asks the provider for the persona's reply and records the turn.
    ///
    /// With a `message`, the prompt is the transcript followed by the turn
    /// prefix of that message. Without one, the provider is queried on the
    /// current transcript and an empty message is recorded.
    ///
    /// Generation stops before a line labeled with the human's or the
    /// persona's name. The returned reply is trimmed, and is exactly what
    /// gets appended to the transcript. On error nothing is recorded.
    pub async fn request_reply(
        &mut self,
        message: Option<&str>,
        max_output_length: Option<u64>,
    ) -> Result<String, Error> {
        let message = message.unwrap_or_default();
        let turn = self.prepare_turn(message, None, true);
        let base = match &turn.restart {
            Some(restart) => restart.transcript.as_str(),
            None => self.transcript(),
        };
        let prompt = if message.is_empty() {
            base.to_owned()
        } else {
            format!("{base}{}", turn.prefix)
        };
        let stop = stop_sequences(&turn.human_name, &self.name());

        let completion = self
            .complete(prompt, stop, max_output_length_params(max_output_length))
            .await?;
        let text = completion.first_text().ok_or(Error::NoCandidates)?;
        let reply = clean_reply(text).to_owned();
        debug!("got reply of {} bytes", reply.len());

        self.commit_turn(turn, message, Some(&reply));
        Ok(reply)
    }

    /// Asks the provider for a reply to `message` alone, ignoring the
    /// conversation history.
    ///
    /// The prompt is only the turn prefix of `message`. The conversation of
    /// this agent is not touched, and the raw reply text is returned as is.
    pub async fn request_single_reply(
        &self,
        message: &str,
        max_output_length: Option<u64>,
        human_name: Option<&str>,
    ) -> Result<String, Error> {
        let name = self.name();
        let label = given_name(human_name).unwrap_or(self.human_name());
        let prefix = self.message_template.render(label, &name, message.trim());
        let stop = stop_sequences(label, &name);

        let overrides = max_output_length_params(max_output_length);
        let completion = self.complete(prefix, stop, overrides).await?;
        completion
            .first_text()
            .map(ToOwned::to_owned)
            .ok_or(Error::NoCandidates)
    }

    /// Sends `prompt` to the provider with this agent's parameters, merged
    /// with `overrides`, and returns every candidate.
    pub async fn complete<S: Into<String>>(
        &self,
        prompt: S,
        stop: Vec<String>,
        overrides: GenerationParams,
    ) -> Result<Completion, Error> {
        let mut params = self.params.clone();
        params.merge(&overrides);
        let req = CompletionRequest {
            prompt: prompt.into(),
            params,
            stop,
        };
        self.client.send_request(req).await
    }

    /// Lists the models the provider currently exposes.
    #[inline]
    pub async fn list_available_models(&self) -> Result<Vec<String>, Error> {
        self.client.list_models().await
    }
}

impl Agent {
    /// Sets a generation parameter. The last write wins.
    ///
    /// Selecting a model that is not available is rejected, and leaves the
    /// parameters unchanged.
    pub fn set_param<K: Into<String>, V: Into<Value>>(
        &mut self,
        key: K,
        value: V,
    ) -> Result<(), Error> {
        let key = key.into();
        let value = value.into();
        if key == GenerationParams::MODEL {
            let model = value.as_str().ok_or(ConfigurationError::MissingModel)?;
            self.check_model(model)?;
        }
        self.params.set(key, value);
        Ok(())
    }

    /// Sets several generation parameters. Nothing is changed if the
    /// model selection among them is rejected.
    pub fn set_params(
        &mut self,
        params: &GenerationParams,
    ) -> Result<(), Error> {
        if let Some(value) = params.get(GenerationParams::MODEL) {
            let model =
                value.as_str().ok_or(ConfigurationError::MissingModel)?;
            self.check_model(model)?;
        }
        self.params.merge(params);
        Ok(())
    }

    /// Returns a copy of this agent with `params` applied.
    ///
    /// The copy has its own templates, parameters and conversation state,
    /// and shares the provider with this agent.
    pub fn with_params(
        &self,
        params: &GenerationParams,
    ) -> Result<Agent, Error> {
        let mut agent = self.clone();
        agent.set_params(params)?;
        Ok(agent)
    }

    fn check_model(&self, model: &str) -> Result<(), ConfigurationError> {
        check_model(model, &self.available_models)
    }

    fn render_restart(&self, human_name: Option<&str>) -> Restart {
        let human_name = given_name(human_name);
        let transcript = self
            .start_template
            .render(&self.name(), &describe_human(human_name));
        Restart {
            transcript,
            human_name: human_name.map(ToOwned::to_owned),
        }
    }

    fn apply_restart(&mut self, restart: Restart) {
        debug!(
            "starting a conversation with {}",
            restart.human_name.as_deref().unwrap_or(DEFAULT_HUMAN_NAME)
        );
        self.conversation
            .restart(restart.transcript, restart.human_name);
    }

    fn prepare_turn(
        &self,
        message: &str,
        human_name: Option<&str>,
        continue_conversation: bool,
    ) -> PreparedTurn {
        let human_name = given_name(human_name);
        let restart = if !self.is_active() || !continue_conversation {
            Some(self.render_restart(human_name))
        } else {
            None
        };
        let human_name = match (human_name, &restart) {
            (Some(name), _) => name.to_owned(),
            (None, Some(restart)) => restart
                .human_name
                .clone()
                .unwrap_or_else(|| DEFAULT_HUMAN_NAME.to_owned()),
            (None, None) => self.human_name().to_owned(),
        };
        let prefix =
            self.message_template
                .render(&human_name, &self.name(), message.trim());
        PreparedTurn {
            restart,
            human_name,
            prefix,
        }
    }

    fn commit_turn(
        &mut self,
        turn: PreparedTurn,
        message: &str,
        reply: Option<&str>,
    ) {
        if let Some(restart) = turn.restart {
            self.apply_restart(restart);
        }
        self.conversation.append_turn(&turn.prefix, message, reply);
    }
}

impl Debug for Agent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .field("params", &self.params)
            .field("available_models", &self.available_models)
            .field("conversation", &self.conversation)
            .finish_non_exhaustive()
    }
}

fn check_model(
    model: &str,
    available: &[String],
) -> Result<(), ConfigurationError> {
    if available.iter().any(|m| m == model) {
        return Ok(());
    }
    Err(ConfigurationError::UnavailableModel {
        model: model.to_owned(),
        available: available.to_vec(),
    })
}

/// An empty name counts as no name.
#[inline]
fn given_name(human_name: Option<&str>) -> Option<&str> {
    human_name.filter(|name| !name.is_empty())
}

fn describe_human(human_name: Option<&str>) -> String {
    match human_name {
        Some(name) => format!("a person named {name}"),
        None => "a human".to_owned(),
    }
}

/// Generation must halt before a line labeled with either speaker, so that
/// the model doesn't write the next line of the other speaker.
fn stop_sequences(human_name: &str, agent_name: &str) -> Vec<String> {
    vec![format!("{human_name}:"), format!("{agent_name}:")]
}

fn max_output_length_params(
    max_output_length: Option<u64>,
) -> GenerationParams {
    match max_output_length {
        Some(max_tokens) => GenerationParams::new().with_max_tokens(max_tokens),
        None => GenerationParams::new(),
    }
}

/// Trims the whitespace around a reply, trailing line feeds included.
#[inline]
fn clean_reply(text: &str) -> &str {
    text.trim()
}
