use palaver_model::{CompletionProvider, GenerationParams};
use serde_json::Value;

use super::{Agent, check_model};
use crate::completion_client::CompletionClient;
use crate::conversation::Conversation;
use crate::error::{ConfigurationError, Error};
use crate::template::{MessageTemplate, StartTemplate};

/// The model selected when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";

/// [`Agent`] builder.
pub struct AgentBuilder {
    client: CompletionClient,
    name: Option<String>,
    start_template: Option<String>,
    message_template: Option<String>,
    params: GenerationParams,
    available_models: Option<Vec<String>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified completion provider.
    #[inline]
    pub fn with_provider<P: CompletionProvider + 'static>(provider: P) -> Self {
        Self {
            client: CompletionClient::new(provider),
            name: None,
            start_template: None,
            message_template: None,
            params: default_params(),
            available_models: None,
        }
    }

    /// Sets the persona's display name. Defaults to the upper-cased model
    /// identifier.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the start template.
    ///
    /// See [`StartTemplate`] for the available placeholders.
    #[inline]
    pub fn with_start_template<S: Into<String>>(mut self, source: S) -> Self {
        self.start_template = Some(source.into());
        self
    }

    /// Sets the message template.
    ///
    /// See [`MessageTemplate`] for the available placeholders.
    #[inline]
    pub fn with_message_template<S: Into<String>>(
        mut self,
        source: S,
    ) -> Self {
        self.message_template = Some(source.into());
        self
    }

    /// Sets generation parameters, on top of the defaults.
    #[inline]
    pub fn with_params(mut self, params: &GenerationParams) -> Self {
        self.params.merge(params);
        self
    }

    /// Sets one generation parameter.
    #[inline]
    pub fn with_param<K: Into<String>, V: Into<Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.params.set(key, value);
        self
    }

    /// Overrides the set of available models. By default the set is
    /// obtained from the provider when building.
    #[inline]
    pub fn with_available_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_models =
            Some(models.into_iter().map(Into::into).collect());
        self
    }

    /// Builds the agent.
    ///
    /// Fails with [`Error::Configuration`] if a template is invalid or the
    /// selected model is not available, and with [`Error::Provider`] if the
    /// available models can't be listed.
    pub async fn build(self) -> Result<Agent, Error> {
        let start_template = match &self.start_template {
            Some(source) => StartTemplate::parse(source).map_err(|source| {
                ConfigurationError::Template {
                    which: "start",
                    source,
                }
            })?,
            None => StartTemplate::default(),
        };
        let message_template = match &self.message_template {
            Some(source) => {
                MessageTemplate::parse(source).map_err(|source| {
                    ConfigurationError::Template {
                        which: "message",
                        source,
                    }
                })?
            }
            None => MessageTemplate::default(),
        };

        let model = self
            .params
            .model()
            .ok_or(ConfigurationError::MissingModel)?
            .to_owned();
        let available_models = match self.available_models {
            Some(models) => models,
            None => {
                debug!("obtaining list of models");
                self.client.list_models().await?
            }
        };
        check_model(&model, &available_models)?;

        info!("agent built with model {model}");
        Ok(Agent {
            client: self.client,
            name: self.name,
            start_template,
            message_template,
            params: self.params,
            available_models,
            conversation: Conversation::default(),
        })
    }
}

/// Returns the default generation parameters.
pub fn default_params() -> GenerationParams {
    GenerationParams::new()
        .with_model(DEFAULT_MODEL)
        .with_temperature(0.8)
        .with_top_p(1.0)
        .with_frequency_penalty(0.3)
        .with_presence_penalty(0.1)
        .with_max_tokens(150)
        .with_n(1)
}
