use std::env;
use std::time::Duration;

use palaver_core::AgentBuilder;
use palaver_model::CompletionProvider;
use palaver_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

/// Errors from reading [`Settings`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable holds a value that can't be parsed.
    #[error("{name} has an invalid value: {value:?}")]
    Invalid {
        /// Name of the variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Settings of a chat session, usually read from the environment.
///
/// | variable | meaning |
/// |---|---|
/// | `OPENAI_API_KEY` | API credential (required) |
/// | `OPENAI_BASE_URL` | base URL of an OpenAI-compatible API |
/// | `OPENAI_MODEL` | model to chat with |
/// | `AVAILABLE_ENGINES` | comma-separated models, skips asking the provider |
/// | `PALAVER_AGENT_NAME` | display name of the AI persona |
/// | `PALAVER_HUMAN_NAME` | display name of the human |
/// | `PALAVER_TIMEOUT_SECS` | timeout of each provider request |
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    /// API credential.
    pub api_key: String,
    /// Custom base URL.
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// Override of the available models.
    pub available_models: Option<Vec<String>>,
    /// Display name of the AI persona.
    pub agent_name: Option<String>,
    /// Display name of the human.
    pub human_name: Option<String>,
    /// Timeout of each provider request.
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Reads the settings from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings from a variable lookup function. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY")
            .ok_or(SettingsError::Missing("OPENAI_API_KEY"))?;
        let available_models = get("AVAILABLE_ENGINES").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        });
        let timeout = match get("PALAVER_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(SettingsError::Invalid {
                        name: "PALAVER_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            None => None,
        };

        Ok(Self {
            api_key,
            base_url: get("OPENAI_BASE_URL"),
            model: get("OPENAI_MODEL"),
            available_models,
            agent_name: get("PALAVER_AGENT_NAME"),
            human_name: get("PALAVER_HUMAN_NAME"),
            timeout,
        })
    }

    /// Makes the provider configuration.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        builder.build()
    }

    /// Makes an agent builder for `provider` with these settings applied.
    pub fn agent_builder<P: CompletionProvider + 'static>(
        &self,
        provider: P,
    ) -> AgentBuilder {
        let mut builder = AgentBuilder::with_provider(provider);
        if let Some(name) = &self.agent_name {
            builder = builder.with_name(name);
        }
        if let Some(model) = &self.model {
            builder = builder.with_param("model", model.as_str());
        }
        if let Some(models) = &self.available_models {
            builder = builder.with_available_models(models);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("OPENAI_MODEL", "davinci"),
            ("AVAILABLE_ENGINES", "davinci, curie,,"),
            ("PALAVER_HUMAN_NAME", "Sam"),
            ("PALAVER_AGENT_NAME", " "),
            ("PALAVER_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(settings.api_key, "sk-1");
        assert_eq!(settings.model.as_deref(), Some("davinci"));
        assert_eq!(
            settings.available_models,
            Some(vec!["davinci".to_owned(), "curie".to_owned()])
        );
        assert_eq!(settings.human_name.as_deref(), Some("Sam"));
        assert_eq!(settings.agent_name, None);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.openai_config().model(), "davinci");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            Settings::from_lookup(lookup(&[])),
            Err(SettingsError::Missing("OPENAI_API_KEY"))
        );
        assert_eq!(
            Settings::from_lookup(lookup(&[
                ("OPENAI_API_KEY", "sk-1"),
                ("PALAVER_TIMEOUT_SECS", "soon"),
            ])),
            Err(SettingsError::Invalid {
                name: "PALAVER_TIMEOUT_SECS",
                value: "soon".to_owned(),
            })
        );
    }
}
