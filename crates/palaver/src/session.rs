use palaver_core::{Agent, Error};
use serde_json::Value;

/// A command entered in a chat session.
///
/// Lines starting with `/` are commands, anything else is a message to
/// the agent.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Sends a message and waits for the reply.
    Say(String),
    /// Records a message without asking for a reply.
    Quiet(String),
    /// Asks for another reply on the current transcript.
    Retry,
    /// Asks for a reply to a message alone, ignoring the history.
    Once(String),
    /// Starts a new conversation, optionally with another human name.
    Reset(Option<String>),
    /// Prints the transcript.
    Transcript,
    /// Prints the conversation state as JSON.
    Export,
    /// Lists the models of the provider.
    Models,
    /// Sets a generation parameter.
    Set(String, Value),
    /// Prints the help text.
    Help,
    /// Ends the session.
    Quit,
}

/// Errors from parsing a [`Command`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line is blank.
    #[error("nothing to send")]
    Empty,
    /// The command is not known.
    #[error("unknown command `/{0}`, try /help")]
    Unknown(String),
    /// The command needs an argument.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parses an input line.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_owned()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        let required = |usage| {
            if arg.is_empty() {
                Err(CommandError::Usage(usage))
            } else {
                Ok(arg.to_owned())
            }
        };

        match name {
            "quiet" => required("/quiet <message>").map(Command::Quiet),
            "retry" => Ok(Command::Retry),
            "once" => required("/once <message>").map(Command::Once),
            "reset" => Ok(Command::Reset(
                (!arg.is_empty()).then(|| arg.to_owned()),
            )),
            "transcript" => Ok(Command::Transcript),
            "export" => Ok(Command::Export),
            "models" => Ok(Command::Models),
            "set" => {
                let usage = "/set <param> <value>";
                let Some((key, value)) = arg.split_once(char::is_whitespace)
                else {
                    return Err(CommandError::Usage(usage));
                };
                let value = value.trim();
                // Bare words are taken as strings.
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_owned()));
                Ok(Command::Set(key.to_owned(), value))
            }
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(name.to_owned())),
        }
    }
}

/// What a command produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// A reply from the agent.
    Reply(String),
    /// Informational text.
    Info(String),
    /// Nothing to show.
    Nothing,
    /// The session should end.
    Quit,
}

const HELP: &str = "\
<message>              talk to the agent
/quiet <message>       record a message without a reply
/retry                 ask for another reply on the transcript
/once <message>        ask without the conversation history
/reset [name]          start over, optionally as someone else
/transcript            print the transcript
/export                print the conversation as JSON
/models                list the provider's models
/set <param> <value>   change a generation parameter
/quit                  leave";

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// The session holds a fully configured agent, and is basically a wrapper
/// around [`Agent`] that maps commands to its operations.
#[derive(Debug)]
pub struct Session {
    agent: Agent,
    human_name: Option<String>,
}

impl Session {
    /// Creates a session and starts the conversation.
    pub fn new(mut agent: Agent, human_name: Option<String>) -> Self {
        agent.start_conversation(human_name.as_deref());
        Self { agent, human_name }
    }

    /// Returns the agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Executes a command.
    pub async fn execute(&mut self, command: Command) -> Result<Output, Error> {
        debug!("executing {command:?}");
        let output = match command {
            Command::Say(message) => {
                let reply =
                    self.agent.request_reply(Some(&message), None).await?;
                Output::Reply(reply)
            }
            Command::Quiet(message) => {
                self.agent.send_message(&message);
                Output::Nothing
            }
            Command::Retry => {
                Output::Reply(self.agent.request_reply(None, None).await?)
            }
            Command::Once(message) => {
                let reply = self
                    .agent
                    .request_single_reply(
                        &message,
                        None,
                        self.human_name.as_deref(),
                    )
                    .await?;
                Output::Reply(reply.trim().to_owned())
            }
            Command::Reset(human_name) => {
                if human_name.is_some() {
                    self.human_name = human_name;
                }
                self.agent.start_conversation(self.human_name.as_deref());
                Output::Info("Started a new conversation.".to_owned())
            }
            Command::Transcript => {
                Output::Info(self.agent.transcript().to_owned())
            }
            Command::Export => {
                let conversation = self.agent.conversation();
                let json = serde_json::to_string_pretty(conversation)
                    .unwrap_or_else(|err| format!("cannot export: {err}"));
                Output::Info(json)
            }
            Command::Models => {
                let models = self.agent.list_available_models().await?;
                Output::Info(models.join("\n"))
            }
            Command::Set(key, value) => {
                self.agent.set_param(key.as_str(), value)?;
                Output::Info(format!("Set {key}."))
            }
            Command::Help => Output::Info(HELP.to_owned()),
            Command::Quit => Output::Quit,
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use palaver_core::AgentBuilder;
    use palaver_test_model::TestCompletionProvider;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("  hi  "), Ok(Command::Say("hi".to_owned())));
        assert_eq!(
            Command::parse("/quiet  see you"),
            Ok(Command::Quiet("see you".to_owned()))
        );
        assert_eq!(Command::parse("/reset"), Ok(Command::Reset(None)));
        assert_eq!(
            Command::parse("/reset Sam"),
            Ok(Command::Reset(Some("Sam".to_owned())))
        );
        assert_eq!(
            Command::parse("/set temperature 0.5"),
            Ok(Command::Set("temperature".to_owned(), json!(0.5)))
        );
        assert_eq!(
            Command::parse("/set model curie"),
            Ok(Command::Set("model".to_owned(), json!("curie")))
        );
        assert_eq!(Command::parse("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            Command::parse("/once"),
            Err(CommandError::Usage("/once <message>"))
        );
        assert_eq!(
            Command::parse("/set temperature"),
            Err(CommandError::Usage("/set <param> <value>"))
        );
        assert_eq!(
            Command::parse("/dance"),
            Err(CommandError::Unknown("dance".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_session() {
        let provider = TestCompletionProvider::with_models(["davinci"]);
        provider.add_reply("Hello Sam!\n");
        provider.add_reply(" Salut ");
        let agent = AgentBuilder::with_provider(provider.clone())
            .with_name("BOT")
            .with_param("model", "davinci")
            .build()
            .await
            .unwrap();
        let mut session = Session::new(agent, Some("Sam".to_owned()));

        let output = session.execute(Command::Say("Hi".to_owned())).await;
        assert_eq!(output.unwrap(), Output::Reply("Hello Sam!".to_owned()));

        let output = session.execute(Command::Quiet("brb".to_owned())).await;
        assert_eq!(output.unwrap(), Output::Nothing);
        assert!(session.agent().transcript().ends_with("Sam:brb\nBOT:\n"));

        let output = session.execute(Command::Once("Hi".to_owned())).await;
        assert_eq!(output.unwrap(), Output::Reply("Salut".to_owned()));
        assert_eq!(session.agent().len(), 2);

        let output = session
            .execute(Command::Set("model".to_owned(), json!("curie")))
            .await;
        assert!(output.is_err());

        let output = session.execute(Command::Reset(None)).await.unwrap();
        assert!(matches!(output, Output::Info(_)));
        assert_eq!(session.agent().human_name(), "Sam");
        assert_eq!(session.agent().len(), 0);

        let output = session.execute(Command::Models).await.unwrap();
        assert_eq!(output, Output::Info("davinci".to_owned()));
        assert_eq!(session.execute(Command::Quit).await.unwrap(), Output::Quit);
    }
}
