//! Chat with a completion model in the terminal.

#[macro_use]
extern crate tracing;

use std::future::Future;
use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use palaver::{Command, CommandError, Output, Session, Settings};
use palaver_openai_model::OpenAIProvider;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let provider = match OpenAIProvider::new(settings.openai_config()) {
        Ok(provider) => provider,
        Err(err) => {
            eprintln!("cannot create the provider: {err}");
            return ExitCode::FAILURE;
        }
    };

    let builder = settings.agent_builder(provider);
    let agent = match with_spinner("Connecting...", builder.build()).await {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("{}", err.red());
            return ExitCode::FAILURE;
        }
    };
    info!("chatting with {} ({})", agent.name(), agent.model());
    let mut session = Session::new(agent, settings.human_name.clone());
    println!(
        "{}Chatting with {}. Type /help for commands.",
        BAR_CHAR.bright_black(),
        session.agent().name().bold()
    );

    let mut stdin = io::BufReader::new(io::stdin());
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(err) => {
                println!("{}{}", BAR_CHAR.bright_yellow(), err);
                continue;
            }
        };

        let output = if waits_for_provider(&command) {
            with_spinner("🤔 Thinking...", session.execute(command)).await
        } else {
            session.execute(command).await
        };

        match output {
            Ok(Output::Reply(reply)) => {
                let name = session.agent().name();
                println!(
                    "{}{} {}",
                    BAR_CHAR.bright_cyan(),
                    name.bright_cyan().bold(),
                    reply.bright_white()
                );
            }
            Ok(Output::Info(text)) => {
                for line in text.lines() {
                    println!("{}{}", BAR_CHAR.bright_black(), line);
                }
            }
            Ok(Output::Nothing) => {}
            Ok(Output::Quit) => break,
            Err(err) => {
                println!("{}{}", BAR_CHAR.bright_red(), err.red());
            }
        }
    }

    ExitCode::SUCCESS
}

#[inline]
fn waits_for_provider(command: &Command) -> bool {
    matches!(
        command,
        Command::Say(_)
            | Command::Retry
            | Command::Once(_)
            | Command::Models
    )
}

async fn with_spinner<F>(message: &'static str, fut: F) -> F::Output
where
    F: Future,
{
    let progress_bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message(message);
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let output = fut.await;
    // Finish the progress bar before printing anything else.
    progress_bar.finish_and_clear();
    output
}

async fn read_line<R>(reader: &mut R) -> Option<String>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
