//! The conversation engine: transcript bookkeeping, prompt templating and
//! turn handling on top of a completion provider.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
mod completion_client;
pub mod conversation;
mod error;
pub mod template;

pub use agent::{Agent, AgentBuilder, DEFAULT_MODEL, default_params};
pub use completion_client::{Candidate, Completion};
pub use error::{ConfigurationError, Error};
pub use palaver_model::{ErrorKind, GenerationParams};
