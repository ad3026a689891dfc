//! A terminal chat that assembles the conversation engine with an
//! OpenAI-compatible completion provider.
//!
//! The crate includes a CLI tool for chatting in the terminal. And you can
//! also use it as a library to drive the same sessions from your own host
//! apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
mod settings;

pub use session::{Command, CommandError, Output, Session};
pub use settings::{Settings, SettingsError};

/// Re-exports of [`palaver_core`] crate.
pub mod core {
    pub use palaver_core::*;
}
