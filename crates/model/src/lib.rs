//! An abstraction layer for hosted text-completion services.
//!
//! This crate establishes a unified protocol for the conversation engine
//! to talk to completion providers, so that the engine can switch between
//! them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod params;
mod provider;
mod request;
mod response;

pub use error::*;
pub use params::*;
pub use provider::*;
pub use request::*;
pub use response::*;
