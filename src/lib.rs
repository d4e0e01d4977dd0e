//! ichat is a terminal client for OpenAI-compatible chat-completions APIs
//! with persistent, pinnable chat sessions.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire payloads and the [`api::ChatApiClient`] that
//!   sends them, including incremental decoding of streamed replies.
//! - [`core`] owns persistence (key-value storage, configuration, sessions)
//!   and the cross-cutting helpers the client leans on: retries, the
//!   shared-result throttle, error classification and the route guard.
//! - [`cli`] parses arguments and drives the terminal commands.
//! - [`logging`] installs the `tracing` subscriber for the binary.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
