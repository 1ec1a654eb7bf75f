//! Palaver is a terminal chat client for a local generative-model server.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the streaming session engine: connection settings, the HTTP
//!   transport, newline-delimited JSON decoding, conversation history, chat
//!   turns with cooperative cancellation, and catalog operations. It reports
//!   everything through an ordered [`core::events::EventSink`] and never prints.
//! - [`api`] defines the wire payloads and the stateless model inventory calls
//!   (list, pull, delete).
//! - [`cli`] is a line-oriented front end that drives the core and renders its
//!   events.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
