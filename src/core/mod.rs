pub mod catalog;
pub mod chat_stream;
pub mod config;
pub mod error;
pub mod events;
pub mod line_stream;
pub mod message;
pub mod transport;
