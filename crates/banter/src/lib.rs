//! Banter backend library.
//!
//! A small self-hosted chat server that relays user messages to an LLM
//! backend and keeps per-session conversation history as JSON documents
//! on disk.

pub mod api;
pub mod backend;
pub mod naming;
pub mod relay;
pub mod session;
pub mod settings;
