//! Outbound collaborators

pub mod chat_narrator;

pub use chat_narrator::{resolve_narrator, ChatNarrator, Provider};
