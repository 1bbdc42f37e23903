//! Shared domain types for the Aventura turn orchestration core.
//!
//! Everything that crosses a crate boundary lives here: the error type,
//! provider message vocabulary, streaming events, the story/world model,
//! the classification schema, and configuration.

pub mod classification;
pub mod config;
pub mod error;
pub mod message;
pub mod story;
pub mod stream;
pub mod suggestion;
pub mod world;

pub use error::{Error, Result};
