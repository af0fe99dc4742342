//! Local implementations of the paperdrop collaborator traits.
//!
//! Everything here runs in-process: `reqwest` for downloads and the
//! OpenAI-compatible chat endpoint, `pdf-extract`/`html2text` for content
//! normalization, and the prompt templates driving the summarization
//! pipeline and thread responder.

pub mod arxiv;
pub mod chat;
pub mod codec;
pub mod download;
pub mod extract;
pub mod handler;
pub mod pipeline;
pub mod templates;
pub mod thread;

pub use paperdrop_core::{Error, Result};
