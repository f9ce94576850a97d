//! Configuration, prompt templates, the RAG chain and the wiring that builds
//! them from a [`config::Config`].

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod prompt;
pub mod secret;

pub use chain::{Answer, ChainError, RagChain, ask_bare};
pub use config::Config;
pub use prompt::{PromptError, PromptSource, PromptTemplate};
pub use secret::Secret;
