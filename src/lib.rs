//! Kurs - Question answering over course materials
//!
//! A local-first tool for indexing course outlines and lesson content, then
//! answering questions with a language model that searches the index through
//! tools and cites the lessons it used.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `models` - Course, lesson, and chunk types
//! - `embedding` - Embedding generation
//! - `vector_store` - Course catalog and content index
//! - `search` - Filtered semantic search over the index
//! - `tools` - Tools the model can call, and their registry
//! - `rag` - Tool-using reasoning loop
//! - `session` - Conversation history
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use kurs::config::Settings;
//! use kurs::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let (courses, chunks) = orchestrator
//!         .add_course_folder(std::path::Path::new("docs"), false)
//!         .await?;
//!     println!("Indexed {} courses ({} chunks)", courses, chunks);
//!
//!     let response = orchestrator.query("What does lesson 2 cover?", None).await?;
//!     println!("{}", response.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod search;
pub mod session;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{KursError, Result};
