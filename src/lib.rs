//! Copiloto - sales and biodiversity assistants over LLM APIs
//!
//! Two assistants share one completion layer:
//! - a sales assistant that answers questions about enterprise customers from an
//!   indexed table of rows, with a fixed reply when the rows do not cover the question
//! - a biodiversity assistant that classifies a photo before describing the organism
//!   in it, and answers nature questions with a short conversation window
//!
//! # Architecture
//!
//! - `config` - Settings and prompt texts
//! - `prompt` - Question-answering template rendering
//! - `completion` - Chat completion adapter and input normalization
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `rag` - Similarity index and the sales QA orchestrator
//! - `biodiversity` - Image identification and nature chat
//! - `history` - Conversation window selection
//! - `interactions` - Interaction log
//! - `orchestrator` - Service wiring and index building
//!
//! # Example
//!
//! ```rust,no_run
//! use copiloto::config::Settings;
//! use copiloto::orchestrator::Services;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let services = Services::new(settings)?;
//!
//!     let result = services.ask("¿Qué tipo de productos compra la empresa con id 3?").await?;
//!     println!("{}", result.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod biodiversity;
pub mod cli;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod history;
pub mod interactions;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod rag;
pub mod vector_store;

pub use error::{CopilotoError, Result};
