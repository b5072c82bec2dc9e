//! # docqa
//!
//! A question-answering assistant over a directory of JSON documents.
//!
//! Every element of every top-level JSON array in the data directory becomes
//! a document. Documents are split into overlapping token chunks, embedded
//! through an external embedding service and kept in an in-memory vector
//! index. A question is embedded the same way, the nearest chunks are
//! spliced into a prompt template, and a generative model writes the answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker  │──▶│ Embedding │──▶│ Vector Index │
//! │  (JSON)  │   │ (tokens) │   │  service  │   │  (+snapshot) │
//! └──────────┘   └──────────┘   └───────────┘   └──────┬───────┘
//!                                                      │ top-k
//!                     ┌──────────┐   ┌───────────┐     │
//!   question ────────▶│  Prompt  │◀──┤ Retriever │◀────┘
//!                     └────┬─────┘   └───────────┘
//!                          ▼
//!                    ┌───────────┐
//!                    │ Generator │──▶ answer
//!                    └───────────┘
//! ```
//!
//! The pure pieces (chunking, index, prompt, provider traits) live in the
//! `docqa-core` crate; this crate adds configuration, the JSON loader, HTTP
//! provider clients, snapshots, the [`chatbot::Chatbot`] façade, an HTTP
//! server and the `docqa` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! docqa --config ./docqa.toml index --dry-run   # load + chunk only
//! docqa --config ./docqa.toml ask "What is a B-tree?" --sources
//! docqa --config ./docqa.toml serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | JSON directory loader |
//! | [`embedding`] | OpenAI / Gemini / Ollama embedding clients |
//! | [`generation`] | OpenAI / Gemini / Ollama answer generators |
//! | [`http`] | Shared HTTP client with retry and backoff |
//! | [`snapshot`] | On-disk index snapshots |
//! | [`chatbot`] | Build/query façade and lifecycle |
//! | [`provenance`] | Book ID extraction from answers |
//! | [`server`] | JSON HTTP API |
//! | [`error`] | Load, build and query errors |

pub mod chatbot;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod http;
pub mod loader;
pub mod provenance;
pub mod server;
pub mod snapshot;

pub use chatbot::{Answer, BuildReport, Chatbot, ChatbotSettings, PhaseName};
pub use docqa_core;
