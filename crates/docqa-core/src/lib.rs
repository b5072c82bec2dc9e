//! # docqa Core
//!
//! Shared, I/O-free logic for docqa: data models, token-bounded chunking,
//! the exact vector index, prompt composition, and the traits that external
//! embedding and generation services are reached through.
//!
//! This crate contains no tokio, reqwest, or filesystem access. Concrete
//! providers, document loading, and orchestration live in the `docqa`
//! application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod prompt;
