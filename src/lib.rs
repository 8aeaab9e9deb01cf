//! # codechat
//!
//! Chat with a codebase. Upload files or point the server at a git
//! repository; the sources are split into chunks and stored in a hosted
//! vector index that embeds them server-side. Each question is classified,
//! turned into a retrieval plan, answered from the best-ranked chunks that
//! fit a token budget, and sent to an LLM.
//!
//! ## Request flow
//!
//! ```text
//!   upload / git clone
//!          │
//!          ▼
//!   FileFilter ──▶ RecursiveSplitter ──▶ VectorIndex::upsert      (ingest)
//!
//!   question
//!          │
//!          ▼
//!   classify ──▶ plan (base_k, rerank) ──▶ VectorIndex::search
//!                                               │ ranked hits
//!                                               ▼
//!                                   assemble under token budget
//!                                               │
//!                                               ▼
//!                                   chat prompt ──▶ LlmClient
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, index, LLM and chunking
//! - [`models`] - Request/response and chunk types shared across modules
//! - [`retrieval`] - Query classification, retrieval planning and context assembly
//! - [`index`] - `VectorIndex` seam and the hosted records-API implementation
//! - [`ingest`] - File filtering, recursive splitting, git clone and upsert pipeline
//! - [`llm`] - `LlmClient` seam, chat completion client and prompt text
//! - [`session`] - The single live session and its lifecycle
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod config;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod session;
pub mod state;
