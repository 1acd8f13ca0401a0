//! finpilot: a chat assistant that routes questions to a tool-calling agent
//! loop, a document-retrieval responder, or plain chat, with per-session
//! conversation memory.

/// Bounded tool-calling loop.
pub mod agent;
/// Front door wiring router, loop, responder, and memory.
pub mod assistant;
/// CLI command implementations.
pub mod commands;
/// Profile configuration loading.
pub mod config;
/// Chat-completions plumbing and typed wrappers.
pub mod llm;
/// Tracing subscriber setup.
pub mod logging;
/// Session memory contract and in-process store.
pub mod memory;
/// Document retrieval pipeline.
pub mod rag;
/// Intent classification.
pub mod router;
/// Tool contract, registry, and builtin tools.
pub mod tools;
