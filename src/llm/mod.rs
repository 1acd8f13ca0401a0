//! Chat-completions plumbing shared by the router, loop, and responder.
//!
//! The module contains the provider dispatch, the HTTP transport, typed
//! message and tool-schema wrappers, and the embeddings client used by the
//! document index.

/// Chat model trait and HTTP client.
pub mod chat;
/// Embedding model client.
pub mod embeddings;
/// Chat message wire types.
pub mod messages;
/// Provider endpoints, options, and errors.
pub mod provider;
pub(crate) mod transport;
/// Tool schema and tool-call payload types.
pub mod tools;
