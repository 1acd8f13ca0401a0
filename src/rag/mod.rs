//! Document retrieval: the index contract and the grounded responder.

/// Document index contract and Chroma-backed implementation.
pub mod index;
/// Grounded question answering over retrieved fragments.
pub mod responder;
