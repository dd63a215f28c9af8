//! Core use-case services.
//!
//! # Responsibility
//! - Expose the two maintenance operations behind one facade.
//! - Keep CLI/FFI layers decoupled from the dedup pipeline internals.

pub mod collection_service;
