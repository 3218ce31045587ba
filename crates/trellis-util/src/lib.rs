//! Shared utilities for the Trellis dependency resolver.
//!
//! This crate provides cross-cutting concerns used by the other Trellis crates:
//! error types, filesystem helpers, and the exclusive file lock that guards
//! shared on-disk caches.

pub mod errors;
pub mod fs;
pub mod lock;
