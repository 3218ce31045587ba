//! Core data types for the Trellis dependency resolver.
//!
//! This crate defines what a resolution request is made of: module
//! coordinates and revisions, module descriptors with their configurations
//! and artifacts, dependency declarations with configuration mappings and
//! exclusion rules, and the resolver's own configuration file.
//!
//! This crate is intentionally free of resolution logic and I/O beyond
//! reading TOML files.

pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod module;

pub use dependency::{ConfigurationMapping, DependencyDescriptor, ExcludeRule};
pub use descriptor::{ArtifactDescriptor, ConfigurationDescriptor, ModuleDescriptor, Visibility};
pub use module::{ModuleId, ModuleRevisionId};
