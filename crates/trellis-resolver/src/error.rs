//! Resolution failure taxonomy.

use miette::Diagnostic;
use thiserror::Error;
use trellis_core::module::{ModuleId, ModuleRevisionId};

/// Failure reported by a [`MetadataResolver`](crate::traits::MetadataResolver).
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Module {module} not found")]
    NotFound { module: ModuleRevisionId },

    #[error("Invalid metadata for {module}: {message}")]
    Invalid {
        module: ModuleRevisionId,
        message: String,
    },
}

/// Errors raised while resolving a configuration.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ResolveError {
    /// One dependency could not be turned into module metadata. Recorded per
    /// edge; never aborts the traversal.
    #[error("{cause}. It is required by:{}", format_trail(.required_by))]
    #[diagnostic(code(trellis::unresolvable))]
    Unresolvable {
        requested: ModuleRevisionId,
        required_by: Vec<ModuleRevisionId>,
        cause: MetadataError,
    },

    #[error("Configuration '{configuration}' not found in {module}")]
    #[diagnostic(code(trellis::configuration_not_found))]
    ConfigurationNotFound {
        module: ModuleRevisionId,
        configuration: String,
    },

    /// A configuration transitively extends itself.
    #[error("Configuration cycle in {module}: {}", .chain.join(" -> "))]
    #[diagnostic(
        code(trellis::configuration_cycle),
        help("Remove one of the `extends` entries so the hierarchy becomes acyclic")
    )]
    ConfigurationCycle {
        module: ModuleRevisionId,
        chain: Vec<String>,
    },

    /// A module was still undecided when the graph was assembled. Indicates a
    /// bug in the resolution loop, never bad input.
    #[error("Unexpected conflict state for {module} at end of resolution")]
    #[diagnostic(code(trellis::internal))]
    UnsettledConflict { module: ModuleId },

    /// Aggregate of every unresolved dependency of a configuration.
    #[error("Could not resolve all dependencies for configuration '{configuration}'")]
    #[diagnostic(code(trellis::unresolved))]
    Unresolved {
        configuration: String,
        #[related]
        failures: Vec<ResolveError>,
    },
}

impl ResolveError {
    /// Module coordinate the failure is about, if it concerns a single module.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Self::Unresolvable { requested, .. } => Some(&requested.module),
            Self::ConfigurationNotFound { module, .. }
            | Self::ConfigurationCycle { module, .. } => Some(&module.module),
            Self::UnsettledConflict { module } => Some(module),
            Self::Unresolved { .. } => None,
        }
    }
}

fn format_trail(trail: &[ModuleRevisionId]) -> String {
    trail.iter().map(|m| format!("\n    {m}")).collect()
}
