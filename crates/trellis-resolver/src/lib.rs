//! Dependency resolution engine.
//!
//! Resolves one configuration of a root module into a conflict-free tree of
//! module configurations plus the flat set of artifacts they publish. The
//! traversal is breadth-first over dependency edges; when two revisions of a
//! module meet, edges reaching that module wait until the queue drains, the
//! conflict is settled once and for all, and affected edges are restarted
//! against the winner.
//!
//! ```no_run
//! use trellis_core::{DependencyDescriptor, ModuleDescriptor, ModuleRevisionId};
//! use trellis_resolver::{InMemoryRepository, NoArtifacts, Resolver};
//!
//! let repository = InMemoryRepository::new("memory")
//!     .with(ModuleDescriptor::new(ModuleRevisionId::new("org", "lib", "1.0")));
//! let app = ModuleDescriptor::new(ModuleRevisionId::new("org", "app", "1.0"))
//!     .with_dependency(DependencyDescriptor::new(ModuleRevisionId::new("org", "lib", "1.+")));
//!
//! let result = Resolver::new(&repository, &NoArtifacts).resolve(&app, "default")?;
//! println!("{}", result.tree().print_tree(None));
//! # Ok::<(), trellis_resolver::ResolveError>(())
//! ```

mod assemble;
pub mod cache;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod observer;
pub mod path;
pub mod registry;
pub mod repository;
pub mod result;
pub mod traits;
pub mod version;

pub use cache::{
    CachedRevision, CachingMetadataResolver, FileRevisionCache, InMemoryRevisionCache,
    RevisionCache,
};
pub use conflict::{ConflictReport, ConflictStrategy, LatestLexicographic, LatestRevision};
pub use engine::Resolver;
pub use error::{MetadataError, ResolveError};
pub use observer::{RecordingObserver, ResolutionEvent, ResolutionObserver, TracingObserver};
pub use repository::{FileSystemArtifactLocator, InMemoryRepository};
pub use result::{
    ArtifactId, DependencyTree, ResolvedArtifact, ResolvedConfiguration, ResolvedDependency,
    UnresolvedDependency,
};
pub use traits::{ArtifactLocator, MetadataResolver, NoArtifacts};
