//! Core of the project context store.
//! Layered JSON documents with a uid index and relationship traversal.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{open_store, ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{IndexEntry, ReviewStatus};
pub use model::layer::{is_valid_layer_name, LayerKind};
pub use model::relation::merge_related;
pub use model::uid::{make_uid, UidKind};
pub use repo::document_store::{DocumentStore, SqliteDocumentStore, StoreError, StoreResult};
pub use search::names::{resolve_names, NameHit, NameQuery};
pub use service::architecture_service::ArchitectureService;
pub use service::context_service::{BatchBundle, ContextService, TraversalBundle};
pub use service::implementation_service::ImplementationService;
pub use service::requirement_service::{
    AppliedChanges, RequirementResult, RequirementService, RequirementServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
