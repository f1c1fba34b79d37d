//! holiday-core: widget registrar for the holiday calendar plugin.
//!
//! The registrar copies the widget's static assets, registers the widget and
//! its page-layout placement inside a single store transaction, and removes
//! both again on disable. Every host collaborator (persisted state, files,
//! presentation cache, schema migrations) is a port passed in by the caller.

pub mod cache;
pub mod error;
pub mod fs;
pub mod lifecycle;
pub mod memory;
pub mod migrate;
pub mod model;
pub mod registrar;
pub mod store;

pub use cache::{CacheInvalidator, CacheScope, DirCacheInvalidator, NoopCache};
pub use error::{CacheError, FsError, RegistrarError, StoreError};
pub use fs::{AssetFs, LocalFs};
pub use lifecycle::{LifecyclePaths, PluginLifecycle};
pub use memory::{MemoryMigrator, MemoryStore};
pub use migrate::SchemaMigrator;
pub use model::{NewPlacement, Placement, Widget, WidgetDefinition, WidgetUpsert};
pub use registrar::Registrar;
pub use store::{RegistryStore, RegistryTx};
