//! Mapped module records and the table that owns them.
//!
//! - [`MappedModule`] / [`ExportedSymbol`] - What is known about a mapped image
//! - [`ModuleManager`] - Deduplicating table of mapped images, keyed by base address
//! - [`ModuleMapper`] - Collaborator that performs the actual loading

mod manager;
mod mapped;

pub use manager::{canonicalize_module_path, ModuleManager, ModuleMapper};
pub use mapped::{ExportedSymbol, MappedModule};
