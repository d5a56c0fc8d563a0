//! Mapped-module bookkeeping for a user-mode binary emulator.
//!
//! This module tracks which executable images are mapped into the emulated process and
//! where. It is the part of the emulator state that the snapshot codec in
//! [`crate::serialization`] has to carry besides raw memory and registers.
//!
//! # Architecture
//!
//! - Module records and their deduplicating table
//! - A concrete PE mapper together with the address-space reservations it makes
//! - The logging collaborator the table reports through
//!
//! # Key Components
//!
//! ## Module Table
//! - [`crate::emulation::ModuleManager`] - Table of mapped images keyed by base address
//! - [`crate::emulation::MappedModule`] - Record of a single mapped image
//! - [`crate::emulation::ExportedSymbol`] - Entry of an image's export directory
//! - [`crate::emulation::ModuleMapper`] - Loading collaborator of the table
//!
//! ## Loading
//! - [`crate::emulation::PeMapper`] - PE implementation of [`ModuleMapper`]
//! - [`crate::emulation::PeMapperConfig`] - Base selection and protection options
//!
//! ## Memory
//! - [`crate::emulation::AddressSpace`] - Non-overlapping range reservations
//! - [`crate::emulation::MemoryRegion`] - A single reservation
//! - [`crate::emulation::MemoryProtection`] - Access rights of a reservation
//!
//! ## Logging
//! - [`crate::emulation::Logger`] - Sink for user-visible messages
//! - [`crate::emulation::LogLogger`] - Adapter to the `log` facade
//!
//! # Usage Examples
//!
//! ## Checkpointing the Module Table
//!
//! ```rust,no_run
//! use emustate::emulation::{LogLogger, ModuleManager, PeMapper};
//! use emustate::{BufferDeserializer, BufferSerializer};
//! use std::path::Path;
//!
//! let mut manager = ModuleManager::new(PeMapper::new());
//! manager.map(Path::new(r"\??\C:\Windows\System32\ntdll.dll"), &LogLogger)?;
//!
//! let mut serializer = BufferSerializer::new();
//! manager.serialize(&mut serializer);
//! serializer.write(manager.mapper().address_space());
//! let snapshot = serializer.take_buffer();
//!
//! let mut restored = ModuleManager::new(PeMapper::new());
//! let mut deserializer = BufferDeserializer::new(&snapshot);
//! restored.deserialize(&mut deserializer)?;
//! *restored.mapper_mut().address_space_mut() = deserializer.read()?;
//! # Ok::<(), emustate::Error>(())
//! ```

mod loader;
mod logger;
mod memory;
mod module;

pub use loader::{PeMapper, PeMapperConfig};
pub use logger::{LogLogger, Logger};
pub use memory::{AddressSpace, MemoryProtection, MemoryRegion};
pub use module::{
    canonicalize_module_path, ExportedSymbol, MappedModule, ModuleManager, ModuleMapper,
};
