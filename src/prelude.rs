//! # emustate Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the emustate library. Import this module to get quick access to the essential
//! types for snapshotting emulator state.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all emustate operations
pub use crate::Error;

/// The result type used throughout emustate
pub use crate::Result;

// ================================================================================================
// Binary Codec
// ================================================================================================

/// Snapshot writer and reader
pub use crate::{BufferDeserializer, BufferSerializer};

/// Encoding strategy traits
pub use crate::{RawValue, Serializable};

/// Strategy binding macros
pub use crate::{impl_raw_serializable, impl_serializable_with};

// ================================================================================================
// Module Bookkeeping
// ================================================================================================

/// Module table and its records
pub use crate::emulation::{ExportedSymbol, MappedModule, ModuleManager, ModuleMapper};

/// PE mapping
pub use crate::emulation::{PeMapper, PeMapperConfig};

/// Address space reservations
pub use crate::emulation::{AddressSpace, MemoryProtection, MemoryRegion};

/// Logging collaborator
pub use crate::emulation::{LogLogger, Logger};

// ================================================================================================
// Analysis
// ================================================================================================

/// Object watching
pub use crate::analysis::{ObjectWatcher, TypeLayout, WatchConfig};
