//! Address space bookkeeping for mapped images.
//!
//! # Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AddressSpace`] | Sorted, non-overlapping table of reserved ranges |
//! | [`MemoryRegion`] | A single reserved range with its name and rights |
//! | [`MemoryProtection`] | Read/write/execute flags of a range |
//!
//! The address space is part of the emulator snapshot; it implements
//! [`crate::Serializable`] so it can be written next to the module table.

mod addressspace;
mod region;

pub use addressspace::AddressSpace;
pub use region::{MemoryProtection, MemoryRegion};
