//! Image loading for the module manager.
//!
//! This module provides the concrete [`ModuleMapper`](crate::emulation::ModuleMapper)
//! for Portable Executable files. It serves as the bridge between on-disk images and the
//! [`MappedModule`](crate::emulation::MappedModule) records kept by the
//! [`ModuleManager`](crate::emulation::ModuleManager).
//!
//! # Architecture
//!
//! ```text
//! +---------------+     +----------------+     +------------------+
//! | PE File       | --> | PeMapper       | --> | AddressSpace     |
//! +---------------+     +----------------+     +------------------+
//!                               |
//!                               v
//!                       +----------------+     +------------------+
//!                       | MappedModule   | --> | ModuleManager    |
//!                       +----------------+     +------------------+
//! ```
//!
//! # Components
//!
//! - [`PeMapper`] - Parses PE files and reserves their image range
//! - [`PeMapperConfig`] - Base selection and protection options

mod peloader;

pub use peloader::{PeMapper, PeMapperConfig};
