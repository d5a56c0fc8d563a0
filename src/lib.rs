// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'emulation/loader/peloader.rs' uses mmap to map an image file into memory

//! # emustate
//!
//! State persistence and module bookkeeping for user-mode binary emulators.
//!
//! `emustate` turns live emulator state into a byte-exact snapshot and back, and keeps
//! track of which executable images are mapped into the emulated process. The table of
//! mapped images is itself part of every snapshot.
//!
//! ## Features
//!
//! - **📦 Positional binary codec** - Flat little-endian encoding with no framing overhead
//! - **🧩 Compile-time strategy dispatch** - Every type is bound to exactly one encoding
//! - **🛡️ Debug canaries** - Writer/reader call-sequence mismatches fail at the first divergent field
//! - **🔍 Module table** - Deduplication of mapped images by canonical path
//! - **⚡ PE mapping** - Export directories and address reservations via `goblin`
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust
//! use emustate::prelude::*;
//!
//! let mut serializer = BufferSerializer::new();
//! serializer.write(&0x1400_0000_u64);
//! serializer.write_string("explorer.exe");
//! let snapshot = serializer.take_buffer();
//!
//! let mut deserializer = BufferDeserializer::new(&snapshot);
//! assert_eq!(deserializer.read::<u64>()?, 0x1400_0000);
//! assert_eq!(deserializer.read_string()?, "explorer.exe");
//! # Ok::<(), emustate::Error>(())
//! ```
//!
//! ### Binding Your Own Types
//!
//! ```rust
//! use emustate::{impl_raw_serializable, BufferDeserializer, BufferSerializer, RawValue};
//! use emustate::{Result, Serializable};
//!
//! // Intrinsic strategy
//! struct Thread {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Serializable for Thread {
//!     fn serialize(&self, buffer: &mut BufferSerializer) {
//!         buffer.write(&self.id);
//!         buffer.write_string(&self.name);
//!     }
//!
//!     fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
//!         Ok(Thread {
//!             id: buffer.read()?,
//!             name: buffer.read_string()?,
//!         })
//!     }
//! }
//!
//! // Raw strategy
//! #[derive(Clone, Copy)]
//! struct Tick(u64);
//!
//! impl RawValue for Tick {
//!     type Bytes = [u8; 8];
//!
//!     fn from_le_bytes(bytes: Self::Bytes) -> Self {
//!         Tick(u64::from_le_bytes(bytes))
//!     }
//!
//!     fn to_le_bytes(self) -> Self::Bytes {
//!         self.0.to_le_bytes()
//!     }
//! }
//!
//! impl_raw_serializable!(Tick);
//!
//! let mut serializer = BufferSerializer::new();
//! serializer.write(&vec![Thread { id: 4, name: "main".into() }]);
//! serializer.write(&Tick(1000));
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`serialization`] - The binary codec and its strategy traits
//! - [`emulation`] - Module table, PE mapper and address space reservations
//! - [`analysis`] - Object watching on top of the module table
//! - [`Error`] and [`Result`] - Crate-wide error handling
//!
//! ## Snapshot Compatibility
//!
//! Snapshots carry no version tag and no type information. A buffer can only be read
//! back by code issuing the same sequence of reads as the writes that produced it, and
//! debug and release builds produce different layouts.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use emustate::{BufferDeserializer, Error};
//!
//! let mut deserializer = BufferDeserializer::new(&[0x01]);
//! match deserializer.read::<u32>() {
//!     Err(Error::OutOfBounds) => println!("snapshot is truncated"),
//!     Err(Error::CorruptionDetected { offset, .. }) => println!("desync at {}", offset),
//!     Err(e) => println!("Other error: {}", e),
//!     Ok(value) => println!("{}", value),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run snapshot --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo test --release  # Exercises the canary-free layout
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use emustate::prelude::*;
///
/// let manager = ModuleManager::new(PeMapper::new());
/// assert!(manager.is_empty());
/// ```
pub mod prelude;

/// Binary codec for emulator snapshots.
pub mod serialization;

/// Module table, PE mapping and address space bookkeeping.
pub mod emulation;

/// Analysis helpers built on the emulator state.
pub mod analysis;

/// `emustate` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `emustate` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// The codec entry points and strategy traits.
pub use serialization::{BufferDeserializer, BufferSerializer, RawValue, Serializable, CANARY_SIZE};
