//! Binary codec for emulator state snapshots.
//!
//! This module turns live emulator state (loaded modules, memory bookkeeping, register
//! values) into a flat little-endian byte stream and back. The format is positional:
//! there are no field tags, type ids or lengths beyond what individual encodings
//! declare, so a reader must issue the exact same sequence of calls as the writer.
//!
//! # Encoding Strategies
//!
//! Every snapshot-able type is bound to exactly one strategy, resolved at compile time:
//!
//! 1. **Intrinsic** - the type implements [`Serializable`] itself. Collections, strings,
//!    `Option`, `bool` and similar library types take this route.
//! 2. **Free functions** - a `serialize`/`deserialize` pair living next to the snapshot
//!    code is bound to the type with [`crate::impl_serializable_with!`].
//! 3. **Raw copy** - plain fixed-size values that implement [`RawValue`] are copied byte
//!    for byte with [`crate::impl_raw_serializable!`].
//!
//! Trait coherence makes a second binding for the same type a compile error, and a type
//! with no binding cannot be passed to [`BufferSerializer::write`] at all.
//!
//! # Wire Format
//!
//! | Item | Encoding |
//! |------|----------|
//! | raw value | little-endian bytes |
//! | `usize`, `isize` | 8 bytes, range-checked when read |
//! | `PathBuf` | sequence of native units, bytes on Unix and `u16` on Windows |
//! | `bool` | one byte, `0` or `1` |
//! | sequence, string | `u64` count followed by every element |
//! | map | `u64` count followed by key, value pairs |
//! | `Option` | `u8` tag, then the value if the tag is `1` |
//! | trailing data | raw bytes up to the end of the buffer |
//!
//! Debug builds append an 8-byte canary after every raw block, see [`CANARY_SIZE`].
//!
//! # Examples
//!
//! ```rust
//! use emustate::{BufferDeserializer, BufferSerializer};
//! use std::collections::BTreeMap;
//!
//! let mut serializer = BufferSerializer::new();
//! serializer.write(&vec![Some(1u32), None]);
//! serializer.write(&(String::from("rip"), 0x1400_1000_u64));
//! let buffer = serializer.take_buffer();
//!
//! let mut deserializer = BufferDeserializer::new(&buffer);
//! let slots: Vec<Option<u32>> = deserializer.read()?;
//! let register: (String, u64) = deserializer.read()?;
//! assert_eq!(slots, vec![Some(1), None]);
//! assert_eq!(register.1, 0x1400_1000);
//! # Ok::<(), emustate::Error>(())
//! ```

mod deserializer;
pub(crate) mod impls;
mod io;
mod serializer;

pub use deserializer::BufferDeserializer;
pub use io::RawValue;
pub use serializer::BufferSerializer;

use crate::Result;

/// Size in bytes of the corruption canary written after every raw block.
///
/// The canary is the little-endian buffer length from before the block was written.
/// It only exists in builds with `debug_assertions`; release buffers carry none.
#[cfg(debug_assertions)]
pub const CANARY_SIZE: usize = 8;

/// Size in bytes of the corruption canary written after every raw block.
///
/// The canary is the little-endian buffer length from before the block was written.
/// It only exists in builds with `debug_assertions`; release buffers carry none.
#[cfg(not(debug_assertions))]
pub const CANARY_SIZE: usize = 0;

/// A type with a bound snapshot encoding.
///
/// Implement this directly for the intrinsic strategy, or use
/// [`crate::impl_serializable_with!`] / [`crate::impl_raw_serializable!`] to bind one of
/// the other two.
///
/// Decoding is constructor-style: a value only comes into existence once every byte it
/// needs has been read and validated.
pub trait Serializable: Sized {
    /// Appends the encoding of `self` to `buffer`.
    fn serialize(&self, buffer: &mut BufferSerializer);

    /// Decodes a value from the current position of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] when the buffer is too short,
    /// [`crate::Error::CorruptionDetected`] on a debug canary mismatch and
    /// [`crate::Error::Malformed`] when the bytes do not form a valid value.
    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self>;
}
