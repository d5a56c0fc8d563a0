//! Intrinsic encodings for library types.
//!
//! Containers delegate to the sequence and map helpers of the codec, so a
//! `Vec<Option<(u64, String)>>` needs no code of its own. Element types pick their own
//! strategy.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::{BuildHasher, Hash},
    path::PathBuf,
};

use widestring::U16String;

use crate::{
    serialization::{BufferDeserializer, BufferSerializer, Serializable},
    Result,
};

impl Serializable for bool {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_raw(u8::from(*self));
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        match buffer.read_raw::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(malformed_error!("Invalid bool value - {}", other)),
        }
    }
}

impl Serializable for char {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_raw(u32::from(*self));
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let value = buffer.read_raw::<u32>()?;
        char::from_u32(value).ok_or_else(|| malformed_error!("Invalid char value - 0x{:X}", value))
    }
}

impl Serializable for String {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_string(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_string()
    }
}

impl Serializable for U16String {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_wide_string(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_wide_string()
    }
}

impl Serializable for usize {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_raw(*self as u64);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let value = buffer.read_raw::<u64>()?;
        usize::try_from(value)
            .map_err(|_| malformed_error!("Value 0x{:X} does not fit into usize", value))
    }
}

impl Serializable for isize {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_raw(*self as i64);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let value = buffer.read_raw::<i64>()?;
        isize::try_from(value)
            .map_err(|_| malformed_error!("Value {} does not fit into isize", value))
    }
}

// Paths keep the host's native representation: raw bytes on Unix, UTF-16 code units
// on Windows
#[cfg(unix)]
impl Serializable for PathBuf {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        use std::os::unix::ffi::OsStrExt;

        buffer.write_vector(self.as_os_str().as_bytes());
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        use std::{ffi::OsString, os::unix::ffi::OsStringExt};

        Ok(PathBuf::from(OsString::from_vec(buffer.read_vector::<u8>()?)))
    }
}

#[cfg(windows)]
impl Serializable for PathBuf {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        use std::os::windows::ffi::OsStrExt;

        let units: Vec<u16> = self.as_os_str().encode_wide().collect();
        buffer.write_vector(&units);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        use std::{ffi::OsString, os::windows::ffi::OsStringExt};

        Ok(PathBuf::from(OsString::from_wide(&buffer.read_vector::<u16>()?)))
    }
}

impl<T: Serializable> Serializable for Vec<T> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_vector(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_vector()
    }
}

impl<T: Serializable> Serializable for VecDeque<T> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_sequence(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_sequence()
    }
}

impl<T: Serializable + Eq + Hash, S: BuildHasher + Default> Serializable for HashSet<T, S> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_sequence(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_sequence()
    }
}

impl<T: Serializable + Ord> Serializable for BTreeSet<T> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_sequence(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_sequence()
    }
}

impl<K, V, S> Serializable for HashMap<K, V, S>
where
    K: Serializable + Eq + Hash,
    V: Serializable,
    S: BuildHasher + Default,
{
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_map(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_map()
    }
}

impl<K: Serializable + Ord, V: Serializable> Serializable for BTreeMap<K, V> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write_map(self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        buffer.read_map()
    }
}

impl<T: Serializable> Serializable for Option<T> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        match self {
            Some(value) => {
                buffer.write_raw(1u8);
                buffer.write(value);
            }
            None => buffer.write_raw(0u8),
        }
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        match buffer.read_raw::<u8>()? {
            0 => Ok(None),
            1 => Ok(Some(buffer.read()?)),
            other => Err(malformed_error!("Invalid option tag - {}", other)),
        }
    }
}

impl<T: Serializable> Serializable for Box<T> {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write(&**self);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        Ok(Box::new(buffer.read()?))
    }
}

impl<A: Serializable, B: Serializable> Serializable for (A, B) {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write(&self.0);
        buffer.write(&self.1);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let first = buffer.read()?;
        let second = buffer.read()?;
        Ok((first, second))
    }
}

impl<A: Serializable, B: Serializable, C: Serializable> Serializable for (A, B, C) {
    fn serialize(&self, buffer: &mut BufferSerializer) {
        buffer.write(&self.0);
        buffer.write(&self.1);
        buffer.write(&self.2);
    }

    fn deserialize(buffer: &mut BufferDeserializer<'_>) -> Result<Self> {
        let first = buffer.read()?;
        let second = buffer.read()?;
        let third = buffer.read()?;
        Ok((first, second, third))
    }
}
