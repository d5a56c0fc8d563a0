//! Cursor-based snapshot reader.
//!
//! [`BufferDeserializer`] borrows a byte region and walks it from left to right. Every
//! read is bounds checked before any byte is touched, and the cursor only moves once a
//! read has fully succeeded, so a failed decode never leaves a half-read value behind.
//!
//! # Debug Canaries
//!
//! In debug builds every raw read also consumes the 8-byte canary that
//! [`crate::BufferSerializer`] appended after the payload and compares it with the
//! cursor offset from before the read. A mismatch surfaces as
//! [`crate::Error::CorruptionDetected`] at the first field where writer and reader
//! disagree. Buffers written by debug and release builds are not interchangeable.

use widestring::U16String;

use crate::{
    serialization::{io::RawValue, Serializable, CANARY_SIZE},
    Error, Result,
};

/// Upper bound on the number of elements reserved up front for a decoded sequence.
const PREALLOCATION_LIMIT: usize = 0x1000;

/// Reader half of the binary codec.
///
/// # Examples
///
/// ```rust
/// use emustate::{BufferDeserializer, BufferSerializer};
/// use std::collections::BTreeMap;
///
/// let mut names = BTreeMap::new();
/// names.insert(0x7FF0_2000_u64, "NtClose".to_string());
///
/// let mut serializer = BufferSerializer::new();
/// serializer.write_map(&names);
/// let buffer = serializer.take_buffer();
///
/// let mut deserializer = BufferDeserializer::new(&buffer);
/// let decoded: BTreeMap<u64, String> = deserializer.read_map()?;
/// assert_eq!(decoded, names);
/// assert_eq!(deserializer.remaining_size(), 0);
/// # Ok::<(), emustate::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct BufferDeserializer<'a> {
    /// The borrowed snapshot bytes
    data: &'a [u8],
    /// Current position within the data buffer
    offset: usize,
}

impl<'a> BufferDeserializer<'a> {
    /// Creates a deserializer over a borrowed byte region.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        BufferDeserializer { data, offset: 0 }
    }

    /// Computes `offset + length`, failing if it overflows or passes the end of the data.
    fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self.offset.checked_add(length).ok_or(Error::OutOfBounds)?;

        if end > self.data.len() {
            return Err(Error::OutOfBounds);
        }

        Ok(end)
    }

    /// Reads a raw block of `length` bytes.
    ///
    /// In debug builds the canary following the block is consumed and verified as well.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the block (or its canary) extends past the end
    /// of the data, and [`Error::CorruptionDetected`] on a canary mismatch.
    pub fn read_data(&mut self, length: usize) -> Result<&'a [u8]> {
        let start = self.offset;
        let end = self.calc_end_position(length)?;
        let result = &self.data[start..end];

        if cfg!(debug_assertions) {
            let canary_end = end.checked_add(CANARY_SIZE).ok_or(Error::OutOfBounds)?;
            if canary_end > self.data.len() {
                return Err(Error::OutOfBounds);
            }

            let mut echo = [0u8; 8];
            echo.copy_from_slice(&self.data[end..canary_end]);

            let echoed = u64::from_le_bytes(echo);
            if echoed != start as u64 {
                return Err(Error::CorruptionDetected {
                    offset: start as u64,
                    echoed,
                });
            }

            self.offset = canary_end;
        } else {
            self.offset = end;
        }

        Ok(result)
    }

    /// Reads a [`RawValue`] from its little-endian bytes.
    ///
    /// # Errors
    ///
    /// See [`BufferDeserializer::read_data`].
    pub fn read_raw<T: RawValue>(&mut self) -> Result<T> {
        let data = self.read_data(std::mem::size_of::<T::Bytes>())?;

        let Ok(bytes) = T::Bytes::try_from(data) else {
            return Err(Error::OutOfBounds);
        };

        Ok(T::from_le_bytes(bytes))
    }

    /// Reads any [`Serializable`] value using the strategy bound to its type.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by the type's decoder.
    pub fn read<T: Serializable>(&mut self) -> Result<T> {
        T::deserialize(self)
    }

    /// Reads a value into an existing slot. The slot is only overwritten on success.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by the type's decoder.
    pub fn read_into<T: Serializable>(&mut self, target: &mut T) -> Result<()> {
        *target = self.read()?;
        Ok(())
    }

    /// Reads an element count together with a bounded preallocation size.
    ///
    /// Every element occupies at least one byte, and the preallocation never exceeds
    /// [`PREALLOCATION_LIMIT`] elements. Larger sequences grow while decoding.
    fn read_count(&mut self) -> Result<(u64, usize)> {
        let count = self.read_raw::<u64>()?;
        let capacity = usize::try_from(count)
            .unwrap_or(usize::MAX)
            .min(self.remaining_size())
            .min(PREALLOCATION_LIMIT);

        Ok((count, capacity))
    }

    /// Reads a count-prefixed sequence into a new vector.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised while decoding the count or an element.
    pub fn read_vector<T: Serializable>(&mut self) -> Result<Vec<T>> {
        let (count, capacity) = self.read_count()?;

        let mut result = Vec::with_capacity(capacity);
        for _ in 0..count {
            result.push(self.read::<T>()?);
        }

        Ok(result)
    }

    /// Replaces the contents of `target` with a decoded sequence. `target` is left
    /// untouched if decoding fails.
    ///
    /// # Errors
    ///
    /// See [`BufferDeserializer::read_vector`].
    pub fn read_vector_into<T: Serializable>(&mut self, target: &mut Vec<T>) -> Result<()> {
        *target = self.read_vector()?;
        Ok(())
    }

    /// Reads a count-prefixed sequence into any collection that can be built from its
    /// elements.
    ///
    /// # Errors
    ///
    /// See [`BufferDeserializer::read_vector`].
    pub fn read_sequence<T, C>(&mut self) -> Result<C>
    where
        T: Serializable,
        C: FromIterator<T>,
    {
        let (count, _) = self.read_count()?;
        (0..count).map(|_| self.read::<T>()).collect()
    }

    /// Reads a UTF-8 string written by [`crate::BufferSerializer::write_string`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the bytes are not valid UTF-8, besides the usual
    /// stream errors.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_vector::<u8>()?;
        String::from_utf8(bytes).map_err(|error| malformed_error!("Invalid UTF-8 string - {}", error))
    }

    /// Reads a UTF-16 string written by [`crate::BufferSerializer::write_wide_string`].
    ///
    /// # Errors
    ///
    /// See [`BufferDeserializer::read_vector`].
    pub fn read_wide_string(&mut self) -> Result<U16String> {
        Ok(U16String::from_vec(self.read_vector::<u16>()?))
    }

    /// Reads an associative container written by [`crate::BufferSerializer::write_map`].
    ///
    /// Later duplicates of a key overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised while decoding the count, a key or a value.
    pub fn read_map<K, V, M>(&mut self) -> Result<M>
    where
        K: Serializable,
        V: Serializable,
        M: FromIterator<(K, V)>,
    {
        let (count, _) = self.read_count()?;
        (0..count)
            .map(|_| {
                let key = self.read::<K>()?;
                let value = self.read::<V>()?;
                Ok((key, value))
            })
            .collect()
    }

    /// Replaces the contents of `map` with a decoded map. `map` is left untouched if
    /// decoding fails.
    ///
    /// # Errors
    ///
    /// See [`BufferDeserializer::read_map`].
    pub fn read_map_into<K, V, M>(&mut self, map: &mut M) -> Result<()>
    where
        K: Serializable,
        V: Serializable,
        M: FromIterator<(K, V)>,
    {
        *map = self.read_map::<K, V, M>()?;
        Ok(())
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining_size(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Consumes every unread byte as one raw block.
    ///
    /// Pairs with [`crate::BufferSerializer::write_trailing_data`]; no canary is checked.
    pub fn remaining_data(&mut self) -> &'a [u8] {
        let result = &self.data[self.offset..];
        self.offset = self.data.len();
        result
    }

    /// Current cursor position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns `true` if unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.offset < self.data.len()
    }
}

impl<'a> From<&'a [u8]> for BufferDeserializer<'a> {
    fn from(data: &'a [u8]) -> Self {
        BufferDeserializer::new(data)
    }
}
