//! Append-only snapshot writer.
//!
//! [`BufferSerializer`] owns a growing byte buffer. Every value is appended in call
//! order; nothing is ever rewritten in place. In debug builds every raw write is
//! followed by an 8-byte canary holding the buffer length before the write, which
//! [`crate::BufferDeserializer`] cross-checks on the way back in.

use widestring::U16Str;

use crate::serialization::{io::RawValue, Serializable, CANARY_SIZE};

/// Writer half of the binary codec.
///
/// # Examples
///
/// ```rust
/// use emustate::{BufferDeserializer, BufferSerializer};
///
/// let mut serializer = BufferSerializer::new();
/// serializer.write(&0x7FF0_0000_u64);
/// serializer.write_string("ntdll.dll");
///
/// let buffer = serializer.take_buffer();
/// assert!(serializer.is_empty());
///
/// let mut deserializer = BufferDeserializer::new(&buffer);
/// assert_eq!(deserializer.read::<u64>()?, 0x7FF0_0000);
/// assert_eq!(deserializer.read_string()?, "ntdll.dll");
/// # Ok::<(), emustate::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferSerializer {
    buffer: Vec<u8>,
}

impl BufferSerializer {
    /// Creates an empty serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty serializer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        BufferSerializer {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends a raw block of bytes.
    ///
    /// This is the single primitive every raw field goes through. In debug builds the
    /// block is followed by the little-endian buffer length from before the write.
    pub fn write_data(&mut self, data: &[u8]) {
        let old_size = self.buffer.len() as u64;

        self.buffer.reserve(data.len() + CANARY_SIZE);
        self.buffer.extend_from_slice(data);

        if cfg!(debug_assertions) {
            self.buffer.extend_from_slice(&old_size.to_le_bytes());
        }
    }

    /// Appends the little-endian bytes of a [`RawValue`].
    pub fn write_raw<T: RawValue>(&mut self, value: T) {
        self.write_data(value.to_le_bytes().as_ref());
    }

    /// Appends any [`Serializable`] value using the strategy bound to its type.
    pub fn write<T: Serializable>(&mut self, value: &T) {
        value.serialize(self);
    }

    /// Appends the finished contents of another serializer as one raw block.
    pub fn write_serializer(&mut self, other: &BufferSerializer) {
        self.write_data(other.buffer());
    }

    /// Appends a slice as an element count followed by every element.
    pub fn write_vector<T: Serializable>(&mut self, values: &[T]) {
        self.write_sequence(values);
    }

    /// Appends any exact-size sequence as an element count followed by every element,
    /// in iteration order.
    pub fn write_sequence<'a, T, I>(&mut self, values: I)
    where
        T: Serializable + 'a,
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: ExactSizeIterator,
    {
        let values = values.into_iter();
        self.write_raw(values.len() as u64);

        for value in values {
            self.write(value);
        }
    }

    /// Appends a UTF-8 string as a sequence of bytes.
    pub fn write_string(&mut self, value: &str) {
        self.write_sequence(value.as_bytes());
    }

    /// Appends a UTF-16 string as a sequence of code units.
    pub fn write_wide_string(&mut self, value: &U16Str) {
        self.write_sequence(value.as_slice());
    }

    /// Appends an associative container as an entry count followed by each key and its
    /// value, in iteration order.
    ///
    /// Works with anything that iterates `(&K, &V)` pairs with a known length, such as
    /// `&HashMap<K, V>` or `&BTreeMap<K, V>`.
    pub fn write_map<'a, K, V, I>(&mut self, map: I)
    where
        K: Serializable + 'a,
        V: Serializable + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
        I::IntoIter: ExactSizeIterator,
    {
        let entries = map.into_iter();
        self.write_raw(entries.len() as u64);

        for (key, value) in entries {
            self.write(key);
            self.write(value);
        }
    }

    /// Appends an unstructured trailing payload without a canary.
    ///
    /// The payload is meant to be consumed in one piece with
    /// [`crate::BufferDeserializer::remaining_data`], so nothing may be written after it.
    pub fn write_trailing_data(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Transfers the finished buffer out, leaving this serializer empty.
    pub fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Consumes the serializer and returns its buffer.
    #[must_use]
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_write_layout() {
        let mut serializer = BufferSerializer::new();
        serializer.write(&0x11223344_u32);
        serializer.write(&0xAA_u8);

        let buffer = serializer.buffer();
        assert_eq!(buffer.len(), 4 + 1 + 2 * CANARY_SIZE);
        assert_eq!(&buffer[..4], &[0x44, 0x33, 0x22, 0x11]);

        if cfg!(debug_assertions) {
            assert_eq!(&buffer[4..12], &0u64.to_le_bytes());
            assert_eq!(buffer[12], 0xAA);
            assert_eq!(&buffer[13..21], &12u64.to_le_bytes());
        } else {
            assert_eq!(buffer[4], 0xAA);
        }
    }

    #[test]
    fn sequence_is_count_prefixed() {
        let mut serializer = BufferSerializer::new();
        serializer.write_vector(&[1u16, 2, 3]);

        let buffer = serializer.buffer();
        assert_eq!(&buffer[..8], &3u64.to_le_bytes());
        assert_eq!(buffer.len(), 8 + 3 * 2 + 4 * CANARY_SIZE);
    }

    #[test]
    fn empty_string_is_just_a_count() {
        let mut serializer = BufferSerializer::new();
        serializer.write_string("");
        assert_eq!(serializer.len(), 8 + CANARY_SIZE);
    }

    #[test]
    fn take_buffer_leaves_serializer_empty() {
        let mut serializer = BufferSerializer::new();
        serializer.write(&1u64);
        let taken = serializer.take_buffer();

        assert_eq!(taken.len(), 8 + CANARY_SIZE);
        assert!(serializer.is_empty());
        assert_eq!(serializer.len(), 0);

        serializer.write(&2u8);
        assert_eq!(serializer.len(), 1 + CANARY_SIZE);
    }

    #[test]
    fn trailing_data_has_no_canary() {
        let mut serializer = BufferSerializer::new();
        serializer.write_trailing_data(&[0xCC; 16]);
        assert_eq!(serializer.buffer(), &[0xCC; 16]);
    }

    #[test]
    fn nested_serializer_is_one_block() {
        let mut inner = BufferSerializer::new();
        inner.write(&7u32);

        let mut outer = BufferSerializer::new();
        outer.write_serializer(&inner);
        assert_eq!(outer.len(), inner.len() + CANARY_SIZE);
        assert_eq!(&outer.buffer()[..inner.len()], inner.buffer());
    }
}
