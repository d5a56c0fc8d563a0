/// Binds the raw byte-copy strategy to one or more [`crate::RawValue`] types.
///
/// The generated [`crate::Serializable`] impl copies the value's little-endian bytes
/// through [`crate::BufferSerializer::write_raw`] and reads them back with
/// [`crate::BufferDeserializer::read_raw`]. Types that do not implement `RawValue` are
/// rejected by the compiler.
///
/// ```rust
/// use emustate::{impl_raw_serializable, RawValue};
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// struct Handle(u32);
///
/// impl RawValue for Handle {
///     type Bytes = [u8; 4];
///
///     fn from_le_bytes(bytes: Self::Bytes) -> Self {
///         Handle(u32::from_le_bytes(bytes))
///     }
///
///     fn to_le_bytes(self) -> Self::Bytes {
///         self.0.to_le_bytes()
///     }
/// }
///
/// impl_raw_serializable!(Handle);
/// ```
#[macro_export]
macro_rules! impl_raw_serializable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Serializable for $ty {
                #[inline]
                fn serialize(&self, buffer: &mut $crate::BufferSerializer) {
                    buffer.write_raw(*self);
                }

                #[inline]
                fn deserialize(buffer: &mut $crate::BufferDeserializer<'_>) -> $crate::Result<Self> {
                    buffer.read_raw::<$ty>()
                }
            }
        )+
    };
}

/// Binds a free `serialize`/`deserialize` function pair to a type.
///
/// This is the strategy for types whose encoding lives next to the code that owns the
/// snapshot format rather than on the type itself. The functions must have the shapes
/// `fn(&mut BufferSerializer, &T)` and `fn(&mut BufferDeserializer<'_>) -> Result<T>`.
///
/// ```rust
/// use emustate::{impl_serializable_with, BufferDeserializer, BufferSerializer, Result};
///
/// #[derive(Debug, PartialEq)]
/// struct Register {
///     name: String,
///     value: u64,
/// }
///
/// fn write_register(buffer: &mut BufferSerializer, reg: &Register) {
///     buffer.write_string(&reg.name);
///     buffer.write(&reg.value);
/// }
///
/// fn read_register(buffer: &mut BufferDeserializer<'_>) -> Result<Register> {
///     Ok(Register {
///         name: buffer.read_string()?,
///         value: buffer.read()?,
///     })
/// }
///
/// impl_serializable_with!(Register, write_register, read_register);
/// ```
#[macro_export]
macro_rules! impl_serializable_with {
    ($ty:ty, $serialize:path, $deserialize:path) => {
        impl $crate::Serializable for $ty {
            #[inline]
            fn serialize(&self, buffer: &mut $crate::BufferSerializer) {
                $serialize(buffer, self)
            }

            #[inline]
            fn deserialize(buffer: &mut $crate::BufferDeserializer<'_>) -> $crate::Result<Self> {
                $deserialize(buffer)
            }
        }
    };
}
