//! Raw little-endian value conversion for the byte-copy encoding strategy.
//!
//! The [`RawValue`] trait is the explicit opt-in marker for types whose value is fully
//! described by a fixed number of bytes: no hidden indirections, no padding, no identity.
//! Only types implementing it can be bound to the raw strategy with
//! [`crate::impl_raw_serializable!`], so a type with a pointer inside can never be copied
//! byte-for-byte by accident.
//!
//! # Supported Types
//!
//! - **Unsigned integers**: `u8`, `u16`, `u32`, `u64`, `u128`
//! - **Signed integers**: `i8`, `i16`, `i32`, `i64`, `i128`
//! - **Floating point**: `f32`, `f64`
//!
//! `usize` and `isize` are not raw values. Their width depends on the host, so they are
//! encoded as 8-byte integers and range-checked on the way back in.

/// Trait for types that can be copied to and from a fixed-size little-endian byte array.
///
/// Each implementation defines a `Bytes` associated type that represents the byte array
/// required for that type (e.g., `[u8; 4]` for `u32`).
///
/// # Examples
///
/// ```rust
/// use emustate::RawValue;
///
/// let bytes = RawValue::to_le_bytes(0x1234_u16);
/// assert_eq!(bytes, [0x34, 0x12]);
/// assert_eq!(<u16 as RawValue>::from_le_bytes(bytes), 0x1234);
/// ```
pub trait RawValue: Sized + Copy {
    /// Byte array holding the encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read `Self` from a little-endian byte array
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write `Self` to a little-endian byte array
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_raw_value {
    ($($ty:ty),+) => {
        $(
            impl RawValue for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )+
    };
}

impl_raw_value!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

impl_raw_serializable!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        assert_eq!(RawValue::to_le_bytes(1u32), [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(RawValue::to_le_bytes(-2i16), [0xFE, 0xFF]);
        assert_eq!(
            RawValue::to_le_bytes(0x0102_0304_0506_0708u64),
            [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn floats_keep_their_bit_pattern() {
        let value = -0.0_f64;
        let decoded = <f64 as RawValue>::from_le_bytes(RawValue::to_le_bytes(value));
        assert_eq!(decoded.to_bits(), value.to_bits());

        let nan = f32::from_bits(0x7FC0_0001);
        let decoded = <f32 as RawValue>::from_le_bytes(RawValue::to_le_bytes(nan));
        assert_eq!(decoded.to_bits(), 0x7FC0_0001);
    }
}
