use std::str;

use bytes::Bytes;

use crate::ConversionError;

/// Types that can be read from the raw bytes of a path segment, parameter or cookie.
pub trait Readable: Sized {
    fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError>;
}

impl Readable for Bytes {
    fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

impl Readable for Vec<u8> {
    fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
        Ok(bytes.to_vec())
    }
}

impl Readable for String {
    fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
        str::from_utf8(bytes).map(str::to_owned).map_err(|e| ConversionError::new(bytes, "String", e))
    }
}

macro_rules! readable_from_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Readable for $ty {
                fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
                    let s = str::from_utf8(bytes).map_err(|e| ConversionError::new(bytes, stringify!($ty), e))?;
                    s.parse::<$ty>().map_err(|e| ConversionError::new(bytes, stringify!($ty), e))
                }
            }
        )+
    };
}

readable_from_str!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);
