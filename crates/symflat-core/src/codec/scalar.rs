//! Fixed-size primitive codecs and the string codec.

use super::{ByteReader, Codec};
use crate::error::SymflatResult;

macro_rules! int_codec {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Codec for $name
        {
            type Value = $ty;

            fn size_of(&self, _value: &$ty) -> usize
            {
                std::mem::size_of::<$ty>()
            }

            fn write(&self, value: &$ty, dest: &mut Vec<u8>)
            {
                dest.extend_from_slice(&value.to_le_bytes());
            }

            fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<$ty>
            {
                Ok(<$ty>::from_le_bytes(src.take_array()?))
            }

            fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
            {
                src.take(std::mem::size_of::<$ty>()).map(drop)
            }
        }
    };
}

int_codec!(
    /// Single byte.
    U8Codec,
    u8
);
int_codec!(
    /// Little-endian `u32`.
    U32Codec,
    u32
);
int_codec!(
    /// Little-endian `i32` (file ids, line numbers, origin ids).
    I32Codec,
    i32
);
int_codec!(
    /// Little-endian `u64` (addresses and sizes).
    U64Codec,
    u64
);

/// One byte, `0` or `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolCodec;

impl Codec for BoolCodec
{
    type Value = bool;

    fn size_of(&self, _value: &bool) -> usize
    {
        1
    }

    fn write(&self, value: &bool, dest: &mut Vec<u8>)
    {
        dest.push(u8::from(*value));
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<bool>
    {
        match src.take_array::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(src.error(format!("invalid boolean byte {other:#04x}"))),
        }
    }
}

/// Length-prefixed UTF-8 string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrCodec;

impl StrCodec
{
    /// Decode a string without copying it out of the buffer.
    ///
    /// ## Errors
    ///
    /// Fails on truncation or invalid UTF-8.
    pub fn read_borrowed<'a>(&self, src: &mut ByteReader<'a>) -> SymflatResult<&'a str>
    {
        let len = U32Codec.read(src)? as usize;
        let bytes = src.take(len)?;
        std::str::from_utf8(bytes).map_err(|err| src.error(format!("invalid UTF-8 in string: {err}")))
    }
}

impl Codec for StrCodec
{
    type Value = String;

    fn size_of(&self, value: &String) -> usize
    {
        super::COUNT_SIZE + value.len()
    }

    fn write(&self, value: &String, dest: &mut Vec<u8>)
    {
        super::write_count(value.len(), dest);
        dest.extend_from_slice(value.as_bytes());
    }

    fn read(&self, src: &mut ByteReader<'_>) -> SymflatResult<String>
    {
        self.read_borrowed(src).map(str::to_owned)
    }

    fn skip(&self, src: &mut ByteReader<'_>) -> SymflatResult<()>
    {
        self.read_borrowed(src).map(drop)
    }
}
