//! Typed primitive readers/writers for the wire format: fixed-width
//! integers in both endiannesses, and the two length-prefixed string
//! encodings (`PacketString`, `PacketLongString`).

use std::ops::{Deref, DerefMut};

use crate::error::CodecError;

/// Anything that can be appended to an outbound frame body.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// Anything that can be pulled off the front of an inbound frame body.
///
/// Mirrors `valence_protocol::Decode`'s `&mut &[u8]` cursor style: each call
/// advances `r` past the bytes it consumed.
pub trait Decode<'a>: Sized {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError>;
}

macro_rules! impl_int_le {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }
            }

            impl<'a> Decode<'a> for $t {
                fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
                    const N: usize = std::mem::size_of::<$t>();
                    if r.len() < N {
                        return Err(CodecError::Eof { what: stringify!($t) });
                    }
                    let (head, tail) = r.split_at(N);
                    *r = tail;
                    Ok(<$t>::from_le_bytes(head.try_into().unwrap()))
                }
            }
        )*
    };
}

impl_int_le!(i8, u8, i16, u16, i32, u32, i64, u64);

impl Encode for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }
}

impl<'a> Decode<'a> for bool {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(u8::decode(r)? != 0)
    }
}

/// A big-endian wrapper, for the few fields the spec calls out as BE (the
/// holepunch echo's observed port and address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Be<T>(pub T);

impl<T> Deref for Be<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Be<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

macro_rules! impl_int_be {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for Be<$t> {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.0.to_be_bytes());
                }
            }

            impl<'a> Decode<'a> for Be<$t> {
                fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
                    const N: usize = std::mem::size_of::<$t>();
                    if r.len() < N {
                        return Err(CodecError::Eof { what: stringify!(Be<$t>) });
                    }
                    let (head, tail) = r.split_at(N);
                    *r = tail;
                    Ok(Be(<$t>::from_be_bytes(head.try_into().unwrap())))
                }
            }
        )*
    };
}

impl_int_be!(i16, u16, i32, u32, i64, u64);

/// UTF-8 string with a 1-byte length prefix (spec.md §3 `PacketString`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketString(pub String);

impl From<&str> for PacketString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PacketString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Deref for PacketString {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Encode for PacketString {
    fn encode(&self, buf: &mut Vec<u8>) {
        let bytes = self.0.as_bytes();
        assert!(bytes.len() <= u8::MAX as usize, "PacketString too long");
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(bytes);
    }
}

impl<'a> Decode<'a> for PacketString {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        let declared = u8::decode(r)? as usize;
        if r.len() < declared {
            return Err(CodecError::Eof {
                what: "PacketString body",
            });
        }
        let (head, tail) = r.split_at(declared);
        *r = tail;
        let s = std::str::from_utf8(head)?;
        if s.len() != declared {
            return Err(CodecError::StringLength {
                declared,
                actual: s.len(),
            });
        }
        Ok(PacketString(s.to_owned()))
    }
}

/// UTF-8 string with a 2-byte little-endian length prefix (spec.md §3
/// `PacketLongString`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketLongString(pub String);

impl From<&str> for PacketLongString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Deref for PacketLongString {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Encode for PacketLongString {
    fn encode(&self, buf: &mut Vec<u8>) {
        let bytes = self.0.as_bytes();
        assert!(
            bytes.len() <= u16::MAX as usize,
            "PacketLongString too long"
        );
        buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(bytes);
    }
}

impl<'a> Decode<'a> for PacketLongString {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        let declared = u16::decode(r)? as usize;
        if r.len() < declared {
            return Err(CodecError::Eof {
                what: "PacketLongString body",
            });
        }
        let (head, tail) = r.split_at(declared);
        *r = tail;
        let s = std::str::from_utf8(head)?;
        if s.len() != declared {
            return Err(CodecError::StringLength {
                declared,
                actual: s.len(),
            });
        }
        Ok(PacketLongString(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<'a, T>(value: T, buf: &'a mut Vec<u8>)
    where
        T: Encode + Decode<'a> + PartialEq + std::fmt::Debug,
    {
        value.encode(buf);
        let mut r = &buf[..];
        let decoded = T::decode(&mut r).unwrap();
        assert_eq!(decoded, value);
        assert!(r.is_empty());
    }

    #[test]
    fn round_trips_le_ints() {
        round_trip(42i8, &mut Vec::new());
        round_trip(200u8, &mut Vec::new());
        round_trip(-1234i16, &mut Vec::new());
        round_trip(65000u16, &mut Vec::new());
        round_trip(-70000i32, &mut Vec::new());
        round_trip(4_000_000_000u32, &mut Vec::new());
        round_trip(-1i64, &mut Vec::new());
        round_trip(u64::MAX, &mut Vec::new());
    }

    #[test]
    fn round_trips_be_ints() {
        round_trip(Be(30002u16), &mut Vec::new());
        round_trip(Be(-1i32), &mut Vec::new());
    }

    #[test]
    fn round_trips_strings() {
        round_trip(PacketString::from("alice"), &mut Vec::new());
        round_trip(PacketString::from(""), &mut Vec::new());
        round_trip(PacketLongString::from("a longer map name"), &mut Vec::new());
    }

    #[test]
    fn short_string_rejects_truncated_utf8_length() {
        // Declares 3 bytes, but only 1 is present.
        let buf = [1u8, 0xE2];
        let mut r = &buf[..];
        assert!(PacketString::decode(&mut r).is_err());
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        let buf = [5u8];
        let mut r = &buf[..];
        assert!(bool::decode(&mut r).unwrap());
    }
}
