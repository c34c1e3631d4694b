//! Binary codec for protocol primitives and composite values.
//!
//! Every value knows its encoded size up front ([`Encode::size`]) so a frame's
//! length prefix can be written before its body and the output buffer is
//! allocated once. Decoding runs against a [`Reader`], a forward-only cursor
//! whose remaining length is the budget for the value being read.
//!
//! Length conventions (all big-endian, signed):
//!
//! ```text
//! string   [int16 len][len bytes UTF-8]     len = -1 means null
//! bytes    [int32 len][len bytes]           len = -1 means null
//! array    [int32 count][count elements]    count = -1 means null
//! ```
//!
//! Encoding cannot fail once [`Encode::validate`] has passed; it rejects
//! values whose length does not fit its prefix.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in front of every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A value with a fixed, version-independent wire encoding.
pub trait Encode {
    /// Returns the number of bytes [`Encode::encode`] will append.
    fn size(&self) -> usize;

    /// Appends the encoding of `self` to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Fails with [`ProtocolError::Malformed`] if a length would overflow
    /// its prefix.
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

fn check_len(len: usize, max: usize, what: &str) -> Result<(), ProtocolError> {
    if len > max {
        return Err(ProtocolError::malformed(format!(
            "{} length {} exceeds {}",
            what, len, max
        )));
    }
    Ok(())
}

/// A value that can be read back from its wire encoding.
pub trait Decode: Sized {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError>;
}

/// Forward-only cursor over one in-memory frame.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Returns the number of unread bytes left in the budget.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Fails with [`ProtocolError::TrailingBytes`] unless the budget is spent.
    pub fn finish(self) -> Result<(), ProtocolError> {
        match self.buf.remaining() {
            0 => Ok(()),
            remaining => Err(ProtocolError::TrailingBytes { remaining }),
        }
    }

    /// Takes every unread byte, leaving the budget spent.
    pub fn read_remaining(&mut self) -> Bytes {
        let len = self.buf.remaining();
        self.buf.split_to(len)
    }

    fn need(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    /// Validates a length prefix against the remaining budget.
    ///
    /// Returns `None` for the null sentinel `-1`.
    fn checked_len(&self, len: i64, what: &str) -> Result<Option<usize>, ProtocolError> {
        let len = match non_negative(len, what)? {
            None => return Ok(None),
            Some(len) => len,
        };
        let remaining = self.buf.remaining();
        if len > remaining {
            return Err(ProtocolError::malformed(format!(
                "{} length {} exceeds remaining {} bytes",
                what, len, remaining
            )));
        }
        Ok(Some(len))
    }

    /// Takes `len` bytes without copying.
    fn take(&mut self, len: usize) -> Bytes {
        self.buf.split_to(len)
    }

    pub fn read_nullable_string(&mut self) -> Result<Option<String>, ProtocolError> {
        let len = self.read_i16()?;
        match self.checked_len(len as i64, "string")? {
            None => Ok(None),
            Some(len) => {
                let raw = self.take(len);
                let s = std::str::from_utf8(&raw).map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Some(s.to_string()))
            }
        }
    }

    /// Reads a string; a null string reads as empty.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        Ok(self.read_nullable_string()?.unwrap_or_default())
    }

    pub fn read_nullable_bytes(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let len = self.read_i32()?;
        Ok(self
            .checked_len(len as i64, "bytes")?
            .map(|len| self.take(len)))
    }

    /// Reads a byte sequence; a null sequence reads as empty.
    pub fn read_bytes(&mut self) -> Result<Bytes, ProtocolError> {
        Ok(self.read_nullable_bytes()?.unwrap_or_default())
    }

    /// Reads an array, decoding each element with `f`.
    ///
    /// Returns `None` for a null array.
    pub fn read_nullable_array_with<T, F>(&mut self, mut f: F) -> Result<Option<Vec<T>>, ProtocolError>
    where
        F: FnMut(&mut Reader) -> Result<T, ProtocolError>,
    {
        let count = match non_negative(self.read_i32()? as i64, "array")? {
            None => return Ok(None),
            Some(count) => count,
        };
        // Every element occupies at least one byte, so a count larger than the
        // budget runs out of input before the last element.
        let remaining = self.buf.remaining();
        if count > remaining {
            return Err(ProtocolError::Truncated {
                needed: count,
                remaining,
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(Some(items))
    }

    /// Reads an array; a null array reads as empty.
    pub fn read_array_with<T, F>(&mut self, f: F) -> Result<Vec<T>, ProtocolError>
    where
        F: FnMut(&mut Reader) -> Result<T, ProtocolError>,
    {
        Ok(self.read_nullable_array_with(f)?.unwrap_or_default())
    }

    pub fn read<T: Decode>(&mut self) -> Result<T, ProtocolError> {
        T::decode(self)
    }
}

/// Maps the null sentinel `-1` to `None` and rejects other negative lengths.
fn non_negative(len: i64, what: &str) -> Result<Option<usize>, ProtocolError> {
    match len {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::malformed(format!(
            "negative {} length {}",
            what, len
        ))),
        len => Ok(Some(len as usize)),
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! int_codec {
    ($ty:ty, $put:ident, $read:ident) => {
        impl Encode for $ty {
            fn size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode(&self, buf: &mut BytesMut) {
                buf.$put(*self);
            }
        }

        impl Decode for $ty {
            fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
                reader.$read()
            }
        }
    };
}

int_codec!(i8, put_i8, read_i8);
int_codec!(i16, put_i16, read_i16);
int_codec!(i32, put_i32, read_i32);
int_codec!(i64, put_i64, read_i64);

impl Encode for bool {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i8(*self as i8);
    }
}

impl Decode for bool {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(reader.read_i8()? != 0)
    }
}

// ============================================================================
// Strings
// ============================================================================

impl Encode for str {
    fn size(&self) -> usize {
        2 + self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i16(self.len() as i16);
        buf.put_slice(self.as_bytes());
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_len(self.len(), i16::MAX as usize, "string")
    }
}

impl Encode for String {
    fn size(&self) -> usize {
        self.as_str().size()
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.as_str().encode(buf)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.as_str().validate()
    }
}

impl Decode for String {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_string()
    }
}

impl Encode for Option<String> {
    fn size(&self) -> usize {
        match self {
            Some(s) => s.size(),
            None => 2,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(s) => s.encode(buf),
            None => buf.put_i16(-1),
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.as_ref().map_or(Ok(()), String::validate)
    }
}

impl Decode for Option<String> {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_nullable_string()
    }
}

// ============================================================================
// Byte sequences
// ============================================================================

impl Encode for Bytes {
    fn size(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.len() as i32);
        buf.put_slice(self);
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_len(self.len(), i32::MAX as usize, "bytes")
    }
}

impl Decode for Bytes {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_bytes()
    }
}

impl Encode for Option<Bytes> {
    fn size(&self) -> usize {
        match self {
            Some(b) => b.size(),
            None => 4,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(b) => b.encode(buf),
            None => buf.put_i32(-1),
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.as_ref().map_or(Ok(()), Bytes::validate)
    }
}

impl Decode for Option<Bytes> {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_nullable_bytes()
    }
}

// ============================================================================
// Arrays
// ============================================================================

impl<T: Encode> Encode for [T] {
    fn size(&self) -> usize {
        4 + self.iter().map(Encode::size).sum::<usize>()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.len() as i32);
        for item in self {
            item.encode(buf);
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_len(self.len(), i32::MAX as usize, "array")?;
        self.iter().try_for_each(Encode::validate)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn size(&self) -> usize {
        self.as_slice().size()
    }

    fn encode(&self, buf: &mut BytesMut) {
        self.as_slice().encode(buf)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.as_slice().validate()
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_array_with(T::decode)
    }
}

impl<T: Encode> Encode for Option<Vec<T>> {
    fn size(&self) -> usize {
        match self {
            Some(items) => items.size(),
            None => 4,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(items) => items.encode(buf),
            None => buf.put_i32(-1),
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.as_ref().map_or(Ok(()), |items| items.validate())
    }
}

impl<T: Decode> Decode for Option<Vec<T>> {
    fn decode(reader: &mut Reader) -> Result<Self, ProtocolError> {
        reader.read_nullable_array_with(T::decode)
    }
}

// ============================================================================
// Frame splitting
// ============================================================================

/// Splits length-prefixed frames out of a byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to split the next frame body (without its length prefix).
    ///
    /// Returns `Ok(None)` if more data is needed.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let size = i32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);
        if size < 0 {
            return Err(ProtocolError::malformed(format!(
                "negative frame size {}",
                size
            )));
        }
        let size = size as usize;
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        if self.buffer.len() < LENGTH_PREFIX_SIZE + size {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(size).freeze()))
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
