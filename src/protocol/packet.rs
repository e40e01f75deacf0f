use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < 4 {
            return Err(Error::InvalidPacket);
        }
        Self::ref_from_bytes(&data[..4]).map_err(|_| Error::InvalidPacket)
    }
}

/// A packet payload with a read cursor.
///
/// The backing buffer is kept between reads so a connection can decode every
/// row of a result set into the same allocation.
#[derive(Debug, Default, Clone)]
pub struct Payload {
    data: Vec<u8>,
    position: usize,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    /// Clear the contents, keeping the allocation
    pub fn reset(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    /// Mutable access to the backing buffer for the transport to fill
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Unread bytes after the cursor
    pub fn remaining(&self) -> &[u8] {
        self.data.get(self.position..).unwrap_or(&[])
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining_len() < n {
            return Err(Error::UnexpectedEof);
        }
        self.position += n;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let (value, rest) = read_int_1(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let (value, rest) = read_int_2(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let (value, rest) = read_int_3(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let (value, rest) = read_int_4(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let (value, rest) = read_int_8(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    /// Read a length-encoded integer; the NULL marker reads as 251
    pub fn read_lenenc(&mut self) -> Result<u64> {
        let (value, rest) = read_int_lenenc(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    /// Read a length-encoded integer, `None` for the NULL marker
    pub fn read_lenenc_nullable(&mut self) -> Result<Option<u64>> {
        let (value, rest) = read_int_lenenc_nullable(self.remaining())?;
        let rest_len = rest.len();
        self.position = self.data.len() - rest_len;
        Ok(value)
    }

    /// Byte range of the next length-encoded string, `None` for NULL
    pub fn read_lenenc_range(&mut self) -> Result<Option<std::ops::Range<usize>>> {
        match self.read_lenenc_nullable()? {
            None => Ok(None),
            Some(len) => {
                let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
                let start = self.position;
                self.skip(len)?;
                Ok(Some(start..start + len))
            }
        }
    }

    pub fn read_bytes_fix(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.position;
        self.skip(len)?;
        Ok(&self.data[start..start + len])
    }

    pub fn read_bytes_lenenc(&mut self) -> Result<&[u8]> {
        let len = self.read_lenenc()?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
        self.read_bytes_fix(len)
    }

    /// Read up to the next NUL byte, or to the end when there is none
    pub fn read_bytes_null(&mut self) -> &[u8] {
        let start = self.position;
        match memchr::memchr(0, self.remaining()) {
            Some(i) => {
                self.position = start + i + 1;
                &self.data[start..start + i]
            }
            None => {
                self.position = self.data.len();
                &self.data[start..]
            }
        }
    }

    pub fn read_bytes_eof(&mut self) -> &[u8] {
        let start = self.position;
        self.position = self.data.len();
        &self.data[start..]
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        self.data.get(offset).copied().ok_or(Error::UnexpectedEof)
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let data = self.data.get(offset..).ok_or(Error::UnexpectedEof)?;
        Ok(read_int_2(data)?.0)
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let data = self.data.get(offset..).ok_or(Error::UnexpectedEof)?;
        Ok(read_int_4(data)?.0)
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64> {
        let data = self.data.get(offset..).ok_or(Error::UnexpectedEof)?;
        Ok(read_int_8(data)?.0)
    }

    /// Overwrite one byte in place
    pub fn set_u8_at(&mut self, offset: usize, value: u8) -> Result<()> {
        let slot = self.data.get_mut(offset).ok_or(Error::UnexpectedEof)?;
        *slot = value;
        Ok(())
    }

    pub fn bytes_at(&self, range: std::ops::Range<usize>) -> Result<&[u8]> {
        self.data.get(range).ok_or(Error::UnexpectedEof)
    }

    /// Parse with a slice reader and move the cursor past what it consumed
    pub fn parse_with<T>(&mut self, f: impl FnOnce(&[u8]) -> Result<(T, &[u8])>) -> Result<T> {
        let start = self.position;
        let (value, rest_len) = {
            let (value, rest) = f(self.remaining())?;
            (value, rest.len())
        };
        debug_assert!(self.data.len() - rest_len >= start);
        self.position = self.data.len() - rest_len;
        Ok(value)
    }
}

/// Helper function to write packet header
#[inline]
pub fn write_packet_header(out: &mut Vec<u8>, sequence_id: u8, payload_length: usize) {
    let bytes = (payload_length as u32).to_le_bytes();
    out.extend_from_slice(&bytes[..3]);
    out.push(sequence_id);
}
