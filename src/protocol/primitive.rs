use crate::constant::NULL_MARKER;
use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => Ok((first, rest)),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) = U16LE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::UnexpectedEof);
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

/// Read 4-byte little-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32LE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) = U64LE::read_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read length-encoded integer, returning `None` for the NULL marker (0xFB)
pub fn read_int_lenenc_nullable(data: &[u8]) -> Result<(Option<u64>, &[u8])> {
    let (first, rest) = read_int_1(data)?;
    match first {
        NULL_MARKER => Ok((None, rest)),
        0xFC => {
            let (val, rest) = read_int_2(rest)?;
            Ok((Some(u64::from(val)), rest))
        }
        0xFD => {
            let (val, rest) = read_int_3(rest)?;
            Ok((Some(u64::from(val)), rest))
        }
        0xFE => {
            let (val, rest) = read_int_8(rest)?;
            Ok((Some(val), rest))
        }
        // 0xFF never starts a length-encoded integer
        0xFF => Err(Error::InvalidPacket),
        val => Ok((Some(u64::from(val)), rest)),
    }
}

/// Read length-encoded integer. The NULL marker reads as 251.
pub fn read_int_lenenc(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) = read_int_lenenc_nullable(data)?;
    Ok((value.unwrap_or(u64::from(NULL_MARKER)), rest))
}

/// Number of bytes following the first byte of a length-encoded integer
pub fn lenenc_extra_bytes(first: u8) -> usize {
    match first {
        0xFC => 2,
        0xFD => 3,
        0xFE => 8,
        _ => 0,
    }
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read length-encoded string
pub fn read_string_lenenc(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_int_lenenc(data)?;
    let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
    read_string_fix(rest, len)
}

/// Read length-encoded string, returning `None` for the NULL marker
pub fn read_string_lenenc_nullable(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    match read_int_lenenc_nullable(data)? {
        (None, rest) => Ok((None, rest)),
        (Some(len), rest) => {
            let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
            let (bytes, rest) = read_string_fix(rest, len)?;
            Ok((Some(bytes), rest))
        }
    }
}

/// Write 1-byte integer
pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian integer
pub fn write_int_4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

/// Write the NULL marker of a length-encoded string
pub fn write_null_lenenc(out: &mut Vec<u8>) {
    out.push(NULL_MARKER);
}

/// Write null-terminated string
pub fn write_string_null(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Write length-encoded bytes
pub fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    write_int_lenenc(out, data.len() as u64);
    out.extend_from_slice(data);
}
