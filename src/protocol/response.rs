use crate::constant::{EOF_HEADER, ERR_HEADER, MAX_PACKET_PAYLOAD, OK_HEADER, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Packet type detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ok,
    Err,
    /// EOF, or OK-as-EOF when the server deprecated EOF
    Eof,
    Data,
}

/// Whether a packet starting with `first_byte` and carrying `packet_length`
/// payload bytes terminates a row stream.
///
/// A row whose first cell is at least 2^24 bytes long also starts with 0xFE,
/// but then the packet is necessarily a full 0xFFFFFF-byte packet.
#[inline]
pub fn is_terminal(first_byte: u8, packet_length: usize) -> bool {
    first_byte == EOF_HEADER && packet_length < MAX_PACKET_PAYLOAD
}

/// Detect packet type from the first byte and the packet length
pub fn detect_packet_type(payload: &[u8]) -> Result<PacketType> {
    let Some(&first) = payload.first() else {
        return Err(Error::InvalidPacket);
    };
    Ok(match first {
        ERR_HEADER => PacketType::Err,
        first if is_terminal(first, payload.len()) => PacketType::Eof,
        OK_HEADER => PacketType::Ok,
        _ => PacketType::Data,
    })
}

/// OK packet payload, unparsed
#[derive(Debug, Clone, Copy)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

impl<'a> OkPayloadBytes<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }
}

/// ERR packet payload, unparsed
#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// OK packet response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
    /// Human readable info, e.g. `Records: 3  Duplicates: 0  Warnings: 0`
    pub info: Option<String>,
}

impl OkPayload {
    /// Parse an OK packet (header 0x00, or 0xFE when EOF is deprecated)
    pub fn parse(bytes: OkPayloadBytes<'_>, read_info: bool) -> Result<Self> {
        let payload = bytes.bytes();
        let (header, data) = read_int_1(payload)?;
        if header != OK_HEADER && header != EOF_HEADER {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, rest) = read_int_2(rest)?;

        let info = if read_info && !rest.is_empty() {
            // NUL-terminated on old servers, string<EOF> on new ones
            let end = memchr::memchr(0, rest).unwrap_or(rest.len());
            Some(String::from_utf8_lossy(&rest[..end]).into_owned())
        } else {
            None
        };

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: ServerStatusFlags::from_bits_truncate(status_flags),
            warnings,
            info,
        })
    }
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        Self::parse(bytes, false)
    }
}

/// ERR packet response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let payload = bytes.0;
        let (header, mut data) = read_int_1(payload)?;
        if header != ERR_HEADER {
            return Err(Error::InvalidPacket);
        }

        let (error_code, rest) = read_int_2(data)?;
        data = rest;

        // Check for SQL state marker '#'
        let (sql_state, rest) = if data.first() == Some(&b'#') {
            let (state_bytes, rest) = read_string_fix(&data[1..], 5)?;
            (String::from_utf8_lossy(state_bytes).into_owned(), rest)
        } else {
            (String::new(), data)
        };

        // Rest is error message
        let message = String::from_utf8_lossy(rest).into_owned();

        Ok(ErrPayload {
            error_code,
            sql_state,
            message,
        })
    }
}

/// EOF packet response (zero-copy)
///
/// Layout matches MySQL wire protocol after header byte 0xFE:
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    pub fn status_flags(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_truncate(self.status_flags.get())
    }

    pub fn warnings(&self) -> u16 {
        self.warnings.get()
    }
}

/// Read a legacy EOF packet - zero-copy
pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload)?;
    if header != EOF_HEADER {
        return Err(Error::InvalidPacket);
    }
    let (eof, _rest) = EofPacket::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok(eof)
}

/// State carried by the packet that ends a row stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalStatus {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
}

impl TerminalStatus {
    pub fn more_results_exist(&self) -> bool {
        self.status_flags
            .contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

/// Parse the packet ending a result set.
///
/// With `CLIENT_DEPRECATE_EOF` it is an OK packet with header 0xFE, otherwise
/// a legacy EOF packet without row-count fields.
pub fn read_terminal(payload: &[u8], eof_deprecated: bool) -> Result<TerminalStatus> {
    // pre-4.1 servers send a bare 0xFE
    if payload.len() == 1 && payload[0] == EOF_HEADER {
        return Ok(TerminalStatus::default());
    }
    if eof_deprecated {
        let ok = OkPayload::parse(OkPayloadBytes(payload), false)?;
        Ok(TerminalStatus {
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            status_flags: ok.status_flags,
            warnings: ok.warnings,
        })
    } else {
        let eof = read_eof_packet(payload)?;
        Ok(TerminalStatus {
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: eof.status_flags(),
            warnings: eof.warnings(),
        })
    }
}

/// Return the server error if the payload is an ERR packet
#[inline]
pub fn check_error_packet(payload: &[u8]) -> Result<()> {
    if payload.first() == Some(&ERR_HEADER) {
        return Err(ErrPayloadBytes(payload).into());
    }
    Ok(())
}
