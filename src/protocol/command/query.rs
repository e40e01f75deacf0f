use crate::constant::{CommandByte, ERR_HEADER, NULL_MARKER, OK_HEADER};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayloadBytes, OkPayloadBytes};

/// Write COM_QUERY command
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Read the first packet answering COM_QUERY or COM_STMT_EXECUTE
/// This can be:
/// - 0xFF: ERR packet (error occurred)
/// - 0x00: OK packet (query succeeded without result set)
/// - 0xFB: LOCAL INFILE request carrying a file name
/// - Otherwise: Result set (first byte is column count as length-encoded integer)
pub fn read_query_response(payload: &[u8]) -> Result<QueryResponse<'_>> {
    let Some(&first) = payload.first() else {
        return Err(Error::InvalidPacket);
    };

    match first {
        ERR_HEADER => Err(ErrPayloadBytes(payload).into()),
        OK_HEADER => Ok(QueryResponse::Ok(OkPayloadBytes(payload))),
        NULL_MARKER => {
            let filename = &payload[1..];
            // some servers NUL-terminate the name
            let end = memchr::memchr(0, filename).unwrap_or(filename.len());
            Ok(QueryResponse::LocalInfile {
                filename: &filename[..end],
            })
        }
        _ => {
            let (column_count, _rest) = read_int_lenenc(payload)?;
            Ok(QueryResponse::ResultSet { column_count })
        }
    }
}

/// Query response variants
#[derive(Debug)]
pub enum QueryResponse<'a> {
    Ok(OkPayloadBytes<'a>),
    LocalInfile { filename: &'a [u8] },
    ResultSet { column_count: u64 },
}
