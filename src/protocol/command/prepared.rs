use crate::constant::CommandByte;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::value::{NullBitmap, Value};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// `CURSOR_TYPE_NO_CURSOR`
pub const CURSOR_TYPE_NO_CURSOR: u8 = 0x00;

/// `CURSOR_TYPE_READ_ONLY`: the server keeps the rows for COM_STMT_FETCH
pub const CURSOR_TYPE_READ_ONLY: u8 = 0x01;

/// Prepared statement OK response (zero-copy)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
    _reserved: u8,
    warning_count: U16LE,
}

impl PrepareOk {
    /// Get the statement ID
    pub fn statement_id(&self) -> u32 {
        self.statement_id.get()
    }

    /// Get the number of columns in the result set
    pub fn num_columns(&self) -> u16 {
        self.num_columns.get()
    }

    /// Get the number of parameters in the prepared statement
    pub fn num_params(&self) -> u16 {
        self.num_params.get()
    }

    /// Get the warning count
    pub fn warning_count(&self) -> u16 {
        self.warning_count.get()
    }
}

/// Write COM_STMT_PREPARE command
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::StmtPrepare as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Read COM_STMT_PREPARE response
pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    let (status, data) = read_int_1(payload)?;
    if status != 0x00 {
        return Err(Error::InvalidPacket);
    }
    let (prepare_ok, _rest) = PrepareOk::ref_from_prefix(data).map_err(|_| Error::InvalidPacket)?;
    Ok(prepare_ok)
}

/// Write COM_STMT_EXECUTE command
pub fn write_execute(out: &mut Vec<u8>, statement_id: u32, cursor_type: u8, params: &[Value<'_>]) {
    write_int_1(out, CommandByte::StmtExecute as u8);
    write_int_4(out, statement_id);
    write_int_1(out, cursor_type);

    // iteration count (4 bytes) - always 1
    write_int_4(out, 1);

    if params.is_empty() {
        return;
    }

    // NULL bitmap: (num_params + 7) / 8 bytes
    let bitmap_start = out.len();
    out.resize(bitmap_start + NullBitmap::parameters_len(params.len()), 0);
    for (i, param) in params.iter().enumerate() {
        if param.is_null() {
            out[bitmap_start + (i >> 3)] |= 1 << (i & 7);
        }
    }

    // new-params-bound-flag (1 byte)
    write_int_1(out, 0x01);
    for param in params {
        let (column_type, unsigned) = param.param_type();
        write_int_1(out, column_type as u8);
        write_int_1(out, if unsigned { 0x80 } else { 0x00 });
    }

    for param in params {
        param.encode_binary(out);
    }
}

/// Write COM_STMT_FETCH command
pub fn write_fetch(out: &mut Vec<u8>, statement_id: u32, num_rows: u32) {
    write_int_1(out, CommandByte::StmtFetch as u8);
    write_int_4(out, statement_id);
    write_int_4(out, num_rows);
}

/// Write COM_STMT_CLOSE command
pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

/// Write COM_STMT_RESET command
pub fn write_reset_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtReset as u8);
    write_int_4(out, statement_id);
}
