//! Scripted server for driving a connection without a database.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use zero_mysql_resultset::constant::{
    CAPABILITIES_DEFAULT, CapabilityFlags, ColumnFlags, ColumnType, MAX_PACKET_PAYLOAD,
};
use zero_mysql_resultset::charset::StaticCharsets;
use zero_mysql_resultset::protocol::field::{Field, FieldContext};
use zero_mysql_resultset::protocol::packet::Payload;
use zero_mysql_resultset::protocol::primitive::*;
use zero_mysql_resultset::protocol::transport::PacketStream;
use zero_mysql_resultset::session::{ServerSession, ServerVersion};
use zero_mysql_resultset::sync::Conn;
use zero_mysql_resultset::Opts;

pub const UTF8MB4_GENERAL_CI: u16 = 45;
pub const BINARY: u16 = 63;

pub const STATUS_AUTOCOMMIT: u16 = 0x0002;
pub const STATUS_MORE_RESULTS: u16 = 0x0008;
pub const STATUS_CURSOR_EXISTS: u16 = 0x0040;
pub const STATUS_LAST_ROW_SENT: u16 = 0x0080;

/// Socket reading a prepared byte script and recording what the client writes
pub struct MockSocket {
    input: Cursor<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Column description used by [`Script::column`]
pub struct Col<'a> {
    pub name: &'a str,
    pub table: &'a str,
    pub column_type: ColumnType,
    pub collation: u16,
    pub length: u32,
    pub flags: ColumnFlags,
}

impl<'a> Col<'a> {
    pub fn new(name: &'a str, column_type: ColumnType) -> Self {
        Self {
            name,
            table: "t",
            column_type,
            collation: UTF8MB4_GENERAL_CI,
            length: 255,
            flags: ColumnFlags::empty(),
        }
    }

    pub fn binary(mut self) -> Self {
        self.collation = BINARY;
        self.flags |= ColumnFlags::BINARY_FLAG;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.flags |= ColumnFlags::UNSIGNED_FLAG;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }
}

/// Server bytes, built packet by packet
#[derive(Default)]
pub struct Script {
    bytes: Vec<u8>,
    sequence_id: u8,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the response to the next client command
    pub fn response(&mut self) -> &mut Self {
        self.sequence_id = 1;
        self
    }

    /// Continue with `sequence_id`, e.g. after packets the client sent mid-command
    pub fn sequence(&mut self, sequence_id: u8) -> &mut Self {
        self.sequence_id = sequence_id;
        self
    }

    /// LOCAL INFILE request naming `filename`
    pub fn local_infile(&mut self, filename: &str) -> &mut Self {
        let mut out = vec![0xFB];
        out.extend_from_slice(filename.as_bytes());
        self.packet(&out)
    }

    pub fn packet(&mut self, payload: &[u8]) -> &mut Self {
        let mut remaining = payload;
        loop {
            let chunk_size = remaining.len().min(MAX_PACKET_PAYLOAD);
            let (chunk, rest) = remaining.split_at(chunk_size);
            remaining = rest;
            write_int_3(&mut self.bytes, chunk_size as u32);
            write_int_1(&mut self.bytes, self.sequence_id);
            self.sequence_id = self.sequence_id.wrapping_add(1);
            self.bytes.extend_from_slice(chunk);
            if chunk_size < MAX_PACKET_PAYLOAD {
                return self;
            }
        }
    }

    pub fn ok(
        &mut self,
        affected_rows: u64,
        last_insert_id: u64,
        status: u16,
        warnings: u16,
    ) -> &mut Self {
        let mut out = vec![0x00];
        write_int_lenenc(&mut out, affected_rows);
        write_int_lenenc(&mut out, last_insert_id);
        write_int_2(&mut out, status);
        write_int_2(&mut out, warnings);
        self.packet(&out)
    }

    /// Legacy EOF packet
    pub fn eof(&mut self, status: u16) -> &mut Self {
        let mut out = vec![0xFE];
        write_int_2(&mut out, 0);
        write_int_2(&mut out, status);
        self.packet(&out)
    }

    /// OK packet with the 0xFE header, sent instead of EOF under CLIENT_DEPRECATE_EOF
    pub fn ok_eof(&mut self, status: u16) -> &mut Self {
        let mut out = vec![0xFE, 0x00, 0x00];
        write_int_2(&mut out, status);
        write_int_2(&mut out, 0);
        self.packet(&out)
    }

    pub fn err(&mut self, code: u16, sql_state: &str, message: &str) -> &mut Self {
        let mut out = vec![0xFF];
        write_int_2(&mut out, code);
        out.push(b'#');
        out.extend_from_slice(sql_state.as_bytes());
        out.extend_from_slice(message.as_bytes());
        self.packet(&out)
    }

    pub fn column_count(&mut self, count: u64) -> &mut Self {
        let mut out = Vec::new();
        write_int_lenenc(&mut out, count);
        self.packet(&out)
    }

    pub fn column(&mut self, col: &Col<'_>) -> &mut Self {
        self.packet(&column_payload(col))
    }

    /// Column count, definitions and, unless `deprecate_eof`, the EOF after them
    pub fn result_header(&mut self, cols: &[Col<'_>], deprecate_eof: bool) -> &mut Self {
        self.column_count(cols.len() as u64);
        for col in cols {
            self.column(col);
        }
        if !deprecate_eof {
            self.eof(STATUS_AUTOCOMMIT);
        }
        self
    }

    pub fn text_row(&mut self, cells: &[Option<&str>]) -> &mut Self {
        let mut out = Vec::new();
        for cell in cells {
            match cell {
                Some(text) => write_bytes_lenenc(&mut out, text.as_bytes()),
                None => write_null_lenenc(&mut out),
            }
        }
        self.packet(&out)
    }

    pub fn into_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

/// Column definition packet payload
pub fn column_payload(col: &Col<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    write_bytes_lenenc(&mut out, b"def");
    write_bytes_lenenc(&mut out, b"test");
    write_bytes_lenenc(&mut out, col.table.as_bytes());
    write_bytes_lenenc(&mut out, col.table.as_bytes());
    write_bytes_lenenc(&mut out, col.name.as_bytes());
    write_bytes_lenenc(&mut out, col.name.as_bytes());
    write_int_1(&mut out, 0x0c);
    write_int_2(&mut out, col.collation);
    write_int_4(&mut out, col.length);
    write_int_1(&mut out, col.column_type as u8);
    write_int_2(&mut out, col.flags.bits());
    write_int_1(&mut out, 0);
    write_int_2(&mut out, 0);
    out
}

/// Unpack a column against the default session and `opts`
pub fn field(col: &Col<'_>, opts: &Opts) -> Field {
    let session = session();
    let ctx = FieldContext {
        session: &session,
        opts,
        charsets: &StaticCharsets,
    };
    Field::unpack(&mut Payload::from_vec(column_payload(col)), &ctx).unwrap()
}

pub fn session() -> ServerSession {
    ServerSession::new(CAPABILITIES_DEFAULT, ServerVersion::new(8, 0, 36))
}

pub fn deprecate_eof_session() -> ServerSession {
    ServerSession::new(
        CAPABILITIES_DEFAULT | CapabilityFlags::CLIENT_DEPRECATE_EOF,
        ServerVersion::new(8, 0, 36),
    )
}

/// Options without the `SET net_write_timeout` round trips of streaming queries
pub fn quiet_opts() -> Opts {
    Opts {
        net_timeout_for_streaming_results: 0,
        ..Opts::default()
    }
}

pub type MockConn = Conn<PacketStream<MockSocket>>;

pub fn socket(script: &mut Script) -> (MockSocket, Arc<Mutex<Vec<u8>>>) {
    let output = Arc::new(Mutex::new(Vec::new()));
    let socket = MockSocket {
        input: Cursor::new(script.into_bytes()),
        output: Arc::clone(&output),
    };
    (socket, output)
}

/// Route engine logs to the test output; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn connect(
    script: &mut Script,
    session: ServerSession,
    opts: Opts,
) -> (MockConn, Arc<Mutex<Vec<u8>>>) {
    init_tracing();
    let (socket, output) = socket(script);
    (Conn::with_stream(socket, session, opts), output)
}

/// Payloads of the packets the client wrote
pub fn sent_payloads(output: &Arc<Mutex<Vec<u8>>>) -> Vec<Vec<u8>> {
    let bytes = output.lock().unwrap();
    let mut payloads = Vec::new();
    let mut pos = 0;
    while pos + 4 <= bytes.len() {
        let len = usize::from(bytes[pos])
            | usize::from(bytes[pos + 1]) << 8
            | usize::from(bytes[pos + 2]) << 16;
        payloads.push(bytes[pos + 4..pos + 4 + len].to_vec());
        pos += 4 + len;
    }
    payloads
}

/// SQL text of the COM_QUERY packets the client wrote
pub fn sent_queries(output: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    sent_payloads(output)
        .into_iter()
        .filter(|payload| payload.first() == Some(&0x03))
        .map(|payload| String::from_utf8(payload[1..].to_vec()).unwrap())
        .collect()
}
