//! Per-connection protocol engine.
//!
//! `MysqlIo` sends commands and turns the server's answers into
//! [`ProtocolResult`] chains. It owns the transport, the reusable packet buffer
//! and the session state the server reports back (status flags, warnings, the
//! open streaming result).

use std::io::Read;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::charset::{CharsetLookup, StaticCharsets};
use crate::constant::{
    CommandByte, ERR_HEADER, MAX_PACKET_PAYLOAD, NULL_MARKER, ServerStatusFlags,
};
use crate::error::{Error, Result, eyre};
use crate::opts::Opts;
use crate::protocol::command::local_infile::send_local_infile;
use crate::protocol::command::prepared::{
    CURSOR_TYPE_NO_CURSOR, CURSOR_TYPE_READ_ONLY, read_prepare_ok, write_close_statement,
    write_execute, write_fetch, write_prepare, write_reset_statement,
};
use crate::protocol::command::query::{QueryResponse, read_query_response, write_query};
use crate::protocol::command::utility::{write_init_db, write_simple_command};
use crate::protocol::field::{Field, FieldContext};
use crate::protocol::packet::Payload;
use crate::protocol::primitive::{lenenc_extra_bytes, read_int_lenenc_nullable};
use crate::protocol::response::{
    ErrPayloadBytes, OkPayload, OkPayloadBytes, TerminalStatus, check_error_packet, is_terminal,
    read_terminal,
};
use crate::protocol::row::{BorrowedRow, DecodedRow, OwnedRow, RowView, force_buffer_row};
use crate::protocol::transport::Transport;
use crate::protocol::value::{NullBitmap, Value, binary_cell_len};
use crate::resultset::{
    Concurrency, CursorRows, ProtocolResult, ResultSetRows, StaticRows, StreamingRows,
    UpdateResult,
};
use crate::session::ServerSession;

/// `ER_WARN_DATA_OUT_OF_RANGE`
const WARN_DATA_OUT_OF_RANGE: u16 = 1264;
/// `WARN_DATA_TRUNCATED`
const WARN_DATA_TRUNCATED: u16 = 1265;

/// A connection engine shared with the streaming and cursor row sources it hands out
pub type SharedIo<T> = Arc<Mutex<MysqlIo<T>>>;

pub fn lock_io<T: Transport>(io: &SharedIo<T>) -> Result<MutexGuard<'_, MysqlIo<T>>> {
    io.lock().map_err(|_| {
        Error::ResourceMisuse("connection state was poisoned by a panic".to_string())
    })
}

/// How the rows of one result should be read
pub struct RowRequest<'f> {
    fields: &'f [Field],
    is_binary: bool,
    concurrency: Concurrency,
    may_reuse_packet: bool,
    force_buffer: bool,
}

impl<'f> RowRequest<'f> {
    pub fn new(
        fields: &'f [Field],
        is_binary: bool,
        concurrency: Concurrency,
        may_reuse_packet: bool,
    ) -> Self {
        Self {
            fields,
            is_binary,
            concurrency,
            may_reuse_packet,
            force_buffer: force_buffer_row(fields),
        }
    }

    pub fn fields(&self) -> &'f [Field] {
        self.fields
    }

    /// Read-only text rows without large objects are decoded straight off the stream
    fn use_fast_path(&self) -> bool {
        !self.is_binary && self.concurrency == Concurrency::ReadOnly && !self.force_buffer
    }
}

/// How the results of a command should be materialized
#[derive(Default)]
pub struct ResultRequest {
    /// Rows use the binary protocol (COM_STMT_EXECUTE)
    pub is_binary: bool,
    /// Hand rows out one at a time instead of reading them all
    pub streaming: bool,
    pub concurrency: Concurrency,
    /// Scrollable results never use a server cursor
    pub scrollable: bool,
    /// Rows per COM_STMT_FETCH round trip; 0 disables cursor fetch
    pub fetch_size: u32,
    /// Keep at most this many rows of a static result
    pub max_rows: Option<usize>,
    pub statement_id: Option<u32>,
    /// Column definitions known from an earlier execution
    pub cached_fields: Option<Arc<[Field]>>,
    /// Data sent for a LOCAL INFILE request instead of the named file
    pub local_infile_stream: Option<Box<dyn Read + Send>>,
}

impl ResultRequest {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn binary(statement_id: u32) -> Self {
        Self {
            is_binary: true,
            statement_id: Some(statement_id),
            ..Self::default()
        }
    }

    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_cached_fields(mut self, fields: Arc<[Field]>) -> Self {
        self.cached_fields = Some(fields);
        self
    }

    pub fn with_local_infile_stream(mut self, stream: Box<dyn Read + Send>) -> Self {
        self.local_infile_stream = Some(stream);
        self
    }

    /// Whether rows are read through a server-side cursor
    pub fn wants_cursor(&self, opts: &Opts) -> bool {
        opts.use_cursor_fetch
            && self.is_binary
            && !self.scrollable
            && self.fetch_size > 0
            && self.statement_id.is_some()
    }

    /// Request for the results that follow this one in a chain
    pub(crate) fn for_next_result(&self) -> Self {
        Self {
            is_binary: self.is_binary,
            streaming: self.streaming,
            concurrency: self.concurrency,
            scrollable: self.scrollable,
            fetch_size: self.fetch_size,
            max_rows: self.max_rows,
            statement_id: self.statement_id,
            cached_fields: None,
            local_infile_stream: None,
        }
    }
}

/// A statement prepared with COM_STMT_PREPARE
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    statement_id: u32,
    params: Arc<[Field]>,
    fields: Arc<[Field]>,
    warnings: u16,
}

impl PreparedStatement {
    pub fn id(&self) -> u32 {
        self.statement_id
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &Arc<[Field]> {
        &self.params
    }

    /// Result columns as reported at prepare time
    pub fn fields(&self) -> &Arc<[Field]> {
        &self.fields
    }

    pub fn warnings(&self) -> u16 {
        self.warnings
    }
}

/// First packet of a command response, detached from the packet buffer
enum Response {
    Update(OkPayload),
    LocalInfile(String),
    Columns(u64),
}

pub struct MysqlIo<T: Transport> {
    transport: T,
    session: ServerSession,
    opts: Opts,
    charsets: Arc<dyn CharsetLookup + Send + Sync>,
    /// Handle given to streaming and cursor sources; empty for a standalone engine
    handle: Weak<Mutex<MysqlIo<T>>>,
    packet: Payload,
    write_buffer: Vec<u8>,
    server_status: ServerStatusFlags,
    warning_count: u16,
    active_streamer: Option<u64>,
    next_streamer_id: u64,
    net_write_timeout_raised: bool,
}

impl<T: Transport> MysqlIo<T> {
    /// Engine without a shared handle. It cannot hand out streaming or cursor results.
    pub fn new(transport: T, session: ServerSession, opts: Opts) -> Self {
        Self::build(transport, session, opts, Arc::new(StaticCharsets), Weak::new())
    }

    pub fn new_shared(transport: T, session: ServerSession, opts: Opts) -> SharedIo<T> {
        Self::shared_with_charsets(transport, session, opts, Arc::new(StaticCharsets))
    }

    pub fn shared_with_charsets(
        transport: T,
        session: ServerSession,
        opts: Opts,
        charsets: Arc<dyn CharsetLookup + Send + Sync>,
    ) -> SharedIo<T> {
        Arc::new_cyclic(|handle| {
            Mutex::new(Self::build(
                transport,
                session,
                opts,
                charsets,
                handle.clone(),
            ))
        })
    }

    fn build(
        transport: T,
        session: ServerSession,
        opts: Opts,
        charsets: Arc<dyn CharsetLookup + Send + Sync>,
        handle: Weak<Mutex<MysqlIo<T>>>,
    ) -> Self {
        Self {
            transport,
            session,
            opts,
            charsets,
            handle,
            packet: Payload::new(),
            write_buffer: Vec::with_capacity(1024),
            server_status: ServerStatusFlags::empty(),
            warning_count: 0,
            active_streamer: None,
            next_streamer_id: 1,
            net_write_timeout_raised: false,
        }
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Status flags of the last OK, EOF or terminal packet
    pub fn server_status(&self) -> ServerStatusFlags {
        self.server_status
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    pub fn more_results_exist(&self) -> bool {
        self.session.supports_multi_results()
            && self
                .server_status
                .contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }

    pub fn has_active_streamer(&self) -> bool {
        self.active_streamer.is_some()
    }

    pub(crate) fn is_active_streamer(&self, id: u64) -> bool {
        self.active_streamer == Some(id)
    }

    pub(crate) fn release_streamer(&mut self, id: u64) {
        if self.active_streamer == Some(id) {
            self.active_streamer = None;
        }
    }

    fn shared_handle(&self) -> Result<SharedIo<T>> {
        self.handle.upgrade().ok_or_else(|| {
            Error::ResourceMisuse(
                "streaming and cursor results need a shared connection".to_string(),
            )
        })
    }

    /// Fail, or drain the open streaming result when clobbering is enabled
    pub fn check_for_outstanding_streaming_data(&mut self) -> Result<()> {
        let Some(id) = self.active_streamer else {
            return Ok(());
        };
        if !self.opts.clobber_streaming_results {
            return Err(Error::ProtocolViolation(
                "Streaming result set is still active. No statements may be issued when any \
                 streaming result sets are open and in use on a given connection. Ensure that \
                 you have drained or closed the streaming result before attempting more queries."
                    .to_string(),
            ));
        }
        tracing::warn!(streamer = id, "discarding the rest of an open streaming result");
        self.discard_streamer(id)?;
        self.restore_net_write_timeout()
    }

    /// Write one command packet, starting a new sequence
    pub fn send_command(&mut self, build: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        self.check_for_outstanding_streaming_data()?;
        self.write_buffer.clear();
        build(&mut self.write_buffer);
        self.transport.reset_sequence();
        self.transport.write_payload(&self.write_buffer)
    }

    #[tracing::instrument(skip_all, fields(streaming = request.streaming))]
    pub fn query(&mut self, sql: &str, mut request: ResultRequest) -> Result<ProtocolResult<T>> {
        request.is_binary = false;
        request.statement_id = None;
        self.raise_net_write_timeout(&request)?;
        self.send_command(|out| write_query(out, sql))?;
        let result = self.read_all_results(request);
        self.finish_results(result)
    }

    /// Run a statement expected to return no rows
    pub fn execute_update(&mut self, sql: &str) -> Result<UpdateResult> {
        let update = self.run_update(sql)?;
        if update.warnings > 0 {
            self.check_truncation()?;
        }
        Ok(update)
    }

    /// `execute_update` without the truncation check, for session statements
    fn run_update(&mut self, sql: &str) -> Result<UpdateResult> {
        self.send_command(|out| write_query(out, sql))?;
        let result = self.read_all_results(ResultRequest::text())?;
        match result.update_result() {
            Some(update) => Ok(update.clone()),
            None => Err(Error::ProtocolViolation(format!(
                "'{}' returned a result set",
                sql
            ))),
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.send_command(|out| write_prepare(out, sql))?;
        self.read_packet()?;
        check_error_packet(self.packet.as_bytes())?;
        let prepare_ok = *read_prepare_ok(self.packet.as_bytes())?;
        let params = self.read_definitions(usize::from(prepare_ok.num_params()))?;
        let fields = self.read_definitions(usize::from(prepare_ok.num_columns()))?;
        tracing::debug!(
            statement_id = prepare_ok.statement_id(),
            params = params.len(),
            columns = fields.len(),
            "prepared statement"
        );
        Ok(PreparedStatement {
            statement_id: prepare_ok.statement_id(),
            params,
            fields,
            warnings: prepare_ok.warning_count(),
        })
    }

    #[tracing::instrument(skip_all, fields(statement_id = statement.id()))]
    pub fn execute(
        &mut self,
        statement: &PreparedStatement,
        params: &[Value<'_>],
        mut request: ResultRequest,
    ) -> Result<ProtocolResult<T>> {
        if params.len() != statement.num_params() {
            return Err(Error::ResourceMisuse(format!(
                "statement expects {} parameters, got {}",
                statement.num_params(),
                params.len()
            )));
        }
        request.is_binary = true;
        request.statement_id = Some(statement.id());
        let cursor_type = if request.wants_cursor(&self.opts) {
            CURSOR_TYPE_READ_ONLY
        } else {
            CURSOR_TYPE_NO_CURSOR
        };
        self.raise_net_write_timeout(&request)?;
        self.send_command(|out| write_execute(out, statement.id(), cursor_type, params))?;
        let result = self.read_all_results(request);
        self.finish_results(result)
    }

    /// Check the warnings of a command's results, then restore
    /// `net_write_timeout` unless a streaming result keeps it raised
    fn finish_results(
        &mut self,
        result: Result<ProtocolResult<T>>,
    ) -> Result<ProtocolResult<T>> {
        let result = result.and_then(|result| {
            self.check_update_truncation(&result)?;
            Ok(result)
        });
        match &result {
            Err(e) if e.is_fatal() => {}
            Err(e) => {
                if let Err(restore) = self.restore_net_write_timeout() {
                    tracing::warn!(
                        error = %restore,
                        command_error = %e,
                        "failed to restore net_write_timeout"
                    );
                }
            }
            Ok(_) => self.restore_net_write_timeout()?,
        }
        result
    }

    /// COM_STMT_CLOSE; the server sends no response
    pub fn close_statement(&mut self, statement: &PreparedStatement) -> Result<()> {
        let id = statement.id();
        self.send_command(|out| write_close_statement(out, id))
    }

    /// COM_STMT_RESET, which also closes an open cursor
    pub fn reset_statement(&mut self, statement: &PreparedStatement) -> Result<()> {
        let id = statement.id();
        self.send_command(|out| write_reset_statement(out, id))?;
        self.read_ok().map(drop)
    }

    pub fn ping(&mut self) -> Result<()> {
        self.send_command(|out| write_simple_command(out, CommandByte::Ping))?;
        self.read_ok().map(drop)
    }

    pub fn reset_connection(&mut self) -> Result<()> {
        self.send_command(|out| write_simple_command(out, CommandByte::ResetConnection))?;
        self.read_ok().map(drop)
    }

    pub fn init_db(&mut self, database: &str) -> Result<()> {
        self.send_command(|out| write_init_db(out, database))?;
        self.read_ok().map(drop)
    }

    /// Read the complete response to the command just sent.
    ///
    /// Results announced by `SERVER_MORE_RESULTS_EXISTS` are linked behind the
    /// first one. A streaming result ends the chain; its successors are read
    /// once it has been drained.
    pub fn read_all_results(&mut self, mut request: ResultRequest) -> Result<ProtocolResult<T>> {
        self.read_packet()?;
        let first = self.read_result(&mut request)?;
        self.chain_results(first, &request)
    }

    /// Read the results following an exhausted streaming result
    pub(crate) fn read_more_results(
        &mut self,
        mut request: ResultRequest,
    ) -> Result<Option<ProtocolResult<T>>> {
        if !self.more_results_exist() {
            return Ok(None);
        }
        self.read_packet()?;
        let first = self.read_result(&mut request)?;
        self.chain_results(first, &request).map(Some)
    }

    fn chain_results(
        &mut self,
        first: ProtocolResult<T>,
        request: &ResultRequest,
    ) -> Result<ProtocolResult<T>> {
        let mut results = vec![first];
        while self.more_results_exist()
            && !results.last().is_some_and(ProtocolResult::is_streaming)
        {
            self.read_packet()?;
            let mut next_request = request.for_next_result();
            results.push(self.read_result(&mut next_request)?);
        }
        tracing::trace!(results = results.len(), "read result chain");

        let mut next = None;
        for mut result in results.into_iter().rev() {
            result.set_next(next);
            next = Some(result);
        }
        next.ok_or_else(|| Error::LibraryBug(eyre!("empty result chain")))
    }

    /// Interpret the packet in the buffer as the start of one result
    fn read_result(&mut self, request: &mut ResultRequest) -> Result<ProtocolResult<T>> {
        let response = match read_query_response(self.packet.as_bytes())? {
            QueryResponse::Ok(ok) => Response::Update(OkPayload::parse(ok, self.opts.read_info_msg)?),
            QueryResponse::LocalInfile { filename } => {
                Response::LocalInfile(String::from_utf8_lossy(filename).into_owned())
            }
            QueryResponse::ResultSet { column_count } => Response::Columns(column_count),
        };

        match response {
            Response::Update(ok) => Ok(ProtocolResult::update(self.record_ok(ok))),
            Response::LocalInfile(filename) => {
                let stream = request.local_infile_stream.take();
                self.handle_local_infile(&filename, stream)
                    .map(ProtocolResult::update)
            }
            Response::Columns(column_count) => self.read_result_set(column_count, request),
        }
    }

    fn record_ok(&mut self, ok: OkPayload) -> UpdateResult {
        self.server_status = ok.status_flags;
        self.warning_count = ok.warnings;
        UpdateResult::from(ok)
    }

    /// Send the requested file and read the server's verdict. A local failure
    /// is reported after the server response has been consumed.
    fn handle_local_infile(
        &mut self,
        filename: &str,
        stream: Option<Box<dyn Read + Send>>,
    ) -> Result<UpdateResult> {
        let local = send_local_infile(
            &mut self.transport,
            filename,
            &self.opts,
            self.session.max_allowed_packet,
            stream,
        );
        if let Err(e @ Error::Communication { .. }) = local {
            return Err(e);
        }

        self.read_packet()?;
        let payload = self.packet.as_bytes();
        let response = check_error_packet(payload)
            .and_then(|()| OkPayload::parse(OkPayloadBytes(payload), self.opts.read_info_msg));
        let response = response.map(|ok| self.record_ok(ok));
        if let Err(e) = local {
            tracing::debug!(error = %e, "local infile failed after the server answered");
            return Err(e);
        }
        response
    }

    fn read_result_set(
        &mut self,
        column_count: u64,
        request: &mut ResultRequest,
    ) -> Result<ProtocolResult<T>> {
        let count = usize::try_from(column_count).map_err(|_| Error::InvalidPacket)?;
        let fields = self.read_fields(count, request.cached_fields.take())?;

        let wants_cursor = request.wants_cursor(&self.opts);
        if !self.session.is_eof_deprecated() || wants_cursor {
            self.read_packet()?;
            check_error_packet(self.packet.as_bytes())?;
            self.consume_terminal()?;
        }

        let cursor_statement = request.statement_id.filter(|_| {
            wants_cursor
                && self
                    .server_status
                    .contains(ServerStatusFlags::SERVER_STATUS_CURSOR_EXISTS)
                && self.session.supports_cursors()
        });
        if let Some(statement_id) = cursor_statement {
            tracing::debug!(statement_id, fetch_size = request.fetch_size, "using server cursor");
            let rows = CursorRows::new(
                self.shared_handle()?,
                Arc::clone(&fields),
                statement_id,
                request.fetch_size,
            );
            return Ok(ProtocolResult::rows(fields, ResultSetRows::Cursor(rows)));
        }

        if request.streaming {
            let handle = self.shared_handle()?;
            let id = self.next_streamer_id;
            self.next_streamer_id += 1;
            self.active_streamer = Some(id);
            let rows = StreamingRows::new(
                handle,
                Arc::clone(&fields),
                request.is_binary,
                id,
                request.for_next_result(),
            );
            return Ok(ProtocolResult::rows(fields, ResultSetRows::Streaming(rows)));
        }

        let rows = self.read_static_rows(&fields, request)?;
        Ok(ProtocolResult::rows(
            fields,
            ResultSetRows::Static(StaticRows::new(rows)),
        ))
    }

    /// Read `count` column definitions; with matching cached definitions the
    /// packets are only skipped
    fn read_fields(&mut self, count: usize, cached: Option<Arc<[Field]>>) -> Result<Arc<[Field]>> {
        if let Some(cached) = cached.filter(|cached| cached.len() == count) {
            for _ in 0..count {
                self.read_packet()?;
                check_error_packet(self.packet.as_bytes())?;
            }
            return Ok(cached);
        }

        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            self.read_packet()?;
            check_error_packet(self.packet.as_bytes())?;
            let ctx = FieldContext {
                session: &self.session,
                opts: &self.opts,
                charsets: &*self.charsets,
            };
            fields.push(Field::unpack(&mut self.packet, &ctx)?);
        }
        Ok(fields.into())
    }

    /// Parameter or column definitions of a prepare response
    fn read_definitions(&mut self, count: usize) -> Result<Arc<[Field]>> {
        if count == 0 {
            return Ok(Arc::from(Vec::new()));
        }
        let fields = self.read_fields(count, None)?;
        if !self.session.is_eof_deprecated() {
            self.read_packet()?;
            check_error_packet(self.packet.as_bytes())?;
        }
        Ok(fields)
    }

    fn read_static_rows(
        &mut self,
        fields: &[Field],
        request: &ResultRequest,
    ) -> Result<Vec<OwnedRow>> {
        let row_request = RowRequest::new(fields, request.is_binary, request.concurrency, false);
        let mut rows = Vec::new();
        let mut discarded = 0u64;
        while let Some(row) = self.next_row(&row_request)? {
            if request.max_rows.is_none_or(|max| rows.len() < max) {
                rows.push(row.into_owned_row());
            } else {
                discarded += 1;
            }
        }
        if discarded > 0 {
            tracing::debug!(kept = rows.len(), discarded, "row limit reached");
        }
        Ok(rows)
    }

    /// Read the next row of the current result, `None` at its terminal packet.
    ///
    /// Small read-only text rows are decoded directly from the socket into an
    /// owned row. Everything else is read as a whole packet first; the row then
    /// borrows the packet buffer when `may_reuse_packet` allows it.
    pub fn next_row(&mut self, request: &RowRequest<'_>) -> Result<Option<DecodedRow<'_>>> {
        let length = self.transport.read_header()?.length();
        if request.use_fast_path()
            && length < MAX_PACKET_PAYLOAD
            && length <= self.opts.large_row_size_threshold
        {
            return Ok(self
                .next_row_fast(length, request.fields)?
                .map(DecodedRow::Owned));
        }

        self.packet.reset();
        self.transport.read_payload(length, self.packet.buffer_mut())?;
        self.decode_buffered_row(request)
    }

    fn decode_buffered_row(&mut self, request: &RowRequest<'_>) -> Result<Option<DecodedRow<'_>>> {
        let Some(&first) = self.packet.as_bytes().first() else {
            return Err(Error::UnexpectedEof);
        };
        if first == ERR_HEADER {
            return Err(ErrPayloadBytes(self.packet.as_bytes()).into());
        }
        if is_terminal(first, self.packet.len()) {
            self.consume_terminal()?;
            return Ok(None);
        }

        let data = self.packet.as_bytes();
        let cells = if request.is_binary {
            binary_cells(data, request.fields)?
        } else {
            text_cells(data, request.fields.len())?
        };
        let row = BorrowedRow::new(data, cells, request.is_binary);
        if request.may_reuse_packet && request.concurrency == Concurrency::ReadOnly {
            Ok(Some(DecodedRow::Borrowed(row)))
        } else {
            Ok(Some(DecodedRow::Owned(row.to_owned_row())))
        }
    }

    /// Decode a text row cell by cell from the transport
    fn next_row_fast(&mut self, length: usize, fields: &[Field]) -> Result<Option<OwnedRow>> {
        if length == 0 {
            return Err(Error::ProtocolViolation("empty row packet".to_string()));
        }
        let mut lead = [0u8; 1];
        self.transport.read_exact(&mut lead)?;
        let first = lead[0];

        if first == ERR_HEADER || is_terminal(first, length) {
            self.packet.reset();
            self.packet.buffer_mut().push(first);
            self.transport
                .read_payload(length - 1, self.packet.buffer_mut())?;
            if first == ERR_HEADER {
                return Err(ErrPayloadBytes(self.packet.as_bytes()).into());
            }
            self.consume_terminal()?;
            return Ok(None);
        }

        let mut remaining = length - 1;
        let mut cells = Vec::with_capacity(fields.len());
        let mut next_byte = Some(first);
        for _ in fields {
            let byte = match next_byte.take() {
                Some(byte) => byte,
                None => {
                    let mut buf = [0u8; 1];
                    self.read_row_bytes(&mut buf, &mut remaining)?;
                    buf[0]
                }
            };
            if byte == NULL_MARKER {
                cells.push(None);
                continue;
            }
            if byte == ERR_HEADER {
                return Err(Error::InvalidPacket);
            }

            let extra = lenenc_extra_bytes(byte);
            let len = if extra == 0 {
                u64::from(byte)
            } else {
                let mut buf = [0u8; 8];
                self.read_row_bytes(&mut buf[..extra], &mut remaining)?;
                u64::from_le_bytes(buf)
            };
            let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
            let mut cell = vec![0u8; len];
            self.read_row_bytes(&mut cell, &mut remaining)?;
            cells.push(Some(cell));
        }

        if remaining > 0 {
            tracing::warn!(remaining, "row packet longer than its cells");
            let mut rest = vec![0u8; remaining];
            self.transport.read_exact(&mut rest)?;
        }
        Ok(Some(OwnedRow::new(cells, false)))
    }

    fn read_row_bytes(&mut self, buf: &mut [u8], remaining: &mut usize) -> Result<()> {
        if buf.len() > *remaining {
            return Err(Error::ProtocolViolation(format!(
                "row cell of {} bytes overruns its packet ({} bytes left)",
                buf.len(),
                remaining
            )));
        }
        self.transport.read_exact(buf)?;
        *remaining -= buf.len();
        Ok(())
    }

    /// Close a streaming result: discard its rows and the results after it,
    /// then restore `net_write_timeout`
    pub fn close_streamer(&mut self, id: u64) -> Result<()> {
        if self.active_streamer == Some(id) {
            self.discard_streamer(id)?;
        }
        self.restore_net_write_timeout()
    }

    fn discard_streamer(&mut self, id: u64) -> Result<()> {
        self.active_streamer = None;
        let rows = self.drain_rows()?;
        tracing::debug!(streamer = id, rows, "discarded streaming rows");
        self.discard_remaining_results()
    }

    fn raise_net_write_timeout(&mut self, request: &ResultRequest) -> Result<()> {
        let timeout = self.opts.net_timeout_for_streaming_results;
        if !request.streaming || timeout == 0 || request.wants_cursor(&self.opts) {
            return Ok(());
        }
        self.run_update(&format!("SET net_write_timeout={}", timeout))?;
        self.net_write_timeout_raised = true;
        Ok(())
    }

    pub(crate) fn restore_net_write_timeout(&mut self) -> Result<()> {
        if !self.net_write_timeout_raised || self.active_streamer.is_some() {
            return Ok(());
        }
        self.net_write_timeout_raised = false;
        let sql = format!(
            "SET net_write_timeout={}",
            self.opts.default_net_write_timeout
        );
        self.run_update(&sql).map(drop)
    }

    /// Read rows up to and including the terminal packet
    fn drain_rows(&mut self) -> Result<u64> {
        let mut rows = 0;
        loop {
            self.read_packet()?;
            let first = self.packet.u8_at(0)?;
            if first == ERR_HEADER {
                return Err(ErrPayloadBytes(self.packet.as_bytes()).into());
            }
            if is_terminal(first, self.packet.len()) {
                self.consume_terminal()?;
                return Ok(rows);
            }
            rows += 1;
        }
    }

    fn discard_remaining_results(&mut self) -> Result<()> {
        while self.more_results_exist() {
            self.read_packet()?;
            match read_query_response(self.packet.as_bytes())? {
                QueryResponse::Ok(ok) => {
                    let ok = OkPayload::parse(ok, false)?;
                    self.record_ok(ok);
                }
                QueryResponse::LocalInfile { .. } => {
                    self.transport.write_payload(&[])?;
                    self.read_ok()?;
                }
                QueryResponse::ResultSet { column_count } => {
                    let count = usize::try_from(column_count).map_err(|_| Error::InvalidPacket)?;
                    let metadata_packets = if self.session.is_eof_deprecated() {
                        count
                    } else {
                        count + 1
                    };
                    for _ in 0..metadata_packets {
                        self.read_packet()?;
                        check_error_packet(self.packet.as_bytes())?;
                    }
                    self.drain_rows()?;
                }
            }
        }
        Ok(())
    }

    /// Fetch the next batch of a server cursor. Returns the rows and whether
    /// the server sent the last one.
    pub fn fetch_cursor_rows(
        &mut self,
        statement_id: u32,
        fetch_size: u32,
        fields: &[Field],
    ) -> Result<(Vec<OwnedRow>, bool)> {
        self.send_command(|out| write_fetch(out, statement_id, fetch_size))?;
        let request = RowRequest::new(fields, true, Concurrency::ReadOnly, false);
        let mut rows = Vec::new();
        while let Some(row) = self.next_row(&request)? {
            rows.push(row.into_owned_row());
        }
        let last_row_sent = rows.is_empty()
            || self
                .server_status
                .contains(ServerStatusFlags::SERVER_STATUS_LAST_ROW_SENT);
        tracing::trace!(statement_id, rows = rows.len(), last_row_sent, "fetched cursor rows");
        Ok((rows, last_row_sent))
    }

    /// Any update result of the chain read so far reporting warnings triggers
    /// one check; the server keeps the warnings of the last statement only
    fn check_update_truncation(&mut self, result: &ProtocolResult<T>) -> Result<()> {
        let warned = result
            .chain()
            .filter_map(ProtocolResult::update_result)
            .any(|update| update.warnings > 0);
        if warned { self.check_truncation() } else { Ok(()) }
    }

    /// Turn data truncation warnings of the last statement into an error
    pub fn check_truncation(&mut self) -> Result<()> {
        if !self.opts.jdbc_compliant_truncation || self.active_streamer.is_some() {
            return Ok(());
        }
        self.send_command(|out| write_query(out, "SHOW WARNINGS"))?;
        let mut result = self.read_all_results(ResultRequest::text())?;
        let Some(rows) = result.rows_mut() else {
            return Ok(());
        };
        for row in rows.collect_rows()? {
            let code = row
                .get(1)
                .and_then(|code| simdutf8::basic::from_utf8(code).ok())
                .and_then(|code| code.parse::<u16>().ok());
            let message = row
                .get(2)
                .map(|message| String::from_utf8_lossy(message).into_owned())
                .unwrap_or_default();
            match code {
                Some(code @ (WARN_DATA_OUT_OF_RANGE | WARN_DATA_TRUNCATED)) => {
                    return Err(Error::DataTruncation { code, message });
                }
                code => tracing::debug!(?code, %message, "server warning"),
            }
        }
        Ok(())
    }

    fn read_packet(&mut self) -> Result<()> {
        self.packet.reset();
        let header = self.transport.read_header()?;
        self.transport
            .read_payload(header.length(), self.packet.buffer_mut())
    }

    fn read_ok(&mut self) -> Result<UpdateResult> {
        self.read_packet()?;
        check_error_packet(self.packet.as_bytes())?;
        let ok = OkPayload::parse(OkPayloadBytes(self.packet.as_bytes()), self.opts.read_info_msg)?;
        Ok(self.record_ok(ok))
    }

    fn consume_terminal(&mut self) -> Result<TerminalStatus> {
        let status = read_terminal(self.packet.as_bytes(), self.session.is_eof_deprecated())?;
        self.server_status = status.status_flags;
        self.warning_count = status.warnings;
        Ok(status)
    }
}

/// Cell ranges of a text row
fn text_cells(data: &[u8], count: usize) -> Result<Vec<Option<Range<usize>>>> {
    let mut cells = Vec::with_capacity(count);
    let mut pos = 0;
    for _ in 0..count {
        let rest = data.get(pos..).ok_or(Error::UnexpectedEof)?;
        let (len, after) = read_int_lenenc_nullable(rest)?;
        pos += rest.len() - after.len();
        match len {
            None => cells.push(None),
            Some(len) => {
                let len = usize::try_from(len).map_err(|_| Error::InvalidPacket)?;
                let end = pos.checked_add(len).ok_or(Error::InvalidPacket)?;
                if end > data.len() {
                    return Err(Error::UnexpectedEof);
                }
                cells.push(Some(pos..end));
                pos = end;
            }
        }
    }
    Ok(cells)
}

/// Cell ranges of a binary row: 0x00 header, null bitmap, then the non-NULL cells
fn binary_cells(data: &[u8], fields: &[Field]) -> Result<Vec<Option<Range<usize>>>> {
    let bitmap_end = 1 + NullBitmap::result_set_len(fields.len());
    let bitmap = NullBitmap::for_result_set(data.get(1..bitmap_end).ok_or(Error::UnexpectedEof)?);
    let mut cells = Vec::with_capacity(fields.len());
    let mut pos = bitmap_end;
    for (index, field) in fields.iter().enumerate() {
        if bitmap.is_null(index) {
            cells.push(None);
            continue;
        }
        let rest = data.get(pos..).ok_or(Error::UnexpectedEof)?;
        let (prefix, len) = binary_cell_len(field.wire_type(), rest)?;
        let start = pos + prefix;
        let end = start + len;
        if end > data.len() {
            return Err(Error::UnexpectedEof);
        }
        cells.push(Some(start..end));
        pos = end;
    }
    Ok(cells)
}
