//! Results of a command: update counts and row sources, chained for
//! multi-statement queries and stored procedures.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result};
use crate::io::{ResultRequest, RowRequest, SharedIo, lock_io};
use crate::protocol::field::Field;
use crate::protocol::response::OkPayload;
use crate::protocol::row::{DecodedRow, OwnedRow};
use crate::protocol::transport::Transport;

/// Whether rows may be modified through the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    ReadOnly,
    Updatable,
}

/// Outcome of a statement that returned no rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
    pub info: Option<String>,
}

impl From<OkPayload> for UpdateResult {
    fn from(ok: OkPayload) -> Self {
        Self {
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            status_flags: ok.status_flags,
            warnings: ok.warnings,
            info: ok.info,
        }
    }
}

pub enum ResultKind<T: Transport> {
    Update(UpdateResult),
    Rows {
        fields: Arc<[Field]>,
        rows: ResultSetRows<T>,
    },
}

/// One result of a command, linked to the results that followed it
pub struct ProtocolResult<T: Transport> {
    kind: ResultKind<T>,
    next: Option<Box<ProtocolResult<T>>>,
}

impl<T: Transport> std::fmt::Debug for ProtocolResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("ProtocolResult");
        match &self.kind {
            ResultKind::Update(update) => out.field("update", update),
            ResultKind::Rows { fields, rows } => {
                let source = match rows {
                    ResultSetRows::Static(_) => "static",
                    ResultSetRows::Streaming(_) => "streaming",
                    ResultSetRows::Cursor(_) => "cursor",
                };
                out.field("columns", &fields.len()).field("rows", &source)
            }
        };
        out.field("has_next", &self.next.is_some()).finish()
    }
}

impl<T: Transport> ProtocolResult<T> {
    pub fn update(result: UpdateResult) -> Self {
        Self {
            kind: ResultKind::Update(result),
            next: None,
        }
    }

    pub fn rows(fields: Arc<[Field]>, rows: ResultSetRows<T>) -> Self {
        Self {
            kind: ResultKind::Rows { fields, rows },
            next: None,
        }
    }

    pub(crate) fn set_next(&mut self, next: Option<ProtocolResult<T>>) {
        self.next = next.map(Box::new);
    }

    pub fn kind(&self) -> &ResultKind<T> {
        &self.kind
    }

    pub fn into_kind(self) -> ResultKind<T> {
        self.kind
    }

    pub fn update_result(&self) -> Option<&UpdateResult> {
        match &self.kind {
            ResultKind::Update(update) => Some(update),
            ResultKind::Rows { .. } => None,
        }
    }

    pub fn fields(&self) -> Option<&Arc<[Field]>> {
        match &self.kind {
            ResultKind::Rows { fields, .. } => Some(fields),
            ResultKind::Update(_) => None,
        }
    }

    pub fn rows_mut(&mut self) -> Option<&mut ResultSetRows<T>> {
        match &mut self.kind {
            ResultKind::Rows { rows, .. } => Some(rows),
            ResultKind::Update(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(
            self.kind,
            ResultKind::Rows {
                rows: ResultSetRows::Streaming(_),
                ..
            }
        )
    }

    /// This result followed by the results already linked behind it
    pub fn chain(&self) -> impl Iterator<Item = &ProtocolResult<T>> {
        std::iter::successors(Some(self), |result| result.next.as_deref())
    }

    /// Close the rows of this result and of every result linked after it
    pub fn close(&mut self) -> Result<()> {
        if let ResultKind::Rows { rows, .. } = &mut self.kind {
            rows.close()?;
        }
        match self.next.take() {
            Some(mut next) => next.close(),
            None => Ok(()),
        }
    }

    /// Whether a following result is already linked. A streaming result only
    /// learns about its successors once drained.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Detach the following result.
    ///
    /// An open streaming source is drained first, which reads the results the
    /// server sent after it.
    pub fn take_next(&mut self) -> Result<Option<ProtocolResult<T>>> {
        if let ResultKind::Rows {
            rows: ResultSetRows::Streaming(stream),
            ..
        } = &mut self.kind
        {
            stream.drain()?;
            if let Some(next) = stream.take_next_result() {
                return Ok(Some(next));
            }
        }
        Ok(self.next.take().map(|next| *next))
    }
}

/// A source of rows
pub enum ResultSetRows<T: Transport> {
    Static(StaticRows),
    Streaming(StreamingRows<T>),
    Cursor(CursorRows<T>),
}

impl<T: Transport> ResultSetRows<T> {
    /// Next row, `None` once the source is exhausted
    pub fn next(&mut self) -> Result<Option<OwnedRow>> {
        match self {
            ResultSetRows::Static(rows) => rows.next().map(|row| row.cloned()),
            ResultSetRows::Streaming(rows) => rows.next(),
            ResultSetRows::Cursor(rows) => rows.next(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            ResultSetRows::Static(rows) => {
                rows.close();
                Ok(())
            }
            ResultSetRows::Streaming(rows) => rows.close(),
            ResultSetRows::Cursor(rows) => {
                rows.close();
                Ok(())
            }
        }
    }

    /// Rows are pulled from the server on demand
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, ResultSetRows::Static(_))
    }

    /// Read every remaining row
    pub fn collect_rows(&mut self) -> Result<Vec<OwnedRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn closed_error() -> Error {
    Error::ResourceMisuse("Operation not allowed after ResultSet closed".to_string())
}

// ============================================================================
// Static
// ============================================================================

/// Rows read in full, replayable
#[derive(Debug, Clone, Default)]
pub struct StaticRows {
    rows: Vec<OwnedRow>,
    /// index of the next row
    cursor: usize,
    closed: bool,
}

impl StaticRows {
    pub fn new(rows: Vec<OwnedRow>) -> Self {
        Self {
            rows,
            cursor: 0,
            closed: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<&OwnedRow>> {
        if self.closed {
            return Err(closed_error());
        }
        let row = self.rows.get(self.cursor);
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    /// Restart from the first row
    pub fn before_first(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&OwnedRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[OwnedRow] {
        &self.rows
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.rows = Vec::new();
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Exhausted,
    Closed,
    Failed,
}

/// Rows pulled from the connection one at a time.
///
/// While open, the connection accepts no other command. Dropping the source
/// closes it, which reads and discards the rest of the response.
pub struct StreamingRows<T: Transport> {
    io: SharedIo<T>,
    fields: Arc<[Field]>,
    is_binary: bool,
    streamer_id: u64,
    next_request: ResultRequest,
    state: StreamState,
    next_result: Option<Box<ProtocolResult<T>>>,
    more_results_existed: bool,
    rows_read: u64,
}

enum Pulled<R> {
    Row(R),
    End,
    Failed(Error),
}

impl<T: Transport> StreamingRows<T> {
    pub(crate) fn new(
        io: SharedIo<T>,
        fields: Arc<[Field]>,
        is_binary: bool,
        streamer_id: u64,
        next_request: ResultRequest,
    ) -> Self {
        Self {
            io,
            fields,
            is_binary,
            streamer_id,
            next_request,
            state: StreamState::Open,
            next_result: None,
            more_results_existed: false,
            rows_read: 0,
        }
    }

    pub fn next(&mut self) -> Result<Option<OwnedRow>> {
        self.pull(false, |row| row.into_owned_row())
    }

    /// Decode the next row in place; the row borrows the connection's packet
    /// buffer and is only valid inside `f`
    pub fn process_next<R>(&mut self, f: impl FnOnce(&DecodedRow<'_>) -> R) -> Result<Option<R>> {
        self.pull(true, |row| f(&row))
    }

    fn pull<R>(&mut self, reuse: bool, f: impl FnOnce(DecodedRow<'_>) -> R) -> Result<Option<R>> {
        match self.state {
            StreamState::Open => {}
            StreamState::Exhausted | StreamState::Closed | StreamState::Failed => {
                return Err(closed_error());
            }
        }

        let io = Arc::clone(&self.io);
        let mut io = lock_io(&io)?;
        if !io.is_active_streamer(self.streamer_id) {
            self.state = StreamState::Closed;
            return Err(Error::ResourceMisuse(
                "Streaming result was discarded by a later command".to_string(),
            ));
        }

        let concurrency = self.next_request.concurrency;
        let request = RowRequest::new(&self.fields, self.is_binary, concurrency, reuse);
        let pulled = match io.next_row(&request) {
            Ok(Some(row)) => Pulled::Row(f(row)),
            Ok(None) => Pulled::End,
            Err(e) => Pulled::Failed(e),
        };

        match pulled {
            Pulled::Row(r) => {
                self.rows_read += 1;
                Ok(Some(r))
            }
            Pulled::End => {
                self.state = StreamState::Exhausted;
                io.release_streamer(self.streamer_id);
                tracing::debug!(rows = self.rows_read, "streaming result exhausted");
                if io.more_results_exist() {
                    self.more_results_existed = true;
                    let request = self.next_request.for_next_result();
                    self.next_result = io.read_more_results(request)?.map(Box::new);
                }
                Ok(None)
            }
            Pulled::Failed(e) => {
                self.state = StreamState::Failed;
                io.release_streamer(self.streamer_id);
                Err(e)
            }
        }
    }

    /// Read the remaining rows, keeping the results that follow
    pub fn drain(&mut self) -> Result<()> {
        while self.state == StreamState::Open {
            self.pull(true, |_| ())?;
        }
        Ok(())
    }

    /// Discard the remaining rows and any results that follow
    pub fn close(&mut self) -> Result<()> {
        let was_open = self.state == StreamState::Open;
        if matches!(self.state, StreamState::Open | StreamState::Exhausted) {
            self.state = StreamState::Closed;
        }
        // results pulled in when the rows ran out; closed before taking the lock
        if let Some(mut next) = self.next_result.take() {
            next.close()?;
        }
        let io = Arc::clone(&self.io);
        let mut io = lock_io(&io)?;
        if was_open {
            io.close_streamer(self.streamer_id)
        } else {
            io.restore_net_write_timeout()
        }
    }

    /// Whether the server announced further results when this source ran out
    pub fn more_results_existed(&self) -> bool {
        self.more_results_existed
    }

    pub fn is_exhausted(&self) -> bool {
        self.state != StreamState::Open
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn fields(&self) -> &Arc<[Field]> {
        &self.fields
    }

    pub(crate) fn take_next_result(&mut self) -> Option<ProtocolResult<T>> {
        self.next_result.take().map(|next| *next)
    }
}

impl<T: Transport> Drop for StreamingRows<T> {
    fn drop(&mut self) {
        if self.state == StreamState::Closed || self.state == StreamState::Failed {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close streaming result");
        }
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Rows of a server-side cursor, fetched `fetch_size` at a time
pub struct CursorRows<T: Transport> {
    io: SharedIo<T>,
    fields: Arc<[Field]>,
    statement_id: u32,
    fetch_size: u32,
    buffer: VecDeque<OwnedRow>,
    last_row_sent: bool,
    closed: bool,
}

impl<T: Transport> CursorRows<T> {
    pub(crate) fn new(io: SharedIo<T>, fields: Arc<[Field]>, statement_id: u32, fetch_size: u32) -> Self {
        Self {
            io,
            fields,
            statement_id,
            fetch_size,
            buffer: VecDeque::new(),
            last_row_sent: false,
            closed: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<OwnedRow>> {
        if self.closed {
            return Err(closed_error());
        }
        if self.buffer.is_empty() && !self.last_row_sent {
            let mut io = lock_io(&self.io)?;
            let (rows, last_row_sent) =
                io.fetch_cursor_rows(self.statement_id, self.fetch_size, &self.fields)?;
            self.buffer.extend(rows);
            self.last_row_sent = last_row_sent;
        }
        Ok(self.buffer.pop_front())
    }

    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_rows_replay() {
        let rows = vec![
            OwnedRow::new(vec![Some(b"1".to_vec())], false),
            OwnedRow::new(vec![None], false),
        ];
        let mut source = StaticRows::new(rows);
        assert_eq!(source.len(), 2);
        assert_eq!(source.next().unwrap().unwrap().cells(), &[Some(b"1".to_vec())]);
        assert_eq!(source.next().unwrap().unwrap().cells(), &[None]);
        assert!(source.next().unwrap().is_none());

        source.before_first();
        assert!(source.next().unwrap().is_some());

        source.close();
        assert!(matches!(source.next(), Err(Error::ResourceMisuse(_))));
    }

    #[test]
    fn test_update_result_from_ok() {
        let ok = OkPayload {
            affected_rows: 5,
            last_insert_id: 42,
            status_flags: ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT,
            warnings: 0,
            info: None,
        };
        let update = UpdateResult::from(ok);
        assert_eq!(update.affected_rows, 5);
        assert_eq!(update.last_insert_id, 42);
    }
}
