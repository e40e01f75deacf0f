use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::charset::CharsetLookup;
use crate::constant::ServerStatusFlags;
use crate::error::Result;
use crate::io::{MysqlIo, PreparedStatement, ResultRequest, SharedIo, lock_io};
use crate::opts::Opts;
use crate::protocol::transport::{PacketStream, Transport};
use crate::protocol::value::Value;
use crate::resultset::{ProtocolResult, UpdateResult};
use crate::session::ServerSession;

/// A blocking MySQL connection
///
/// The connection is handed over after the handshake: `session` carries what
/// the server and client agreed on. Cloning a `Conn` yields another handle to
/// the same connection.
pub struct Conn<T: Transport = PacketStream<TcpStream>> {
    io: SharedIo<T>,
}

impl<T: Transport> Clone for Conn<T> {
    fn clone(&self) -> Self {
        Self {
            io: Arc::clone(&self.io),
        }
    }
}

impl<S: Read + Write> Conn<PacketStream<S>> {
    /// Wrap an authenticated byte stream
    pub fn with_stream(stream: S, session: ServerSession, opts: Opts) -> Self {
        Self::new(PacketStream::new(stream), session, opts)
    }
}

impl<T: Transport> Conn<T> {
    pub fn new(transport: T, session: ServerSession, opts: Opts) -> Self {
        Self {
            io: MysqlIo::new_shared(transport, session, opts),
        }
    }

    /// Use a custom collation table
    pub fn with_charsets(
        transport: T,
        session: ServerSession,
        opts: Opts,
        charsets: Arc<dyn CharsetLookup + Send + Sync>,
    ) -> Self {
        Self {
            io: MysqlIo::shared_with_charsets(transport, session, opts, charsets),
        }
    }

    /// The protocol engine behind this connection
    pub fn io(&self) -> &SharedIo<T> {
        &self.io
    }

    pub fn server_status(&self) -> Result<ServerStatusFlags> {
        Ok(lock_io(&self.io)?.server_status())
    }

    pub fn warning_count(&self) -> Result<u16> {
        Ok(lock_io(&self.io)?.warning_count())
    }

    /// Execute a text query and read every result into memory
    pub fn query(&self, sql: &str) -> Result<ProtocolResult<T>> {
        self.query_with(sql, ResultRequest::text())
    }

    /// Execute a text query whose rows are pulled one at a time.
    ///
    /// The connection refuses other commands until the returned result has
    /// been drained or dropped.
    pub fn query_streaming(&self, sql: &str) -> Result<ProtocolResult<T>> {
        self.query_with(sql, ResultRequest::text().with_streaming())
    }

    pub fn query_with(&self, sql: &str, request: ResultRequest) -> Result<ProtocolResult<T>> {
        lock_io(&self.io)?.query(sql, request)
    }

    /// Execute a statement that returns no rows
    pub fn query_drop(&self, sql: &str) -> Result<UpdateResult> {
        lock_io(&self.io)?.execute_update(sql)
    }

    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        lock_io(&self.io)?.prepare(sql)
    }

    pub fn execute(
        &self,
        statement: &PreparedStatement,
        params: &[Value<'_>],
    ) -> Result<ProtocolResult<T>> {
        self.execute_with(statement, params, ResultRequest::binary(statement.id()))
    }

    pub fn execute_with(
        &self,
        statement: &PreparedStatement,
        params: &[Value<'_>],
        request: ResultRequest,
    ) -> Result<ProtocolResult<T>> {
        lock_io(&self.io)?.execute(statement, params, request)
    }

    pub fn close_statement(&self, statement: &PreparedStatement) -> Result<()> {
        lock_io(&self.io)?.close_statement(statement)
    }

    pub fn ping(&self) -> Result<()> {
        lock_io(&self.io)?.ping()
    }

    pub fn reset(&self) -> Result<()> {
        lock_io(&self.io)?.reset_connection()
    }

    pub fn select_db(&self, database: &str) -> Result<()> {
        lock_io(&self.io)?.init_db(database)
    }
}
