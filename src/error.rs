use std::time::Duration;

use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

/// SQL state reported for transport-level failures.
pub const SQL_STATE_COMMUNICATION_LINK_FAILURE: &str = "08S01";

/// SQL state reported for driver-side failures without a more specific state.
pub const SQL_STATE_GENERAL_ERROR: &str = "HY000";

/// SQL state reported for data truncation warnings turned into errors.
pub const SQL_STATE_DATA_TRUNCATION: &str = "01004";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error(
        "Communications link failure: {source} (last packet sent {} ms ago, last packet received {} ms ago)",
        .last_sent.as_millis(),
        .last_received.as_millis()
    )]
    Communication {
        #[source]
        source: std::io::Error,
        last_sent: Duration,
        last_received: Duration,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Resource misuse: {0}")]
    ResourceMisuse(String),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("LOAD DATA LOCAL INFILE failed: {0}")]
    LocalInfile(String),

    #[error("Data truncation (warning {code}): {message}")]
    DataTruncation { code: u16, message: String },

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl Error {
    /// Vendor error code: the server's code for server errors, 0 otherwise
    pub fn vendor_code(&self) -> u16 {
        match self {
            Error::ServerError(err) => err.error_code,
            Error::DataTruncation { code, .. } => *code,
            _ => 0,
        }
    }

    /// Five-character SQL state
    pub fn sql_state(&self) -> &str {
        match self {
            Error::ServerError(err) if !err.sql_state.is_empty() => &err.sql_state,
            Error::Communication { .. } => SQL_STATE_COMMUNICATION_LINK_FAILURE,
            Error::DataTruncation { .. } => SQL_STATE_DATA_TRUNCATION,
            _ => SQL_STATE_GENERAL_ERROR,
        }
    }

    /// Whether the connection's input stream must be assumed contaminated
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Communication { .. }
                | Error::ProtocolViolation(_)
                | Error::UnexpectedEof
                | Error::InvalidPacket
                | Error::LibraryBug(_)
        )
    }

    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(eyre!("{:?}", err))
    }
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
