//! MySQL client protocol: packet framing, column metadata, row decoding and
//! result materialization over an established connection.

pub mod charset;
pub mod constant;
pub mod error;
pub mod io;
mod opts;
pub mod protocol;
pub mod resultset;
pub mod session;
#[cfg(feature = "sync")]
pub mod sync;

pub use opts::Opts;
