//! Client side of `LOAD DATA LOCAL INFILE`.
//!
//! The server answers the query with a file name; the client streams the file
//! back as raw packets and ends it with an empty packet. The empty packet is
//! sent on every path, including refusals and read failures, so the server
//! always gets to send its final response.

use std::fs::File;
use std::io::Read;

use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::transport::Transport;

const CHUNK_ALIGNMENT: usize = 4096;

/// Packet header and slack reserved out of `max_allowed_packet`
const PACKET_OVERHEAD: usize = 16;

/// Bytes of file data per packet: `max_allowed_packet - 16` rounded down to a
/// multiple of 4096, or the unrounded budget when that is below 4096
pub fn local_infile_chunk_size(max_allowed_packet: usize) -> usize {
    let budget = max_allowed_packet.saturating_sub(PACKET_OVERHEAD);
    let aligned = budget - budget % CHUNK_ALIGNMENT;
    if aligned == 0 { budget.max(1) } else { aligned }
}

/// Open the file (or `file:` URL) the server asked for
pub fn open_local_infile(filename: &str, opts: &Opts) -> Result<Box<dyn Read + Send>> {
    let path = if opts.allow_url_in_local_infile && filename.contains(':') {
        match url::Url::parse(filename) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().map_err(|()| {
                Error::LocalInfile(format!("invalid file URL '{}'", filename))
            })?,
            Ok(url) => {
                return Err(Error::LocalInfile(format!(
                    "unsupported URL scheme '{}' for '{}'",
                    url.scheme(),
                    filename
                )));
            }
            // e.g. a Windows path like C:\data.csv
            Err(_) => filename.into(),
        }
    } else {
        filename.into()
    };

    let file = File::open(&path).map_err(|e| {
        Error::LocalInfile(format!("unable to open '{}': {}", path.display(), e))
    })?;
    Ok(Box::new(file))
}

/// Answer a LOCAL INFILE request.
///
/// Uses `stream` when the caller substituted one, otherwise opens `filename`.
/// Returns the local failure, if any, after the terminating empty packet has
/// been written. The server response is left for the caller to read.
#[tracing::instrument(skip_all, fields(filename = %filename))]
pub fn send_local_infile<T: Transport + ?Sized>(
    transport: &mut T,
    filename: &str,
    opts: &Opts,
    max_allowed_packet: usize,
    stream: Option<Box<dyn Read + Send>>,
) -> Result<()> {
    let result = if !opts.allow_load_local_infile {
        Err(Error::LocalInfile(
            "LOAD DATA LOCAL INFILE is disabled (allowLoadLocalInfile=false)".to_string(),
        ))
    } else {
        let reader = match stream {
            Some(reader) => Ok(reader),
            None => open_local_infile(filename, opts),
        };
        match reader {
            Ok(mut reader) => {
                stream_chunks(transport, &mut reader, local_infile_chunk_size(max_allowed_packet))
            }
            Err(e) => Err(e),
        }
    };

    // a communication failure while streaming leaves nothing to terminate
    if let Err(e @ Error::Communication { .. }) = result {
        return Err(e);
    }
    transport.write_payload(&[])?;
    result
}

fn stream_chunks<T: Transport + ?Sized>(
    transport: &mut T,
    reader: &mut dyn Read,
    chunk_size: usize,
) -> Result<()> {
    let mut chunk = vec![0u8; chunk_size];
    let mut total = 0usize;
    loop {
        let filled = fill(reader, &mut chunk)?;
        if filled == 0 {
            break;
        }
        transport.write_payload(&chunk[..filled])?;
        total += filled;
        if filled < chunk_size {
            break;
        }
    }
    tracing::debug!(bytes = total, "sent local infile");
    Ok(())
}

/// Read until `buf` is full or the reader is exhausted
fn fill(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::LocalInfile(format!("error reading local file: {}", e))),
        }
    }
    Ok(filled)
}
