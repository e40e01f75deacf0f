use std::io::{BufReader, Read, Write};
use std::time::{Duration, Instant};

use auto_impl::auto_impl;
use zerocopy::{FromZeros, IntoBytes};

use crate::constant::MAX_PACKET_PAYLOAD;
use crate::error::{Error, Result};
use crate::protocol::packet::PacketHeader;

/// Byte-level access to a connected MySQL socket
///
/// Framing (sequence ids, 16 MiB continuation packets) is the transport's job;
/// everything above it sees whole payloads.
#[auto_impl(&mut, Box)]
pub trait Transport {
    /// Read the next packet header
    fn read_header(&mut self) -> Result<PacketHeader>;

    /// Read raw bytes of the current packet
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Append a payload of `length` bytes, plus any continuation packets, to `buffer`
    fn read_payload(&mut self, length: usize, buffer: &mut Vec<u8>) -> Result<()>;

    /// Write one logical payload, splitting it into packets as needed
    fn write_payload(&mut self, payload: &[u8]) -> Result<()>;

    /// Start a new command (sequence id 0)
    fn reset_sequence(&mut self);

    /// Time since the last packet was written
    fn since_last_sent(&self) -> Duration;

    /// Time since the last packet was read
    fn since_last_received(&self) -> Duration;
}

/// Packet framing over any blocking byte stream
pub struct PacketStream<S: Read + Write> {
    stream: BufReader<S>,
    sequence_id: u8,
    last_sent: Instant,
    last_received: Instant,
}

impl<S: Read + Write> PacketStream<S> {
    pub fn new(stream: S) -> Self {
        let now = Instant::now();
        Self {
            stream: BufReader::new(stream),
            sequence_id: 0,
            last_sent: now,
            last_received: now,
        }
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.stream.get_mut()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    fn communication_error(&self, source: std::io::Error) -> Error {
        Error::Communication {
            source,
            last_sent: self.last_sent.elapsed(),
            last_received: self.last_received.elapsed(),
        }
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf) {
            Ok(()) => {
                self.last_received = Instant::now();
                Ok(())
            }
            Err(e) => Err(self.communication_error(e)),
        }
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        match self.stream.get_mut().write_all(buf) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.communication_error(e)),
        }
    }
}

impl<S: Read + Write> Transport for PacketStream<S> {
    fn read_header(&mut self) -> Result<PacketHeader> {
        let mut header = PacketHeader::new_zeroed();
        self.read_raw(header.as_mut_bytes())?;
        if header.sequence_id != self.sequence_id {
            tracing::trace!(
                expected = self.sequence_id,
                actual = header.sequence_id,
                "packet sequence mismatch"
            );
        }
        self.sequence_id = header.sequence_id.wrapping_add(1);
        Ok(header)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_raw(buf)
    }

    #[tracing::instrument(skip_all)]
    fn read_payload(&mut self, length: usize, buffer: &mut Vec<u8>) -> Result<()> {
        let start = buffer.len();
        buffer.resize(start + length, 0);
        self.read_raw(&mut buffer[start..])?;

        let mut current_length = length;
        while current_length == MAX_PACKET_PAYLOAD {
            let header = self.read_header()?;
            current_length = header.length();

            let prev_len = buffer.len();
            buffer.resize(prev_len + current_length, 0);
            self.read_raw(&mut buffer[prev_len..])?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        let mut remaining = payload;
        loop {
            let chunk_size = remaining.len().min(MAX_PACKET_PAYLOAD);
            let (chunk, rest) = remaining.split_at(chunk_size);
            remaining = rest;

            let header = PacketHeader::encode(chunk_size, self.sequence_id);
            self.sequence_id = self.sequence_id.wrapping_add(1);
            self.write_raw(header.as_bytes())?;
            self.write_raw(chunk)?;

            // a full packet is always followed by another, possibly empty, one
            if chunk_size < MAX_PACKET_PAYLOAD {
                break;
            }
        }

        if let Err(e) = self.stream.get_mut().flush() {
            return Err(self.communication_error(e));
        }
        self.last_sent = Instant::now();
        Ok(())
    }

    fn reset_sequence(&mut self) {
        self.sequence_id = 0;
    }

    fn since_last_sent(&self) -> Duration {
        self.last_sent.elapsed()
    }

    fn since_last_received(&self) -> Duration {
        self.last_received.elapsed()
    }
}
