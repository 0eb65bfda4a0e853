//! rigctl command framing
//!
//! Clients normally terminate commands with `\n`, but some send bare
//! commands such as `v` and wait for the answer. A newline-free burst is
//! therefore taken as one complete command once it has been read.

use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Splits the client stream into commands, replies are written as lines
#[derive(Debug)]
pub struct CommandCodec {
    lines: LinesCodec,
    max_length: usize,
}

impl CommandCodec {
    /// Reject commands longer than `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    /// Take everything buffered as one unterminated command
    fn take_burst(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        let burst = buf.split_to(buf.len());
        // The inner codec remembers how far it scanned; start it afresh
        self.lines = LinesCodec::new_with_max_length(self.max_length);

        String::from_utf8(burst.to_vec())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }
}

impl Decoder for CommandCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        match self.lines.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None if buf.is_empty() => Ok(None),
            None => self.take_burst(buf),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        self.decode(buf)
    }
}

impl<T: AsRef<str>> Encoder<T> for CommandCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(line, dst)
    }
}
