//! Newline-delimited JSON framing for byte-stream transports.
//!
//! Outbound [`Message`]s are encoded as one JSON object per line. Inbound frames are returned
//! as raw text lines so the caller can decide how to interpret (or ignore) them.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use crate::{Error, Message};

/// The default maximum inbound line length, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Debug)]
pub struct Codec {
    lines: LinesCodec,
}

impl Codec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self { lines: LinesCodec::new_with_max_length(max_length) }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Codec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode(src)? {
                // Skip keep-alive blank lines
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode_eof(src)? {
            Some(line) if line.trim().is_empty() => Ok(None),
            other => Ok(other),
        }
    }
}

impl Encoder<Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;

        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');

        Ok(())
    }
}
