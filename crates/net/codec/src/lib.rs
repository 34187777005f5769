//! Newline-delimited UTF-8 framing.
//!
//! Each frame is one line of text terminated by `\n`. The decoder strips the
//! terminator (and a preceding `\r`, if any); the encoder appends a single `\n`.

use bytes::{BufMut, BytesMut};

/// Default maximum line length in bytes, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors raised by [`LineCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A line exceeded the configured maximum length.
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// A line was not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Codec for newline-terminated text lines.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes of the buffer already scanned for a terminator.
    next_index: usize,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn take_line(&mut self, src: &mut BytesMut, len: usize, consumed: usize) -> Result<String, CodecError> {
        self.next_index = 0;
        let mut frame = src.split_to(consumed);
        frame.truncate(len);
        if frame.last() == Some(&b'\r') {
            frame.truncate(len - 1);
        }
        Ok(String::from_utf8(frame.to_vec())?)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl asynchronous_codec::Encoder for LineCodec {
    type Item<'a> = &'a str;
    type Error = CodecError;

    fn encode(&mut self, line: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if line.len() > self.max_length {
            return Err(CodecError::LineTooLong {
                max: self.max_length,
            });
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl asynchronous_codec::Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let unscanned = src.get(self.next_index..).unwrap_or_default();
        match unscanned.iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let len = self.next_index + offset;
                // A trailing '\r' does not count towards the limit.
                let content = if len > 0 && src.get(len - 1) == Some(&b'\r') {
                    len - 1
                } else {
                    len
                };
                if content > self.max_length {
                    self.next_index = 0;
                    return Err(CodecError::LineTooLong {
                        max: self.max_length,
                    });
                }
                self.take_line(src, len, len + 1).map(Some)
            }
            None if src.len() > self.max_length + 1 => {
                self.next_index = 0;
                Err(CodecError::LineTooLong {
                    max: self.max_length,
                })
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// An unterminated final line is still delivered when the peer closes its side.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len();
        let content = if src.last() == Some(&b'\r') { len - 1 } else { len };
        if content > self.max_length {
            self.next_index = 0;
            return Err(CodecError::LineTooLong {
                max: self.max_length,
            });
        }
        self.take_line(src, len, len).map(Some)
    }
}
