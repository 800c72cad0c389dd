//! Length-prefixed binary framing
//!
//! The persisted-state buffer is a sequence of 8-byte big-endian unsigned
//! integers and frames (a length followed by that many payload bytes).
//! The reader advances a cursor and fails with a descriptive error the
//! moment a length overruns the remaining bytes.

/// Sequential frame writer
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a bare big-endian u64
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a length-prefixed frame
    pub fn write_frame(&mut self, payload: &[u8]) {
        self.write_u64(payload.len() as u64);
        self.buf.extend_from_slice(payload);
    }

    /// Take the finished buffer
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential frame reader over a borrowed buffer
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader at the start of a buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read a bare big-endian u64
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        if self.remaining() < 8 {
            return Err(WireError::TruncatedLength {
                offset: self.pos,
                remaining: self.remaining(),
            });
        }
        let bytes: [u8; 8] = self.data[self.pos..self.pos + 8].try_into().unwrap();
        self.pos += 8;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read a length-prefixed frame
    pub fn read_frame(&mut self) -> Result<&'a [u8], WireError> {
        let offset = self.pos;
        let len = self.read_u64()? as usize;
        if len > self.remaining() {
            return Err(WireError::FrameOverrun {
                offset,
                length: len,
                remaining: self.remaining(),
            });
        }
        let frame = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(frame)
    }

    /// Assert the whole buffer was consumed
    pub fn finish(self) -> Result<(), WireError> {
        if self.remaining() > 0 {
            return Err(WireError::TrailingBytes {
                count: self.remaining(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("Truncated length prefix at offset {offset}: {remaining} bytes remain, 8 needed")]
    TruncatedLength { offset: usize, remaining: usize },

    #[error("Frame at offset {offset} declares {length} bytes but only {remaining} remain")]
    FrameOverrun {
        offset: usize,
        length: usize,
        remaining: usize,
    },

    #[error("{count} trailing bytes after the final frame")]
    TrailingBytes { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_in_order() {
        let mut writer = FrameWriter::new();
        writer.write_frame(b"geometry");
        writer.write_frame(b"");
        writer.write_u64(2);
        writer.write_frame(b"vp0");
        writer.write_frame(b"vp1");
        let buf = writer.finish();

        let mut reader = FrameReader::new(&buf);
        assert_eq!(reader.read_frame().unwrap(), b"geometry");
        assert_eq!(reader.read_frame().unwrap(), b"");
        assert_eq!(reader.read_u64().unwrap(), 2);
        assert_eq!(reader.read_frame().unwrap(), b"vp0");
        assert_eq!(reader.read_frame().unwrap(), b"vp1");
        reader.finish().unwrap();
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let mut writer = FrameWriter::new();
        writer.write_frame(b"x");
        let buf = writer.finish();
        assert_eq!(&buf[..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn overrunning_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u64.to_be_bytes());
        buf.extend_from_slice(b"short");
        let mut reader = FrameReader::new(&buf);
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::FrameOverrun { length: 100, .. })
        ));
    }

    #[test]
    fn truncated_length_is_rejected() {
        let mut reader = FrameReader::new(&[0, 0, 0]);
        assert!(matches!(
            reader.read_u64(),
            Err(WireError::TruncatedLength { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut writer = FrameWriter::new();
        writer.write_frame(b"payload");
        let mut buf = writer.finish();
        buf.push(0xff);
        let mut reader = FrameReader::new(&buf);
        reader.read_frame().unwrap();
        assert!(matches!(
            reader.finish(),
            Err(WireError::TrailingBytes { count: 1 })
        ));
    }
}
