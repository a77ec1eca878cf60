use log::trace;
use snafu::{ensure, Snafu};
use std::str::from_utf8;

/// A cursor over the raw bytes of a file. Provides big-endian integer and
/// variable-length-quantity reads, and an optional boundary so that reads
/// cannot stray past the end of the current chunk.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
    limit: Option<usize>,
}

#[derive(Debug, Snafu)]
pub(crate) enum ByteError {
    #[snafu(display("unexpected end of data at byte {}", position))]
    End { position: usize },

    #[snafu(display(
        "expected tag '{}' but found '{}' at byte {}",
        expected,
        found,
        position
    ))]
    Tag {
        expected: String,
        found: String,
        position: usize,
    },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            limit: None,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    /// The end this reader may read up to: the current chunk boundary if one
    /// is set, the end of the data otherwise.
    fn end(&self) -> usize {
        match self.limit {
            Some(limit) => limit.min(self.bytes.len()),
            None => self.bytes.len(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end().saturating_sub(self.position)
    }

    pub(crate) fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    /// Read a single byte and advance.
    pub(crate) fn read(&mut self) -> ByteResult<u8> {
        ensure!(
            self.position < self.end(),
            EndSnafu {
                position: self.position
            }
        );
        let value = self.bytes[self.position];
        self.position += 1;
        trace!("read {:#04x} at position {}", value, self.position - 1);
        Ok(value)
    }

    pub(crate) fn read_u16(&mut self) -> ByteResult<u16> {
        Ok(u16::from_be_bytes([self.read()?, self.read()?]))
    }

    pub(crate) fn read_u32(&mut self) -> ByteResult<u32> {
        Ok(u32::from_be_bytes([
            self.read()?,
            self.read()?,
            self.read()?,
            self.read()?,
        ]))
    }

    pub(crate) fn read_n(&mut self, count: usize) -> ByteResult<&'a [u8]> {
        ensure!(
            self.remaining() >= count,
            EndSnafu {
                position: self.position
            }
        );
        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, count: usize) -> ByteResult<()> {
        self.read_n(count).map(|_| ())
    }

    /// Decode a variable-length quantity of at most four bytes. Reading stops
    /// at the fourth byte even if its continuation bit is still set.
    pub(crate) fn read_vlq(&mut self) -> ByteResult<u32> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.read()?;
            value = (value << 7) | u32::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    pub(crate) fn expect_tag(&mut self, expected_tag: &str) -> ByteResult<()> {
        let position = self.position;
        let tag_bytes = self.read_n(4)?;
        let found = from_utf8(tag_bytes).unwrap_or("????");
        ensure!(
            expected_tag == found,
            TagSnafu {
                expected: expected_tag,
                found,
                position
            }
        );
        Ok(())
    }

    /// Constrain reads to the next `size` bytes.
    pub(crate) fn set_limit(&mut self, size: usize) {
        self.limit = Some(self.position.saturating_add(size));
    }

    /// Drop the chunk boundary and move past any unread chunk bytes.
    pub(crate) fn finish_chunk(&mut self) {
        if let Some(limit) = self.limit.take() {
            self.position = limit.min(self.bytes.len());
        }
    }
}

#[test]
fn byte_reader_test() {
    let bytes = [0x00u8, 0x01, 0x02, 0x03, 0x04, 0x10, 0x20, 0x30, 0x40];
    let mut r = ByteReader::new(&bytes);
    assert_eq!(0x00, r.read().unwrap());
    assert_eq!(0x0102, r.read_u16().unwrap());
    assert_eq!(3, r.position());
    r.set_limit(2);
    assert_eq!(2, r.remaining());
    assert_eq!(0x03, r.read().unwrap());
    assert_eq!(0x04, r.read().unwrap());
    assert!(r.read().is_err());
    r.finish_chunk();
    assert_eq!(0x10, r.read().unwrap());
}

#[test]
fn finish_chunk_skips_unread_bytes() {
    let bytes = [0x01u8, 0x02, 0x03, 0x04, 0x05];
    let mut r = ByteReader::new(&bytes);
    r.set_limit(3);
    assert_eq!(0x01, r.read().unwrap());
    r.finish_chunk();
    assert_eq!(3, r.position());
    assert_eq!(0x04, r.read().unwrap());
}

#[test]
fn tag_test() {
    let bytes = b"MThd\x00\x00\x00\x06";
    let mut r = ByteReader::new(bytes);
    r.expect_tag("MThd").unwrap();
    assert_eq!(6, r.read_u32().unwrap());
    let mut r = ByteReader::new(bytes);
    assert!(r.expect_tag("MTrk").is_err());
}

#[test]
fn vlq_read_test() {
    let bytes = [0x00u8, 0x7f, 0x81, 0x00, 0xff, 0xff, 0xff, 0x7f];
    let mut r = ByteReader::new(&bytes);
    assert_eq!(0x00, r.read_vlq().unwrap());
    assert_eq!(0x7f, r.read_vlq().unwrap());
    assert_eq!(0x80, r.read_vlq().unwrap());
    assert_eq!(0x0fff_ffff, r.read_vlq().unwrap());
}

#[test]
fn vlq_read_stops_after_four_bytes() {
    // the fourth byte still has its continuation bit set, reading must stop
    let bytes = [0xffu8, 0xff, 0xff, 0xff, 0x7f];
    let mut r = ByteReader::new(&bytes);
    assert_eq!(0x0fff_ffff, r.read_vlq().unwrap());
    assert_eq!(4, r.position());
}
