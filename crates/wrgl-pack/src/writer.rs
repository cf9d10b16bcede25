use std::io::Write;

use tracing::trace;

use crate::entry::ObjectType;
use crate::error::PackResult;
use crate::{MAGIC, VERSION};

/// Longest possible record header: 4 length bits in the first byte plus
/// 7 bits in each of nine continuation bytes covers a `u64`.
pub(crate) const MAX_HEADER_LEN: usize = 10;

/// Streams typed object records into a packfile.
///
/// The file header is written as soon as the writer is created, so an empty
/// packfile is still a valid one.
pub struct PackfileWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> PackfileWriter<W> {
    /// Write the magic and version to `inner`.
    pub fn new(mut inner: W) -> PackResult<Self> {
        inner.write_all(&MAGIC)?;
        inner.write_all(&VERSION.to_be_bytes())?;
        Ok(Self {
            inner,
            written: (MAGIC.len() + 4) as u64,
        })
    }

    /// Append one record and return the number of bytes it took, header
    /// included.
    pub fn write_object(&mut self, ty: ObjectType, data: &[u8]) -> PackResult<usize> {
        let (header, header_len) = encode_header(ty, data.len() as u64);
        self.inner.write_all(&header[..header_len])?;
        self.inner.write_all(data)?;
        let n = header_len + data.len();
        self.written += n as u64;
        trace!(object_type = %ty, bytes = n, "wrote packfile record");
        Ok(n)
    }

    /// Total bytes written so far, file header included.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> PackResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Bytes a record with a `len`-byte payload takes on the wire.
pub fn encoded_len(len: usize) -> usize {
    let mut n = 1;
    let mut rest = (len as u64) >> 4;
    while rest > 0 {
        n += 1;
        rest >>= 7;
    }
    n + len
}

/// Encode a record header.
///
/// The first byte holds the continuation flag, the 3-bit type and the low 4
/// bits of the length. Each following byte carries 7 more length bits, with
/// its high bit set when another byte follows.
pub(crate) fn encode_header(ty: ObjectType, len: u64) -> ([u8; MAX_HEADER_LEN], usize) {
    let mut buf = [0u8; MAX_HEADER_LEN];
    let mut n = 0;
    let mut byte = (ty.type_bits() << 4) | (len & 0x0f) as u8;
    let mut rest = len >> 4;
    while rest > 0 {
        buf[n] = byte | 0x80;
        n += 1;
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf[n] = byte;
    (buf, n + 1)
}
