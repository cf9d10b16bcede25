use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::entry::ObjectType;
use crate::error::{PackError, PackResult};
use crate::writer::MAX_HEADER_LEN;
use crate::{MAGIC, VERSION};

/// Reads typed object records from a packfile stream.
pub struct PackfileReader<R: Read> {
    inner: R,
}

impl<R: Read> PackfileReader<R> {
    /// Consume and validate the file header.
    pub fn new(mut inner: R) -> PackResult<Self> {
        let mut header = [0u8; 8];
        read_exact(&mut inner, &mut header)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[..4]);
        if magic != MAGIC {
            return Err(PackError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        Ok(Self { inner })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a record boundary.
    /// A stream that ends inside a header or payload is
    /// [`PackError::UnexpectedEof`].
    pub fn read_object(&mut self) -> PackResult<Option<(ObjectType, Vec<u8>)>> {
        let Some(first) = self.read_first_byte()? else {
            return Ok(None);
        };
        let ty = ObjectType::from_type_bits((first >> 4) & 0x07)?;
        let mut len = u64::from(first & 0x0f);
        let mut shift = 4;
        let mut byte = first;
        let mut header_len = 1;
        while byte & 0x80 != 0 {
            if header_len == MAX_HEADER_LEN {
                return Err(PackError::LengthOverflow(len));
            }
            let mut buf = [0u8; 1];
            read_exact(&mut self.inner, &mut buf)?;
            byte = buf[0];
            len |= u64::from(byte & 0x7f) << shift;
            shift += 7;
            header_len += 1;
        }

        let mut data = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut data)?;
        if (data.len() as u64) < len {
            return Err(PackError::UnexpectedEof);
        }
        trace!(object_type = %ty, bytes = data.len(), "read packfile record");
        Ok(Some((ty, data)))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_first_byte(&mut self) -> PackResult<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> PackResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => PackError::UnexpectedEof,
        _ => PackError::Io(e),
    })
}

impl<R: Read> Iterator for PackfileReader<R> {
    type Item = PackResult<(ObjectType, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_object().transpose()
    }
}
