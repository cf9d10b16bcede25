use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtocolResult;

/// Gzip a request or response body.
pub fn gzip(data: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(data: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Undo `Content-Encoding: gzip` when the header says so.
pub fn decode_body(data: &[u8], gzipped: bool) -> ProtocolResult<Vec<u8>> {
    if gzipped {
        gunzip(data)
    } else {
        Ok(data.to_vec())
    }
}

pub fn encode_json<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Parse a JSON body. An empty body is the payload's default value.
pub fn decode_json<T: DeserializeOwned + Default>(data: &[u8]) -> ProtocolResult<T> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::message::{UploadPackRequest, UploadPackResponse};
    use wrgl_types::ObjectSum;

    #[test]
    fn gzip_roundtrip() {
        let data = b"packfile bytes ".repeat(100);
        let zipped = gzip(&data).unwrap();
        assert!(zipped.len() < data.len());
        assert_eq!(gunzip(&zipped).unwrap(), data);
        assert_eq!(decode_body(&zipped, true).unwrap(), data);
        assert_eq!(decode_body(&data, false).unwrap(), data);
    }

    #[test]
    fn gunzip_rejects_garbage() {
        assert!(matches!(gunzip(b"not gzip"), Err(ProtocolError::Io(_))));
    }

    #[test]
    fn empty_body_decodes_to_default() {
        let req: UploadPackRequest = decode_json(b"").unwrap();
        assert_eq!(req, UploadPackRequest::default());
    }

    #[test]
    fn json_roundtrip() {
        let resp = UploadPackResponse {
            acks: vec![ObjectSum::digest(b"a")],
            table_haves: vec![],
        };
        let bytes = encode_json(&resp).unwrap();
        let back: UploadPackResponse = decode_json(&bytes).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn invalid_json() {
        let err = decode_json::<UploadPackRequest>(b"{").unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }
}
