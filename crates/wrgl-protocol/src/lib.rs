//! Wire protocol for wrgl sync.
//!
//! Negotiation rounds travel as JSON bodies, object transfers as packfiles
//! (see `wrgl-pack`), either optionally gzipped. A negotiation spans several
//! stateless HTTP requests; the server finds its session again through a
//! cookie scoped to the endpoint path.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;

pub use codec::{decode_body, decode_json, encode_json, gunzip, gzip};
pub use endpoint::{
    content_types, endpoints, expired_session_cookie, find_cookie, parse_set_cookie,
    session_cookie, COOKIE_RECEIVE_PACK_SESSION, COOKIE_UPLOAD_PACK_SESSION, GZIP_ENCODING,
    HEADER_PURGE_RECEIVE_PACK_SESSION, HEADER_PURGE_UPLOAD_PACK_SESSION, SESSION_MAX_AGE_SECS,
};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    ErrorResponse, ObjectsRequest, ReceivePackBody, ReceivePackRequest, ReceivePackResponse,
    RefsResponse, Update, UploadPackReply, UploadPackRequest, UploadPackResponse,
};
