use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE, COOKIE, SET_COOKIE, TRAILER};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use tracing::{info, warn};
use uuid::Uuid;
use wrgl_objects::ObjectStore;
use wrgl_protocol::{
    content_types, decode_body, decode_json, encode_json, endpoints, expired_session_cookie,
    find_cookie, gzip, session_cookie, ObjectsRequest, ProtocolError, ReceivePackBody,
    RefsResponse, UploadPackReply, UploadPackRequest, COOKIE_RECEIVE_PACK_SESSION,
    COOKIE_UPLOAD_PACK_SESSION, GZIP_ENCODING, HEADER_PURGE_RECEIVE_PACK_SESSION,
    HEADER_PURGE_UPLOAD_PACK_SESSION,
};
use wrgl_refs::RefStore;
use wrgl_sync::{pack_tables, ReceivePackSession, SessionOptions, UploadPackSession};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::ttl::TtlCache;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn ObjectStore>,
    pub refs: Arc<dyn RefStore>,
    pub options: SessionOptions,
    pub session_ttl: Duration,
    pub max_request_body: usize,
    pub upload_sessions: TtlCache<Uuid, UploadPackSession>,
    pub receive_sessions: TtlCache<Uuid, ReceivePackSession>,
}

impl AppState {
    pub fn new(db: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, config: &ServerConfig) -> Self {
        Self {
            db,
            refs,
            options: config.session_options(),
            session_ttl: config.session_ttl(),
            max_request_body: config.max_request_body(),
            upload_sessions: TtlCache::new(),
            receive_sessions: TtlCache::new(),
        }
    }
}

/// Session cookie and purge signal of one endpoint.
struct SessionCookie {
    name: &'static str,
    path: &'static str,
    purge_header: &'static str,
}

const UPLOAD_PACK_COOKIE: SessionCookie = SessionCookie {
    name: COOKIE_UPLOAD_PACK_SESSION,
    path: endpoints::UPLOAD_PACK,
    purge_header: HEADER_PURGE_UPLOAD_PACK_SESSION,
};

const RECEIVE_PACK_COOKIE: SessionCookie = SessionCookie {
    name: COOKIE_RECEIVE_PACK_SESSION,
    path: endpoints::RECEIVE_PACK,
    purge_header: HEADER_PURGE_RECEIVE_PACK_SESSION,
};

impl SessionCookie {
    fn session_id(&self, headers: &HeaderMap) -> Option<Uuid> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|h| find_cookie(h, self.name))
            .and_then(|v| Uuid::parse_str(v).ok())
    }

    /// Renew the cookie, or expire it and signal a purge once the session
    /// has finished.
    fn apply(&self, response: &mut Response, id: Uuid, ttl: Duration, done: bool) -> ServerResult<()> {
        let headers = response.headers_mut();
        let cookie = if done {
            let purge = HeaderName::from_bytes(self.purge_header.as_bytes())
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            headers.insert(TRAILER, HeaderValue::from_static(self.purge_header));
            headers.insert(purge, HeaderValue::from_static("true"));
            expired_session_cookie(self.name, self.path)
        } else {
            session_cookie(self.name, &id.to_string(), self.path, ttl.as_secs())
        };
        let value =
            HeaderValue::from_str(&cookie).map_err(|e| ServerError::Internal(e.to_string()))?;
        headers.insert(SET_COOKIE, value);
        Ok(())
    }
}

fn is_gzipped(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(GZIP_ENCODING))
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(content_types::JSON)
}

fn json_response<T: serde::Serialize>(value: &T) -> ServerResult<Response> {
    let body = encode_json(value)?;
    Ok(([(CONTENT_TYPE, content_types::JSON)], body).into_response())
}

fn packfile_response(packfile: &[u8]) -> ServerResult<Response> {
    let body = gzip(packfile)?;
    Ok((
        [
            (CONTENT_TYPE, content_types::PACKFILE),
            (CONTENT_ENCODING, GZIP_ENCODING),
        ],
        body,
    )
        .into_response())
}

/// `GET /refs/`
pub async fn get_refs(State(state): State<AppState>) -> ServerResult<Json<RefsResponse>> {
    let refs = state.refs.list_all_refs()?;
    Ok(Json(RefsResponse { refs }))
}

/// `POST /upload-pack/`
pub async fn upload_pack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let req: UploadPackRequest = decode_json(&decode_body(&body, is_gzipped(&headers))?)?;
    let cookie = &UPLOAD_PACK_COOKIE;
    let found = cookie
        .session_id(&headers)
        .and_then(|id| Some((id, state.upload_sessions.pop(&id)?)));
    let resumed = found.is_some();
    let (id, mut session) = match found {
        Some(found) => found,
        None => {
            let id = Uuid::now_v7();
            info!(session = %id, "new upload-pack session");
            let session =
                UploadPackSession::new(state.db.clone(), state.refs.clone(), state.options.clone());
            (id, session)
        }
    };

    let reply = match session.step(req) {
        Ok(reply) => reply,
        Err(e) => {
            // A session the client has no cookie for can never be resumed.
            if e.keeps_session() && resumed {
                state.upload_sessions.add(id, session, state.session_ttl);
            } else {
                warn!(session = %id, error = %e, "upload-pack session aborted");
            }
            return Err(e.into());
        }
    };
    let done = session.is_done();
    let mut response = match reply {
        UploadPackReply::Negotiation(resp) => json_response(&resp)?,
        UploadPackReply::Packfile(bytes) => packfile_response(&bytes)?,
    };
    if done {
        info!(session = %id, "upload-pack session complete");
    } else {
        state.upload_sessions.add(id, session, state.session_ttl);
    }
    cookie.apply(&mut response, id, state.session_ttl, done)?;
    Ok(response)
}

/// `POST /receive-pack/`
pub async fn receive_pack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let data = decode_body(&body, is_gzipped(&headers))?;
    let body = match content_type(&headers) {
        ct if ct.starts_with(content_types::PACKFILE) => ReceivePackBody::Packfile(data),
        ct if ct.starts_with(content_types::JSON) => {
            ReceivePackBody::Negotiation(decode_json(&data)?)
        }
        ct => return Err(ProtocolError::UnexpectedContentType(ct.to_string()).into()),
    };
    let cookie = &RECEIVE_PACK_COOKIE;
    let found = cookie
        .session_id(&headers)
        .and_then(|id| Some((id, state.receive_sessions.pop(&id)?)));
    let resumed = found.is_some();
    let (id, mut session) = match found {
        Some(found) => found,
        None => {
            let id = Uuid::now_v7();
            info!(session = %id, "new receive-pack session");
            let session =
                ReceivePackSession::new(state.db.clone(), state.refs.clone(), state.options.clone());
            (id, session)
        }
    };

    let resp = match session.step(body) {
        Ok(resp) => resp,
        Err(e) => {
            // A session the client has no cookie for can never be resumed.
            if e.keeps_session() && resumed {
                state.receive_sessions.add(id, session, state.session_ttl);
            } else {
                warn!(session = %id, error = %e, "receive-pack session aborted");
            }
            return Err(e.into());
        }
    };
    let done = resp.is_final();
    let mut response = json_response(&resp)?;
    if done {
        info!(session = %id, "receive-pack session complete");
    } else {
        state.receive_sessions.add(id, session, state.session_ttl);
    }
    cookie.apply(&mut response, id, state.session_ttl, done)?;
    Ok(response)
}

/// `POST /objects/`
pub async fn get_objects(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let req: ObjectsRequest = decode_json(&decode_body(&body, is_gzipped(&headers))?)?;
    if req.tables.is_empty() {
        return Err(ServerError::BadRequest("no tables requested".into()));
    }
    let packfile = pack_tables(state.db.clone(), &req.tables)?;
    info!(tables = req.tables.len(), bytes = packfile.len(), "sending tables");
    packfile_response(&packfile)
}
