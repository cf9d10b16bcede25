/// HTTP endpoint paths served by a wrgl remote.
pub mod endpoints {
    pub const REFS: &str = "/refs/";
    pub const UPLOAD_PACK: &str = "/upload-pack/";
    pub const RECEIVE_PACK: &str = "/receive-pack/";
    pub const OBJECTS: &str = "/objects/";
}

pub mod content_types {
    pub const JSON: &str = "application/json";
    pub const PACKFILE: &str = "application/x-wrgl-packfile";
}

pub const GZIP_ENCODING: &str = "gzip";

pub const COOKIE_UPLOAD_PACK_SESSION: &str = "upload-pack-session";
pub const COOKIE_RECEIVE_PACK_SESSION: &str = "receive-pack-session";

/// Set to `true` on the last response of a session.
pub const HEADER_PURGE_UPLOAD_PACK_SESSION: &str = "Purge-Upload-Pack-Session";
pub const HEADER_PURGE_RECEIVE_PACK_SESSION: &str = "Purge-Receive-Pack-Session";

/// Lifetime of a session cookie, matching the default server-side TTL.
pub const SESSION_MAX_AGE_SECS: u64 = 3 * 60 * 60;

/// `Set-Cookie` value binding a session to `path`.
pub fn session_cookie(name: &str, id: &str, path: &str, max_age_secs: u64) -> String {
    format!("{name}={id}; Path={path}; Max-Age={max_age_secs}; HttpOnly")
}

/// `Set-Cookie` value telling the client to forget a session.
pub fn expired_session_cookie(name: &str, path: &str) -> String {
    format!("{name}=; Path={path}; Max-Age=0; HttpOnly")
}

/// Find `name` in a `Cookie` header value.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

/// Extract the `name=value` pair from a `Set-Cookie` value.
///
/// Returns `None` when the cookie expires the session.
pub fn parse_set_cookie(header: &str) -> Option<(&str, &str)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    let expired = parts.any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
    if expired || value.is_empty() {
        return None;
    }
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::UPLOAD_PACK, "/upload-pack/");
        assert_eq!(endpoints::RECEIVE_PACK, "/receive-pack/");
    }

    #[test]
    fn session_cookie_roundtrip() {
        let set = session_cookie(
            COOKIE_UPLOAD_PACK_SESSION,
            "abc",
            endpoints::UPLOAD_PACK,
            SESSION_MAX_AGE_SECS,
        );
        assert_eq!(
            set,
            "upload-pack-session=abc; Path=/upload-pack/; Max-Age=10800; HttpOnly"
        );
        assert_eq!(parse_set_cookie(&set), Some((COOKIE_UPLOAD_PACK_SESSION, "abc")));
    }

    #[test]
    fn expired_cookie_is_not_kept() {
        let set = expired_session_cookie(COOKIE_RECEIVE_PACK_SESSION, endpoints::RECEIVE_PACK);
        assert_eq!(parse_set_cookie(&set), None);
    }

    #[test]
    fn find_cookie_in_header() {
        let header = "other=1; receive-pack-session=xyz";
        assert_eq!(find_cookie(header, COOKIE_RECEIVE_PACK_SESSION), Some("xyz"));
        assert_eq!(find_cookie(header, COOKIE_UPLOAD_PACK_SESSION), None);
    }
}
