//! Ref name validation following git-style conventions.
//!
//! Ref names are stored without a leading `refs/` and must start with one of
//! the known namespaces: `heads/`, `tags/` or `remotes/`. The part after the
//! namespace:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not start or end with `.` or `/`, nor end with `.lock`
//! - Must not contain empty components (`//`)

use crate::error::{RefError, Result};

pub const HEADS_PREFIX: &str = "heads/";
pub const TAGS_PREFIX: &str = "tags/";
pub const REMOTES_PREFIX: &str = "remotes/";

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a short name (branch, tag or remote), returning `Ok(())` if valid.
///
/// ```
/// use wrgl_refs::names::validate_short_name;
///
/// assert!(validate_short_name("main").is_ok());
/// assert!(validate_short_name("feature/auth").is_ok());
/// assert!(validate_short_name("").is_err());
/// assert!(validate_short_name("bad..name").is_err());
/// ```
pub fn validate_short_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    if name.contains("//") {
        return Err(invalid(name, "must not contain '//'"));
    }
    Ok(())
}

/// Validate a full ref name such as `heads/main` or `remotes/origin/main`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let rest = [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .ok_or_else(|| invalid(name, "must start with heads/, tags/ or remotes/"))?;
    validate_short_name(rest)?;
    if name.starts_with(REMOTES_PREFIX) && !rest.contains('/') {
        return Err(invalid(name, "remote ref must name a remote and a branch"));
    }
    Ok(())
}

/// `heads/<branch>`
pub fn head_ref(branch: &str) -> String {
    format!("{HEADS_PREFIX}{branch}")
}

/// `remotes/<remote>/<branch>`
pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("{REMOTES_PREFIX}{remote}/{branch}")
}
