//! Locator contract: scheme-based dispatch for `file://`/`fs://`/`http(s)://`
//! paths (`spec.md` §6).
//!
//! Grounded on `slip_interpreter.py`'s `_extract_http_url`/`_extract_file_locator`
//! canonicalization and on `ouros::io`'s host-callback philosophy: rather
//! than bundling an HTTP client dependency the corpus never reaches for,
//! network access is a capability-gated callback the host supplies
//! (`HttpClient`), exactly like `ouros::os::OsFunction` yields env/fs
//! queries back to the embedder. Local `file://` access uses `std::fs`
//! directly since SLIP scripts are expected to touch the real filesystem,
//! not a hermetic sandbox view of one.

use std::fmt;
use std::fs;
use std::path::{Path as FsPath, PathBuf};

use crate::ast::{PathAst, PathKind, Segment};
use crate::error::{EvalResult, SlipError};
use crate::eval::Evaluator;
use crate::resolver;
use crate::scope::ScopeRef;
use crate::serialize;
use crate::value::Value;

#[derive(Debug, Clone)]
pub(crate) enum Locator {
    Http(String),
    File(String),
}

impl Locator {
    fn scheme(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::File(_) => "file",
        }
    }
}

/// A host-supplied HTTP transport. The core never performs network I/O
/// itself (`spec.md` §9 capability boundary).
pub(crate) trait HttpClient: fmt::Debug {
    fn get(&mut self, url: &str, headers: &[(String, String)]) -> EvalResult<(u16, Vec<u8>, Vec<(String, String)>)>;
    fn put(&mut self, url: &str, body: &[u8], headers: &[(String, String)]) -> EvalResult<(u16, Vec<u8>, Vec<(String, String)>)>;
    fn post(&mut self, url: &str, body: &[u8], headers: &[(String, String)]) -> EvalResult<(u16, Vec<u8>, Vec<(String, String)>)>;
    fn delete(&mut self, url: &str, headers: &[(String, String)]) -> EvalResult<(u16, Vec<u8>, Vec<(String, String)>)>;
}

/// Whether `path`'s first segment names a scheme this module handles, and
/// if so, its canonical token (`spec.md` §4.2 `_extract_http_url`/
/// `_extract_file_locator`).
pub(crate) fn detect_locator(path: &PathAst) -> Option<Locator> {
    let Segment::Name(first) = path.segments.first()? else {
        return None;
    };
    let strip_colon = matches!(path.kind, PathKind::Set) || first.ends_with(':');
    if first.starts_with("http://") || first.starts_with("https://") {
        let token = canonicalize_http_token(first);
        let token = if strip_colon { token.trim_end_matches(':').to_owned() } else { token };
        return Some(Locator::Http(token));
    }
    if let Some(rest) = first.strip_prefix("file://") {
        let token = canonicalize_file_token(rest);
        return Some(Locator::File(normalize_file_tail(&token)));
    }
    None
}

/// Trims inline `#(...)` config and bracketed `[...]` queries, and strips a
/// dot-chained SLIP segment name that follows the URL's first path slash
/// (`spec.md` §4.2 `_canonicalize_http_token`).
fn canonicalize_http_token(token: &str) -> String {
    let mut s = token;
    if let Some(idx) = s.find(['#', '[']) {
        s = &s[..idx];
    }
    if let Some(scheme_end) = s.find("://") {
        if let Some(slash_rel) = s[scheme_end + 3..].find('/') {
            let slash_idx = scheme_end + 3 + slash_rel;
            if let Some(dot_rel) = s[slash_idx + 1..].find('.') {
                let dot_idx = slash_idx + 1 + dot_rel;
                s = &s[..dot_idx];
            }
        }
    }
    s.to_owned()
}

/// Trims `#(...)`/`[...]` but never cuts on `.`, to avoid mangling file
/// extensions (`spec.md` §4.2 `_canonicalize_file_token`).
fn canonicalize_file_token(token: &str) -> String {
    let mut s = token;
    if let Some(idx) = s.find('#') {
        s = &s[..idx];
    }
    if let Some(idx) = s.find('[') {
        s = &s[..idx];
    }
    s.to_owned()
}

fn normalize_file_tail(tail: &str) -> String {
    match tail {
        "" | "/" | "." | "./" => "./".to_owned(),
        ".." | "../" => "../".to_owned(),
        other => other.to_owned(),
    }
}

fn has_trailing_segments(path: &PathAst) -> bool {
    path.segments.len() > 1
}

fn check_capability(evaluator: &Evaluator, locator: &Locator) -> EvalResult<()> {
    evaluator
        .capabilities
        .check_locator(locator.scheme())
        .map_err(|e| SlipError::runtime(e.to_string()))
}

pub(crate) fn get(evaluator: &mut Evaluator, locator: &Locator, path: &PathAst, scope: &ScopeRef) -> EvalResult<Value> {
    check_capability(evaluator, locator)?;
    if has_trailing_segments(path) {
        return Err(SlipError::runtime(format!(
            "{} get does not support trailing path segments; bind the response then filter",
            locator.scheme()
        )));
    }
    let cfg = path
        .meta
        .as_ref()
        .map(|m| resolver::eval_meta(m, scope, evaluator))
        .transpose()?
        .unwrap_or_default();

    match locator {
        Locator::File(loc) => {
            let file = resolve_file_path(evaluator, loc);
            let bytes = fs::read(&file).map_err(|_| SlipError::path_not_found(&file.display().to_string()))?;
            serialize::decode_bytes(&bytes, &file, cfg.get("content-type").map(Value::to_string).as_deref())
        }
        Locator::Http(url) => {
            let client = require_http_client(evaluator)?;
            let (status, body, headers) = client.get(url, &[])?;
            Ok(package_http_response(status, &body, &headers, &cfg))
        }
    }
}

pub(crate) fn set(evaluator: &mut Evaluator, locator: &Locator, path: &PathAst, value: Value, scope: &ScopeRef) -> EvalResult<()> {
    check_capability(evaluator, locator)?;
    if has_trailing_segments(path) {
        return Err(SlipError::runtime(format!("{} write does not support trailing path segments", locator.scheme())));
    }
    let cfg = path
        .meta
        .as_ref()
        .map(|m| resolver::eval_meta(m, scope, evaluator))
        .transpose()?
        .unwrap_or_default();

    match locator {
        Locator::File(loc) => {
            let file = resolve_file_path(evaluator, loc);
            let ctype = cfg.get("content-type").map(Value::to_string);
            let bytes = serialize::encode_value(&value, &file, ctype.as_deref())?;
            if let Some(parent) = file.parent() {
                let _ = fs::create_dir_all(parent);
            }
            fs::write(&file, bytes).map_err(|e| SlipError::runtime(format!("failed writing {}: {e}", file.display())))
        }
        Locator::Http(url) => {
            let ctype = cfg.get("content-type").map(Value::to_string);
            let body = serialize::encode_for_wire(&value, ctype.as_deref())?;
            let headers = ctype.map(|c| vec![("Content-Type".to_owned(), c)]).unwrap_or_default();
            let client = require_http_client(evaluator)?;
            client.put(url, &body, &headers)?;
            Ok(())
        }
    }
}

pub(crate) fn post(evaluator: &mut Evaluator, locator: &Locator, path: &PathAst, value: Value, scope: &ScopeRef) -> EvalResult<Value> {
    check_capability(evaluator, locator)?;
    let Locator::Http(url) = locator else {
        return Err(SlipError::type_error("post-path expects an http(s) URL"));
    };
    if has_trailing_segments(path) {
        return Err(SlipError::runtime("http post does not support trailing path segments"));
    }
    let cfg = path
        .meta
        .as_ref()
        .map(|m| resolver::eval_meta(m, scope, evaluator))
        .transpose()?
        .unwrap_or_default();
    let ctype = cfg.get("content-type").map(Value::to_string);
    let body = serialize::encode_for_wire(&value, ctype.as_deref())?;
    let headers = ctype.map(|c| vec![("Content-Type".to_owned(), c)]).unwrap_or_default();
    let client = require_http_client(evaluator)?;
    let (status, body, resp_headers) = client.post(url, &body, &headers)?;
    Ok(package_http_response(status, &body, &resp_headers, &cfg))
}

pub(crate) fn delete(evaluator: &mut Evaluator, locator: &Locator, path: &PathAst, scope: &ScopeRef) -> EvalResult<()> {
    check_capability(evaluator, locator)?;
    if has_trailing_segments(path) {
        return Err(SlipError::runtime(format!("{} delete does not support trailing path segments", locator.scheme())));
    }
    let _ = path
        .meta
        .as_ref()
        .map(|m| resolver::eval_meta(m, scope, evaluator))
        .transpose()?;
    match locator {
        Locator::File(loc) => {
            let file = resolve_file_path(evaluator, loc);
            fs::remove_file(&file).map_err(|e| SlipError::runtime(format!("failed deleting {}: {e}", file.display())))
        }
        Locator::Http(url) => {
            let client = require_http_client(evaluator)?;
            client.delete(url, &[])?;
            Ok(())
        }
    }
}

fn resolve_file_path(evaluator: &Evaluator, loc: &str) -> PathBuf {
    let tail = loc.strip_prefix("file://").unwrap_or(loc);
    let base: &FsPath = evaluator.source_dir.as_deref().unwrap_or_else(|| FsPath::new("."));
    base.join(tail)
}

fn require_http_client<'a>(evaluator: &'a mut Evaluator) -> EvalResult<&'a mut dyn HttpClient> {
    evaluator
        .http_client
        .as_deref_mut()
        .ok_or_else(|| SlipError::runtime("no http client configured for this evaluator"))
}

fn package_http_response(status: u16, body: &[u8], headers: &[(String, String)], cfg: &indexmap::IndexMap<String, Value>) -> Value {
    let text = String::from_utf8_lossy(body).into_owned();
    let mode = cfg.get("response-mode").map(Value::to_string).unwrap_or_else(|| "value".to_owned());
    match mode.as_str() {
        "lite" => Value::list(vec![Value::Int(i64::from(status)), Value::str(text)]),
        "full" => {
            let mut headers_map = indexmap::IndexMap::new();
            for (k, v) in headers {
                headers_map.insert(k.to_lowercase(), Value::str(v.clone()));
            }
            let mut meta = indexmap::IndexMap::new();
            meta.insert("headers".to_owned(), Value::dict(headers_map));
            let mut out = indexmap::IndexMap::new();
            out.insert("status".to_owned(), Value::Int(i64::from(status)));
            out.insert("value".to_owned(), Value::str(text));
            out.insert("meta".to_owned(), Value::dict(meta));
            Value::dict(out)
        }
        _ => Value::str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_token_is_cut_at_dot_chained_segment_after_path_slash() {
        let cut = canonicalize_http_token("https://api.example.com/users.name");
        assert_eq!(cut, "https://api.example.com/users");
    }

    #[test]
    fn file_token_preserves_extension_dots() {
        let cut = canonicalize_file_token("./data/report.json");
        assert_eq!(cut, "./data/report.json");
    }

    #[test]
    fn bare_file_root_normalizes_to_dot_slash() {
        assert_eq!(normalize_file_tail(""), "./");
        assert_eq!(normalize_file_tail("."), "./");
    }
}
