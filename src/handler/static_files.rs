//! Static file serving module
//!
//! Three read-only handlers: the index file at `/`, single named files, and
//! whole directory trees. None of them ever lists a directory.

use super::strip::StripPrefix;
use super::{request_path, Body, Handler, HandlerFuture, Route};
use crate::http::path::{clean, join_under};
use crate::http::response::{build_file_response, build_partial_response, EntityHeaders};
use crate::http::{self, cache, mime, RangeOutcome};
use crate::logger;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use http_body_util::Full;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;

/// Request details needed to answer a static file request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub range_header: Option<String>,
}

impl RequestContext {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        Self {
            method: req.method().clone(),
            path: request_path(req).to_string(),
            if_none_match: header("if-none-match"),
            if_modified_since: header("if-modified-since"),
            range_header: header("range"),
        }
    }

    fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// A file read from disk, ready to be sent
struct LoadedFile {
    content: Vec<u8>,
    content_type: &'static str,
    modified: Option<SystemTime>,
}

/// Serves one file at `/` and nothing below it
#[derive(Debug, Clone)]
pub struct ServeIndex {
    file: Arc<PathBuf>,
}

impl ServeIndex {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(file.into()),
        }
    }
}

impl Handler for ServeIndex {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let ctx = RequestContext::from_request(&req);
        let file = Arc::clone(&self.file);
        Box::pin(async move {
            if ctx.path != "/" {
                return http::build_404_response();
            }
            serve_path(&ctx, &file).await
        })
    }
}

/// Serves one fixed file whatever the rest of the path is
#[derive(Debug, Clone)]
pub struct ServeFile {
    file: Arc<PathBuf>,
}

impl ServeFile {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(file.into()),
        }
    }
}

impl Handler for ServeFile {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let ctx = RequestContext::from_request(&req);
        let file = Arc::clone(&self.file);
        Box::pin(async move { serve_path(&ctx, &file).await })
    }
}

/// Serves files below a root directory
///
/// The observed request path is taken as relative to the root. It is cleaned
/// as a rooted path first, so `..` can never climb out of the root, and the
/// final file must still resolve inside the canonical root, which stops
/// symlinks pointing elsewhere. Directories answer 404.
#[derive(Debug, Clone)]
pub struct ServeDir {
    root: Arc<PathBuf>,
}

impl ServeDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }
}

impl Handler for ServeDir {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let ctx = RequestContext::from_request(&req);
        let root = Arc::clone(&self.root);
        Box::pin(async move {
            match resolve_in_root(&root, &ctx.path).await {
                Some(file) => serve_path(&ctx, &file).await,
                None => http::build_404_response(),
            }
        })
    }
}

/// Route serving `file` for exactly `/`
pub fn index_route(file: impl Into<PathBuf>) -> Route {
    Route::new("/", ServeIndex::new(file))
}

/// Route serving the file at `file_path` under the same URL path
///
/// `images/cat.jpg` answers `GET /images/cat.jpg`.
pub fn file_route(file_path: &str) -> Route {
    let pattern = format!("/{}", file_path.trim_start_matches('/'));
    Route::new(pattern, ServeFile::new(file_path))
}

/// Route serving everything below `dir` under the URL prefix `/<dir>/`
///
/// `images` answers `GET /images/cat.jpg` with `images/cat.jpg`.
pub fn dir_route(dir: &str) -> Route {
    let mut prefix = clean(&format!("/{dir}"));
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    Route::new(prefix.clone(), StripPrefix::new(prefix, ServeDir::new(dir)))
}

/// Check HTTP method, static files answer only GET/HEAD (and OPTIONS)
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response()),
        _ => Some(http::build_405_response()),
    }
}

/// Map a request path to an existing non-directory entry inside `root`
async fn resolve_in_root(root: &Path, request_path: &str) -> Option<PathBuf> {
    let candidate = join_under(root, request_path);

    // Missing entries are the common 404, not worth a log line
    let metadata = fs::metadata(&candidate).await.ok()?;
    if metadata.is_dir() {
        return None;
    }

    let root_canonical = match fs::canonicalize(root).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                root.display()
            ));
            return None;
        }
    };
    let candidate_canonical = fs::canonicalize(&candidate).await.ok()?;
    if !candidate_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            candidate_canonical.display()
        ));
        return None;
    }

    Some(candidate)
}

/// Answer a request with the file at `path`
async fn serve_path(ctx: &RequestContext, path: &Path) -> Response<Full<Bytes>> {
    if let Some(resp) = check_http_method(&ctx.method) {
        return resp;
    }
    match load_file(path).await {
        Some(file) => build_static_file_response(ctx, file),
        None => http::build_404_response(),
    }
}

/// Load a regular file, `None` for missing entries and directories
async fn load_file(path: &Path) -> Option<LoadedFile> {
    let metadata = fs::metadata(path).await.ok()?;
    if metadata.is_dir() {
        return None;
    }

    let content = match fs::read(path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
            return None;
        }
    };

    Some(LoadedFile {
        content,
        content_type: mime::content_type_for(path),
        modified: metadata.modified().ok(),
    })
}

/// Build static file response with `ETag`, `Last-Modified` and Range support
fn build_static_file_response(ctx: &RequestContext, file: LoadedFile) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&file.content);
    let last_modified = file.modified.map(cache::format_http_date);
    let total_size = file.content.len();

    // If-None-Match takes precedence; If-Modified-Since only counts without it
    let not_modified = if ctx.if_none_match.is_some() {
        cache::check_etag_match(ctx.if_none_match.as_deref(), &etag)
    } else {
        file.modified
            .is_some_and(|m| cache::not_modified_since(ctx.if_modified_since.as_deref(), m))
    };
    if not_modified {
        return http::build_304_response(&etag, last_modified.as_deref());
    }

    let headers = EntityHeaders {
        content_type: file.content_type,
        etag: &etag,
        last_modified: last_modified.as_deref(),
    };
    let data = Bytes::from(file.content);

    match http::parse_range_header(ctx.range_header.as_deref(), total_size) {
        RangeOutcome::Partial(range) => {
            let body = data.slice(range.start..=range.end);
            build_partial_response(body, &headers, range, total_size, ctx.is_head())
        }
        RangeOutcome::Unsatisfiable => http::build_416_response(total_size),
        RangeOutcome::Full => build_file_response(data, &headers, ctx.is_head()),
    }
}
