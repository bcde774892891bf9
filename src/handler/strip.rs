//! Prefix stripping adapter
//!
//! Mounts a prefix-agnostic handler under a URL prefix: the wrapped handler
//! observes only the part of the path after the prefix.

use super::{request_path, Body, Handler, HandlerFuture, RequestPath, Route};
use crate::http;
use hyper::Request;

/// Removes a fixed prefix from the observed path before delegating
///
/// The prefix always ends with `/`, so `StripPrefix::new("/call", h)`
/// serving `/call/value` hands `value` to `h`.
pub struct StripPrefix<H> {
    prefix: String,
    inner: H,
}

impl<H: Handler> StripPrefix<H> {
    pub fn new(prefix: impl Into<String>, inner: H) -> Self {
        Self {
            prefix: normalize_prefix(prefix.into()),
            inner,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<H: Handler> Handler for StripPrefix<H> {
    fn call(&self, mut req: Request<Body>) -> HandlerFuture {
        let Some(rest) = request_path(&req)
            .strip_prefix(self.prefix.as_str())
            .map(str::to_owned)
        else {
            return Box::pin(async { http::build_404_response() });
        };

        req.extensions_mut().insert(RequestPath(rest));
        self.inner.call(req)
    }
}

/// Build a route serving `inner` under `prefix`
pub fn stripped(prefix: impl Into<String>, inner: impl Handler) -> Route {
    let strip = StripPrefix::new(prefix, inner);
    Route::new(strip.prefix.clone(), strip)
}

fn normalize_prefix(mut prefix: String) -> String {
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}
