//! Request handler module
//!
//! Handlers are small `Send + Sync` services that turn a request into a
//! response. Every component constructor returns a [`Route`], a pattern and
//! handler pair, and a [`Router`] instance collects them. There is no
//! process-wide table, so independent routers can coexist.

pub mod router;
pub mod static_files;
pub mod strip;
pub mod upload;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use router::Router;
pub use static_files::{ServeDir, ServeFile, ServeIndex};
pub use strip::StripPrefix;
pub use upload::{Upload, UploadCallback, UploadError};

/// Error type of request bodies seen by handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body seen by handlers
///
/// Boxed so the same handlers serve hyper's `Incoming` bodies and in-memory
/// bodies alike.
pub type Body = BoxBody<Bytes, BoxError>;

/// Future returned by [`Handler::call`]
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<Full<Bytes>>> + Send + 'static>>;

/// A request handler
///
/// Handlers never fail: every error is reported as an HTTP response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Body>) -> HandlerFuture;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        (**self).call(req)
    }
}

/// Handler backed by an async closure, see [`handler_fn`]
#[derive(Clone)]
pub struct HandlerFn<F>(F);

/// Wrap an async closure as a [`Handler`]
///
/// # Examples
/// ```
/// use upserve::handler::{handler_fn, request_path, Router};
/// use upserve::http::build_empty_response;
///
/// let mut router = Router::new();
/// router.handle_stripped("/call/", handler_fn(|req| async move {
///     println!("param = {}", request_path(&req));
///     build_empty_response()
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    HandlerFn(f)
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        Box::pin((self.0)(req))
    }
}

/// Path a handler observes, stored in the request extensions
///
/// The router stores the percent-decoded path here and [`StripPrefix`]
/// replaces it with the remainder after its prefix. The request URI itself
/// is left untouched for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath(pub String);

/// The path the current handler should act on
pub fn request_path<B>(req: &Request<B>) -> &str {
    req.extensions()
        .get::<RequestPath>()
        .map_or_else(|| req.uri().path(), |p| p.0.as_str())
}

/// Convert any byte body into the handler [`Body`]
pub fn into_body<B>(body: B) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed()
}

/// A registrable unit: a path pattern and the handler serving it
///
/// Patterns ending in `/` match a whole subtree, other patterns match one
/// path exactly.
#[derive(Clone)]
pub struct Route {
    pattern: String,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            pattern: pattern.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub const fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Whether the pattern covers a subtree rather than a single path
    pub fn is_subtree(&self) -> bool {
        self.pattern.ends_with('/')
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::http::build_empty_response;

    #[test]
    fn test_request_path_falls_back_to_uri() {
        let req = get("/a/b?x=1");
        assert_eq!(request_path(&req), "/a/b");
    }

    #[test]
    fn test_request_path_prefers_extension() {
        let mut req = get("/a/b");
        req.extensions_mut().insert(RequestPath("b".to_string()));
        assert_eq!(request_path(&req), "b");
        assert_eq!(req.uri().path(), "/a/b");
    }

    #[tokio::test]
    async fn test_handler_fn_and_arc() {
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(|req: Request<Body>| async move {
            let mut resp = build_empty_response();
            *resp.status_mut() = if request_path(&req) == "/ok" {
                hyper::StatusCode::OK
            } else {
                hyper::StatusCode::IM_A_TEAPOT
            };
            resp
        }));

        assert_eq!(handler.call(get("/ok")).await.status(), 200);
        assert_eq!(handler.call(get("/no")).await.status(), 418);
    }

    #[test]
    fn test_route_subtree() {
        let handler = handler_fn(|_req: Request<Body>| async { build_empty_response() });
        assert!(Route::new("/public/", handler.clone()).is_subtree());
        assert!(!Route::new("/index.html", handler).is_subtree());
    }
}
