//! Request routing dispatch module
//!
//! A [`Router`] is an explicit table of [`Route`]s. Exact patterns match one
//! path; patterns ending in `/` match their whole subtree, longest first.

use super::static_files::{dir_route, file_route, index_route};
use super::strip::stripped;
use super::upload::{upload_route, UploadCallback};
use super::{Body, Handler, RequestPath, Route};
use crate::http;
use crate::ident::IdGenerator;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response};
use std::path::PathBuf;
use std::sync::Arc;

/// Registry of routes for one server
///
/// The registration helpers mirror the usual setup of a small site:
///
/// ```
/// use upserve::handler::Router;
///
/// let mut router = Router::new();
/// router
///     .serve_index("index.html")
///     .serve_file("favicon.ico")
///     .serve_dir("public")
///     .allow_upload("/upload", "file", "uploads", |stored: &std::path::Path, original: &str| {
///         println!("{original} saved as {}", stored.display());
///     });
/// assert_eq!(router.len(), 4);
/// ```
pub struct Router {
    routes: Vec<Route>,
    ids: Arc<IdGenerator>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(IdGenerator::new()))
    }

    /// Router whose upload routes draw names from `ids`
    pub const fn with_id_generator(ids: Arc<IdGenerator>) -> Self {
        Self {
            routes: Vec::new(),
            ids,
        }
    }

    /// Register a route, replacing any route with the same pattern
    pub fn route(&mut self, route: Route) -> &mut Self {
        if !route.pattern().starts_with('/') {
            logger::log_warning(&format!(
                "Ignoring route '{}': patterns must start with '/'",
                route.pattern()
            ));
            return self;
        }

        match self.routes.iter().position(|r| r.pattern() == route.pattern()) {
            Some(idx) => {
                logger::log_warning(&format!(
                    "Route '{}' registered twice, keeping the latest",
                    route.pattern()
                ));
                self.routes[idx] = route;
            }
            None => {
                logger::log_debug(&format!("Registered route '{}'", route.pattern()));
                self.routes.push(route);
            }
        }
        self
    }

    /// Register `handler` for `pattern`
    pub fn handle(&mut self, pattern: impl Into<String>, handler: impl Handler) -> &mut Self {
        self.route(Route::new(pattern, handler))
    }

    /// Serve `file` for `GET /` only
    pub fn serve_index(&mut self, file: impl Into<PathBuf>) -> &mut Self {
        self.route(index_route(file))
    }

    /// Serve the file at `file_path` under `/<file_path>`
    pub fn serve_file(&mut self, file_path: &str) -> &mut Self {
        self.route(file_route(file_path))
    }

    /// Serve the tree below `dir` under `/<dir>/`, without listings
    pub fn serve_dir(&mut self, dir: &str) -> &mut Self {
        self.route(dir_route(dir))
    }

    /// Mount `handler` under `prefix`, hiding the prefix from it
    pub fn handle_stripped(&mut self, prefix: &str, handler: impl Handler) -> &mut Self {
        self.route(stripped(prefix, handler))
    }

    /// Accept uploads posted to `url_path` in form field `form_key`
    pub fn allow_upload(
        &mut self,
        url_path: &str,
        form_key: &str,
        storage_dir: impl Into<PathBuf>,
        on_saved: impl UploadCallback,
    ) -> &mut Self {
        let route = upload_route(
            url_path,
            form_key,
            storage_dir,
            Arc::clone(&self.ids),
            on_saved,
        );
        self.route(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for an already decoded path
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        if let Some(route) = self.routes.iter().find(|r| r.pattern() == path) {
            return Some(route);
        }
        self.routes
            .iter()
            .filter(|r| r.is_subtree() && path.starts_with(r.pattern()))
            .max_by_key(|r| r.pattern().len())
    }

    /// Dispatch a request to its handler
    ///
    /// The percent-decoded path is stored as the [`RequestPath`] seen by the
    /// handler. `/dir` is redirected to `/dir/` when only the subtree is
    /// registered.
    pub async fn dispatch(&self, mut req: Request<Body>) -> Response<Full<Bytes>> {
        let path = match urlencoding::decode(req.uri().path()) {
            Ok(p) => p.into_owned(),
            Err(e) => {
                logger::log_warning(&format!(
                    "Rejecting undecodable path '{}': {e}",
                    req.uri().path()
                ));
                return http::build_400_response("400 Bad Request: invalid path encoding");
            }
        };

        if let Some(target) = self.subtree_redirect(&path, req.uri().query()) {
            return http::build_redirect_response(&target);
        }

        let Some(route) = self.lookup(&path) else {
            return http::build_404_response();
        };
        let handler = Arc::clone(route.handler());

        req.extensions_mut().insert(RequestPath(path));
        handler.call(req).await
    }

    /// Redirect target for `/dir` when `/dir/` exists but `/dir` does not
    fn subtree_redirect(&self, path: &str, query: Option<&str>) -> Option<String> {
        if path.ends_with('/') || self.routes.iter().any(|r| r.pattern() == path) {
            return None;
        }
        let with_slash = format!("{path}/");
        if !self.routes.iter().any(|r| r.pattern() == with_slash) {
            return None;
        }
        let location = encode_path(&with_slash);
        Some(match query {
            Some(q) => format!("{location}?{q}"),
            None => location,
        })
    }
}

/// Percent-encode each segment of a decoded path, keeping the `/` separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
