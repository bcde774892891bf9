// Connection handling module
// Serves one accepted TCP connection and writes the access log

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;

use crate::config::AppState;
use crate::handler::{into_body, BoxError};
use crate::logger::{self, AccessLogEntry};

/// Accept a connection if the connection limit allows it
///
/// The connection is served on its own task so slow clients never hold up
/// the accept loop.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) {
    if !state.try_acquire_connection() {
        logger::log_warning(&format!(
            "Max connections reached: {}/{}. Connection from {peer_addr} rejected.",
            state.active_connections(),
            state.config.performance.max_connections.unwrap_or_default()
        ));
        drop(stream);
        return;
    }

    logger::log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
    tokio::spawn(serve_connection(stream, peer_addr, Arc::clone(state)));
}

/// Serve HTTP/1.1 on `stream` until the client leaves or the timeout hits
async fn serve_connection(stream: tokio::net::TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let io = TokioIo::new(stream);

    let perf = &state.config.performance;
    let timeout_duration = Duration::from_secs(perf.read_timeout.max(perf.write_timeout));

    let mut builder = http1::Builder::new();
    builder.keep_alive(perf.keep_alive_timeout > 0);

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| {
            let state = Arc::clone(&service_state);
            async move { Ok::<_, Infallible>(handle_request(req, peer_addr, &state).await) }
        }),
    );

    match tokio::time::timeout(timeout_duration, conn).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => logger::log_connection_error(&err),
        Err(_) => logger::log_debug(&format!(
            "Connection from {peer_addr} closed after {} seconds",
            timeout_duration.as_secs()
        )),
    }

    state.release_connection();
}

/// Route one request and record it in the access log
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let logging = &state.config.logging;
    let entry = logging
        .access_log
        .then(|| AccessLogEntry::from_request(peer_addr, &req));
    let start = Instant::now();

    let resp = state.router.dispatch(req.map(into_body)).await;

    if let Some(mut entry) = entry {
        let body_bytes = resp.body().size_hint().exact().unwrap_or(0);
        entry.complete(resp.status().as_u16(), body_bytes, start.elapsed());
        logger::log_access(&entry, &logging.access_log_format);
    }
    resp
}
