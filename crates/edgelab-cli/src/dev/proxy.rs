//! Request bridge for the bridged runtime.
//!
//! Listens on the developer port and re-issues every request through the
//! sandbox, which acts as an HTTP forward proxy on its bridge port. The target
//! authority is the configured local upstream, or the inbound `Host`.
//!
//! Text responses are buffered so their length can be recomputed; everything
//! else is streamed through after peeking at the first chunk to tell an empty
//! body from a missing one.

use crate::dev::context::SessionContext;
use crate::dev::registry::SessionId;
use crate::error::{CliError, Result};
use crate::ui;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;

pub const SESSION_HEADER: &str = "x-edgelab-session";
pub const CLIENT_IP_HEADER: &str = "x-edgelab-client-ip";
pub const CONTEXT_HEADER: &str = "x-edgelab-context";

/// Body of the 500 answered when the sandbox produced no response body.
pub const NULL_RESPONSE_BODY: &str = "sandbox returned null";

/// Largest request body relayed to the sandbox.
const MAX_REQUEST_BODY: usize = 64 * 1024 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct Bridge {
    client: reqwest::Client,
    upstream: Option<Url>,
    session: SessionId,
}

impl Bridge {
    /// Bridge for a session whose sandbox listens on `ctx.bridge_port`.
    pub fn new(ctx: &SessionContext) -> Result<Self> {
        let origin = ctx
            .bridge_origin()
            .ok_or_else(|| CliError::Server("bridged runtime has no bridge port".to_string()))?;
        Self::with_proxy(&origin, ctx.local_upstream.clone(), ctx.id)
    }

    /// Bridge that forwards to an explicit proxy origin.
    ///
    /// # Arguments
    ///
    /// * `proxy` - Origin the sandbox's request bridge listens on
    /// * `upstream` - Host that replaces the request host, if any
    /// * `session` - Session tag added to forwarded requests
    pub fn with_proxy(proxy: &str, upstream: Option<Url>, session: SessionId) -> Result<Self> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy)?)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            upstream,
            session,
        })
    }

    pub fn router(self) -> Router {
        Router::new().fallback(forward).with_state(Arc::new(self))
    }

    /// Serve until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    }

    /// Absolute URL the sandbox should fetch for this request.
    fn target_url(&self, request: &Request) -> Option<String> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let authority = match &self.upstream {
            Some(upstream) => {
                let host = upstream.host_str()?;
                match upstream.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                }
            }
            None => request
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .or_else(|| request.uri().authority().map(|a| a.to_string()))?,
        };

        Some(format!("http://{}{}", authority, path_and_query))
    }
}

async fn forward(State(bridge): State<Arc<Bridge>>, request: Request) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = relay(&bridge, request).await;

    ui::request(&ui::format_request_line(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed(),
    ));
    response
}

async fn relay(bridge: &Bridge, request: Request) -> Response {
    let Some(url) = bridge.target_url(&request) else {
        return (StatusCode::BAD_REQUEST, "request has no host").into_response();
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let mut headers = strip_request_headers(&parts.headers);
    insert_header(&mut headers, SESSION_HEADER, &bridge.session.to_string());
    insert_header(&mut headers, CLIENT_IP_HEADER, &client_ip);
    insert_header(&mut headers, CONTEXT_HEADER, "dev");

    let upstream = bridge
        .client
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(response) => relay_response(&parts.method, response).await,
        Err(e) => {
            tracing::warn!(%url, error = %e, "sandbox request failed");
            (StatusCode::BAD_GATEWAY, format!("bad gateway: {}", e)).into_response()
        }
    }
}

async fn relay_response(method: &Method, response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = strip_response_headers(response.headers());
    let declared_empty = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        == Some(0);
    let expects_body = status_allows_body(status) && *method != Method::HEAD;

    if is_text(&headers) {
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read sandbox response");
                return (StatusCode::BAD_GATEWAY, format!("bad gateway: {}", e)).into_response();
            }
        };

        if bytes.is_empty() && expects_body && !declared_empty {
            return null_response();
        }

        if expects_body {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        }
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
        return build_response(status, headers, Body::from(bytes));
    }

    let mut stream = Box::pin(response.bytes_stream());
    let first = loop {
        match stream.next().await {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => break Some(chunk),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "failed to read sandbox response");
                return (StatusCode::BAD_GATEWAY, format!("bad gateway: {}", e)).into_response();
            }
            None => break None,
        }
    };

    match first {
        Some(chunk) => {
            let body = tokio_stream::once(Ok::<Bytes, reqwest::Error>(chunk)).chain(stream);
            build_response(status, headers, Body::from_stream(body))
        }
        None if expects_body && !declared_empty => null_response(),
        None => build_response(status, headers, Body::empty()),
    }
}

fn null_response() -> Response {
    tracing::debug!("sandbox yielded no body");
    (StatusCode::INTERNAL_SERVER_ERROR, NULL_RESPONSE_BODY).into_response()
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn status_allows_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Whether the response is buffered: `text/*`, JSON, JavaScript or XML.
pub fn is_text(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("javascript")
        || mime.ends_with("xml")
}

fn strip_request_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower)
            || name == header::HOST
            || name == header::ACCEPT_ENCODING
            || name == header::CONTENT_LENGTH
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn strip_response_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(e) => tracing::debug!(header = name, error = %e, "skipping invalid header value"),
    }
}
