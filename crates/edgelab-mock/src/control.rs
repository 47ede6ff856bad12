//! Loopback control channel for the mock services.
//!
//! User code inside the sandbox cannot share memory with the orchestrator, so
//! the generated KV and Cache clients call these endpoints instead:
//!
//! - `POST /mock_kv/get?key=&namespace=&type=`
//! - `POST /mock_kv/put?key=&namespace=&kind=` (body is the value)
//! - `POST /mock_kv/delete?key=&namespace=`
//! - `POST /mock_cache/{get,put,delete}?key=`
//!
//! A KV `get` for a missing key answers `200` with an empty body and the
//! [`KV_GET_EMPTY_HEADER`] header set to `true`.

use crate::cache::{CachePutOptions, MockCache};
use crate::error::{MockError, Result};
use crate::kv::{KvGetType, KvOutput, KvValue, MockKv, ResponseSnapshot};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Response header marking a KV `get` miss.
pub const KV_GET_EMPTY_HEADER: &str = "kv-get-empty";

/// Response header marking a cache miss on `/mock_cache/get`.
pub const CACHE_MISS_HEADER: &str = "cache-miss";

/// Services reachable through the control channel.
#[derive(Debug, Clone)]
pub struct MockServices {
    pub cache: Arc<MockCache>,
    pub kv: Arc<MockKv>,
}

impl MockServices {
    pub fn new(cache: MockCache, kv: MockKv) -> Self {
        Self {
            cache: Arc::new(cache),
            kv: Arc::new(kv),
        }
    }

    /// Build the control router.
    pub fn router(self) -> Router {
        Router::new()
            .route("/mock_kv/get", post(kv_get))
            .route("/mock_kv/put", post(kv_put))
            .route("/mock_kv/delete", post(kv_delete))
            .route("/mock_cache/get", post(cache_get))
            .route("/mock_cache/put", post(cache_put))
            .route("/mock_cache/delete", post(cache_delete))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }
}

/// A running control server bound to a loopback port.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Bind the control router to `127.0.0.1:port` (`0` picks a free port) and
    /// serve it in the background.
    pub async fn bind(services: MockServices, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let addr = listener.local_addr()?;
        let app = services.router();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "mock control server stopped");
            }
        });

        tracing::debug!(%addr, "mock control server listening");
        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Origin the generated client code should call, e.g. `http://127.0.0.1:4821`.
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[derive(Debug, Deserialize)]
struct KvQuery {
    key: String,
    namespace: String,
    #[serde(rename = "type")]
    ty: Option<String>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CacheQuery {
    key: String,
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let status = match self {
            MockError::UnsupportedType(_)
            | MockError::InvalidJson { .. }
            | MockError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn kv_get(
    State(services): State<MockServices>,
    Query(query): Query<KvQuery>,
) -> Result<Response> {
    let ty = match query.ty.as_deref() {
        Some(ty) => ty.parse::<KvGetType>()?,
        None => KvGetType::default(),
    };

    let response = match services.kv.get(&query.namespace, &query.key, ty)? {
        None => Response::builder()
            .status(StatusCode::OK)
            .header(KV_GET_EMPTY_HEADER, "true")
            .body(Body::empty()),
        Some(KvOutput::Text(text)) => Response::builder()
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(text)),
        Some(KvOutput::Json(value)) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value)?)),
        Some(KvOutput::Bytes(bytes)) => Response::builder()
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(bytes)),
    };

    response.map_err(|e| MockError::InvalidValue(e.to_string()))
}

async fn kv_put(
    State(services): State<MockServices>,
    Query(query): Query<KvQuery>,
    body: Bytes,
) -> Result<StatusCode> {
    let value = match query.kind.as_deref().unwrap_or("text") {
        "text" => KvValue::Text(
            String::from_utf8(body.to_vec())
                .map_err(|_| MockError::InvalidValue("text value is not UTF-8".to_string()))?,
        ),
        "bytes" => KvValue::Bytes(body.to_vec()),
        "response" => {
            let snapshot: ResponseSnapshot = serde_json::from_slice(&body).map_err(|e| {
                MockError::InvalidValue(format!("response value must be {{body, headers, status}}: {e}"))
            })?;
            KvValue::Response(snapshot)
        }
        other => return Err(MockError::InvalidValue(format!("unknown value kind '{other}'"))),
    };

    services.kv.put(&query.namespace, &query.key, value)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn kv_delete(
    State(services): State<MockServices>,
    Query(query): Query<KvQuery>,
) -> Result<Json<bool>> {
    Ok(Json(services.kv.delete(&query.namespace, &query.key)?))
}

async fn cache_get(
    State(services): State<MockServices>,
    Query(query): Query<CacheQuery>,
) -> Response {
    match services.cache.get(&query.key) {
        Some(cached) => Json(cached).into_response(),
        None => (StatusCode::NOT_FOUND, [(CACHE_MISS_HEADER, "true")]).into_response(),
    }
}

async fn cache_put(
    State(services): State<MockServices>,
    Query(query): Query<CacheQuery>,
    Json(options): Json<CachePutOptions>,
) -> StatusCode {
    services.cache.put(&query.key, options);
    StatusCode::NO_CONTENT
}

async fn cache_delete(
    State(services): State<MockServices>,
    Query(query): Query<CacheQuery>,
) -> Json<bool> {
    Json(services.cache.delete(&query.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn services() -> MockServices {
        MockServices::new(MockCache::new(), MockKv::in_memory())
    }

    async fn call(router: Router, uri: &str, body: impl Into<Body>) -> Response {
        router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_kv_get_missing_sets_empty_header() {
        let router = services().router();
        let response = call(router, "/mock_kv/get?key=nope&namespace=ns", Body::empty()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[KV_GET_EMPTY_HEADER], "true");
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_kv_put_then_get_empty_string_is_found() {
        let services = services();
        let put = call(services.clone().router(), "/mock_kv/put?key=k&namespace=ns", "").await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);

        let got = call(services.router(), "/mock_kv/get?key=k&namespace=ns", Body::empty()).await;
        assert!(got.headers().get(KV_GET_EMPTY_HEADER).is_none());
        assert_eq!(body_string(got).await, "");
    }

    #[tokio::test]
    async fn test_kv_get_unsupported_type_is_bad_request() {
        let services = services();
        call(services.clone().router(), "/mock_kv/put?key=k&namespace=ns", "v").await;

        let response = call(
            services.router(),
            "/mock_kv/get?key=k&namespace=ns&type=stream",
            Body::empty(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("stream"));
    }

    #[tokio::test]
    async fn test_kv_put_response_kind() {
        let services = services();
        let put = call(
            services.clone().router(),
            "/mock_kv/put?key=r&namespace=ns&kind=response",
            r#"{"body":"hi","headers":{"x-a":"1"},"status":201}"#,
        )
        .await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);

        let got = call(
            services.router(),
            "/mock_kv/get?key=r&namespace=ns&type=json",
            Body::empty(),
        )
        .await;
        let json: serde_json::Value = serde_json::from_str(&body_string(got).await).unwrap();
        assert_eq!(json["status"], 201);
        assert_eq!(json["headers"]["x-a"], "1");
    }

    #[tokio::test]
    async fn test_kv_delete_returns_bool() {
        let services = services();
        call(services.clone().router(), "/mock_kv/put?key=k&namespace=ns", "v").await;

        let first = call(services.clone().router(), "/mock_kv/delete?key=k&namespace=ns", "").await;
        assert_eq!(body_string(first).await, "true");
        let second = call(services.router(), "/mock_kv/delete?key=k&namespace=ns", "").await;
        assert_eq!(body_string(second).await, "false");
    }

    #[tokio::test]
    async fn test_cache_endpoints() {
        let services = services();
        let miss = call(services.clone().router(), "/mock_cache/get?key=a", Body::empty()).await;
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);

        let put = Request::builder()
            .method("POST")
            .uri("/mock_cache/put?key=a")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"ttl":0,"status":200,"body":"cached"}"#))
            .unwrap();
        let response = services.clone().router().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let hit = call(services.clone().router(), "/mock_cache/get?key=a", Body::empty()).await;
        assert_eq!(hit.status(), StatusCode::OK);
        assert!(body_string(hit).await.contains("cached"));

        let deleted = call(services.router(), "/mock_cache/delete?key=a", "").await;
        assert_eq!(body_string(deleted).await, "true");
    }

    #[tokio::test]
    async fn test_mock_server_binds_loopback() {
        let server = MockServer::bind(services(), 0).await.unwrap();
        assert!(server.addr().ip().is_loopback());
        assert!(server.origin().starts_with("http://127.0.0.1:"));
        server.shutdown();
    }
}
