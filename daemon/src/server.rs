/// HTTP server implementation
///
/// A single `POST /rpc` route carries every operation as a JSON-RPC 2.0
/// envelope; `GET /health` answers liveness probes. The acting identity
/// travels in the `x-taskhub-namespace` and `x-hunter-id` headers (hyper
/// header lookup is case-insensitive, so any casing works).
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::HeaderMap;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use tracing::{error, info};

use crate::errors::{DaemonError, DaemonResult};
use crate::rpc::JsonRpcServer;
use crate::types::{RpcRequest, RpcResponse};

/// Header naming the caller's namespace.
pub const NAMESPACE_HEADER: &str = "x-taskhub-namespace";

/// Header naming the acting hunter.
pub const HUNTER_HEADER: &str = "x-hunter-id";

/// Run the HTTP listener until the shutdown future resolves.
pub async fn run_server(
    addr: SocketAddr,
    rpc: Arc<JsonRpcServer>,
    shutdown: impl std::future::Future<Output = ()>,
) -> DaemonResult<()> {
    let make_svc = make_service_fn(move |_conn| {
        let rpc = Arc::clone(&rpc);
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                handle_request(Arc::clone(&rpc), request)
            }))
        }
    });

    info!(%addr, "taskhub daemon listening");
    Server::try_bind(&addr)
        .map_err(|e| DaemonError::Server(format!("failed to bind {}: {}", addr, e)))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| DaemonError::Server(e.to_string()))
}

async fn handle_request(
    rpc: Arc<JsonRpcServer>,
    request: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let response = match (request.method(), request.uri().path()) {
        (&Method::GET, "/health") => json_response(
            StatusCode::OK,
            &json!({ "status": "ok", "service": "taskhub" }),
        ),
        (&Method::POST, "/rpc") => handle_rpc(rpc, request).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "not found; POST /rpc or GET /health" }),
        ),
    };
    Ok(response)
}

async fn handle_rpc(rpc: Arc<JsonRpcServer>, request: Request<Body>) -> Response<Body> {
    let namespace = header_value(request.headers(), NAMESPACE_HEADER);
    let hunter_id = header_value(request.headers(), HUNTER_HEADER);

    let body = match hyper::body::to_bytes(request.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to read request body");
            let response = RpcResponse::error(-32700, "Parse error".to_string(), None);
            return rpc_response(&response);
        }
    };

    let parsed: RpcRequest = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            let response = RpcResponse::error(-32700, format!("Parse error: {}", e), None);
            return rpc_response(&response);
        }
    };

    let response = rpc.process_request(parsed, namespace, hunter_id).await;
    rpc_response(&response)
}

/// Read one identity header as an owned string, if present and valid UTF-8.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn rpc_response(response: &RpcResponse) -> Response<Body> {
    // RPC-level failures still travel as HTTP 200 with the error object.
    json_response(StatusCode::OK, response)
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::from("{}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Taskhub-Namespace", HeaderValue::from_static("team-a"));
        headers.insert("X-HUNTER-ID", HeaderValue::from_static("h1"));
        assert_eq!(
            header_value(&headers, NAMESPACE_HEADER).as_deref(),
            Some("team-a")
        );
        assert_eq!(header_value(&headers, HUNTER_HEADER).as_deref(), Some("h1"));
    }

    #[test]
    fn test_missing_header_is_none() {
        let headers = HeaderMap::new();
        assert!(header_value(&headers, NAMESPACE_HEADER).is_none());
    }
}
