/// Type definitions for the RPC daemon
use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: Option<serde_json::Value>) -> Self {
        RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(code: i64, message: String, id: Option<serde_json::Value>) -> Self {
        RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError { code, message }),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_omits_error_field() {
        let response = RpcResponse::success(json!({"ok": true}), Some(json!(1)));
        let rendered = serde_json::to_value(&response).unwrap();
        assert!(rendered.get("error").is_none());
        assert_eq!(rendered["result"]["ok"], json!(true));
        assert_eq!(rendered["id"], json!(1));
    }

    #[test]
    fn test_error_omits_result_field() {
        let response = RpcResponse::error(-32601, "Method not found".to_string(), None);
        let rendered = serde_json::to_value(&response).unwrap();
        assert!(rendered.get("result").is_none());
        assert_eq!(rendered["error"]["code"], json!(-32601));
    }

    #[test]
    fn test_request_parses_without_params() {
        let request: RpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "system.stats"})).unwrap();
        assert_eq!(request.method, "system.stats");
        assert!(request.params.is_none());
        assert!(request.id.is_none());
    }
}
