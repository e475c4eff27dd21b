// Taskhub daemon: JSON-RPC over HTTP transport for the coordination engine

pub mod errors;
pub mod rpc;
pub mod server;
pub mod types;

pub use errors::{DaemonError, DaemonResult};
pub use rpc::JsonRpcServer;
pub use server::{run_server, HUNTER_HEADER, NAMESPACE_HEADER};
pub use types::{RpcError, RpcRequest, RpcResponse};
