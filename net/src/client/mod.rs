//! JSON-RPC 2.0 over HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;
use url::Url;

/// Result type for node requests.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the node.
///
/// The variants up to `Connection` map 1:1 from the JSON-RPC error codes the
/// node returns; any unrecognized code falls back to `Connection` carrying
/// the raw code and message.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The requested block does not exist on the node (code -5).
    #[error("block not found: {0}")]
    BlockNotFound(String),
    /// A request parameter was rejected by the node (code -8).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The request envelope itself was malformed (code -32600).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The node does not know the requested method (code -32601).
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// The node failed internally while serving the request (code -32603).
    #[error("internal node error: {0}")]
    InternalRpc(String),
    /// Any other error reported by the node.
    #[error("node connection failed (code {code}): {message}")]
    Connection {
        /// Raw error code as reported by the node.
        code: i64,
        /// Raw error message as reported by the node.
        message: String,
    },
    /// The HTTP request could not be completed (includes timeouts).
    #[error("transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The node URL could not be parsed.
    #[error("invalid node url: {0}")]
    Url(#[from] url::ParseError),
    /// The node's response could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl Error {
    /// Map a JSON-RPC error code reported by the node to the taxonomy above.
    pub fn from_code(code: i64, message: String) -> Self {
        match code {
            -5 => Error::BlockNotFound(message),
            -8 => Error::InvalidArgument(message),
            -32600 => Error::InvalidRequest(message),
            -32601 => Error::MethodNotFound(message),
            -32603 => Error::InternalRpc(message),
            _ => Error::Connection { code, message },
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'a str,
    id: &'a str,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct Envelope {
    result: Option<Value>,
    error: Option<RpcErrorDetail>,
}

#[derive(Deserialize)]
struct RpcErrorDetail {
    code: i64,
    message: String,
}

/// Asynchronous JSON-RPC 2.0 client over a single HTTP endpoint.
#[derive(Clone)]
pub struct JsonRpcClient {
    url: Url,
    client: reqwest::Client,
    auth: Option<(String, String)>,
}

impl JsonRpcClient {
    /// Create a client for `url`, e.g. `"http://127.0.0.1:18332"`.
    ///
    /// `auth` is an optional basic-auth (user, password) pair. `timeout`
    /// bounds every request issued through this client; a timed-out call
    /// surfaces as [`Error::Transport`] with no retry.
    pub fn new(url: &str, auth: Option<(String, String)>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { url, client, auth })
    }

    /// Perform one JSON-RPC call and return the `result` value.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = Request {
            jsonrpc: "2.0",
            id: "satsync",
            method,
            params: &params,
        };
        log::debug!("rpc call: {} {}", method, params);

        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Connection {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| Error::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            log::debug!("rpc error: {} code {}: {}", method, error.code, error.message);
            return Err(Error::from_code(error.code, error.message));
        }

        envelope
            .result
            .ok_or_else(|| Error::Decode(format!("missing result for method {method}")))
    }
}
