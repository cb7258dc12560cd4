//! Node connections.
//!
//! [`ChainClient`](crate::client::ChainClient) talks to a node only through an
//! erased alloy [`DynProvider`], so the HTTP provider can be swapped for one
//! over an in-memory transport in tests.

use alloy_provider::{Provider, ProviderBuilder};
use url::Url;

pub use alloy_provider::DynProvider;

/// HTTP JSON-RPC provider for `rpc_url`.
pub fn http_provider(rpc_url: &str) -> Result<DynProvider, String> {
    let url: Url = rpc_url
        .parse()
        .map_err(|e| format!("invalid rpc url {rpc_url}: {e}"))?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

/// Scripted in-memory transport for tests.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use alloy_json_rpc::{
        ErrorPayload, RequestPacket, Response, ResponsePacket, ResponsePayload, SerializedRequest,
    };
    use alloy_provider::{DynProvider, Provider, RootProvider};
    use alloy_rpc_client::RpcClient;
    use alloy_rpc_types_eth::Block;
    use alloy_transport::{TransportError, TransportErrorKind, TransportFut};
    use serde_json::value::RawValue;
    use serde_json::{json, Value};
    use thiserror::Error;

    /// How a scripted method fails.
    #[derive(Debug, Clone, Error, PartialEq)]
    pub enum RpcError {
        /// No JSON-RPC response at all (refused connection, HTTP status).
        #[error("transport error: {0}")]
        Transport(String),

        /// A JSON-RPC error object (includes reverts).
        #[error("rpc error {code}: {message}")]
        Rpc { code: i64, message: String },
    }

    type Handler = Box<dyn Fn(&Value) -> Result<Value, RpcError> + Send + Sync>;

    #[derive(Default)]
    struct Script {
        handlers: Mutex<HashMap<String, Handler>>,
        delays: Mutex<HashMap<String, Duration>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    /// Answers each method from a script and records every call.
    ///
    /// Clones share one script. Unscripted methods fail with JSON-RPC code
    /// -32601.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        script: Arc<Script>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// A provider whose every request lands in this script.
        pub fn provider(&self) -> DynProvider {
            RootProvider::new(RpcClient::new(self.clone(), true)).erased()
        }

        /// Always answer `method` with `result`.
        pub fn on(&self, method: &str, result: Value) -> &Self {
            self.on_fn(method, move |_| Ok(result.clone()))
        }

        /// Always fail `method` with `error`.
        pub fn fail(&self, method: &str, error: RpcError) -> &Self {
            self.on_fn(method, move |_| Err(error.clone()))
        }

        /// Answer `method` by calling `handler` with the request params.
        pub fn on_fn<F>(&self, method: &str, handler: F) -> &Self
        where
            F: Fn(&Value) -> Result<Value, RpcError> + Send + Sync + 'static,
        {
            lock(&self.script.handlers).insert(method.to_string(), Box::new(handler));
            self
        }

        /// Sleep for `delay` before answering `method`.
        pub fn with_delay(&self, method: &str, delay: Duration) -> &Self {
            lock(&self.script.delays).insert(method.to_string(), delay);
            self
        }

        /// Every request received so far, in order.
        pub fn calls(&self) -> Vec<(String, Value)> {
            lock(&self.script.calls).clone()
        }

        pub fn call_count(&self, method: &str) -> usize {
            lock(&self.script.calls)
                .iter()
                .filter(|(m, _)| m == method)
                .count()
        }

        async fn answer(&self, request: SerializedRequest) -> Result<Response, TransportError> {
            let method = request.method().to_string();
            let params: Value = match request.params() {
                Some(raw) => serde_json::from_str(raw.get()).map_err(TransportErrorKind::custom)?,
                None => Value::Null,
            };
            lock(&self.script.calls).push((method.clone(), params.clone()));

            let delay = lock(&self.script.delays).get(&method).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = match lock(&self.script.handlers).get(&method) {
                Some(handler) => handler(&params),
                None => Err(RpcError::Rpc {
                    code: -32601,
                    message: format!("method {method} not scripted"),
                }),
            };

            let payload = match outcome {
                Ok(result) => ResponsePayload::Success(
                    RawValue::from_string(result.to_string()).map_err(TransportErrorKind::custom)?,
                ),
                Err(RpcError::Rpc { code, message }) => ResponsePayload::Failure(ErrorPayload {
                    code,
                    message: message.into(),
                    data: None,
                }),
                Err(RpcError::Transport(reason)) => {
                    return Err(TransportErrorKind::custom_str(&reason))
                }
            };
            Ok(Response {
                id: request.id().clone(),
                payload,
            })
        }
    }

    impl tower::Service<RequestPacket> for ScriptedTransport {
        type Response = ResponsePacket;
        type Error = TransportError;
        type Future = TransportFut<'static>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, packet: RequestPacket) -> Self::Future {
            let transport = self.clone();
            Box::pin(async move {
                match packet {
                    RequestPacket::Single(request) => {
                        transport.answer(request).await.map(ResponsePacket::Single)
                    }
                    RequestPacket::Batch(requests) => {
                        let mut responses = Vec::with_capacity(requests.len());
                        for request in requests {
                            responses.push(transport.answer(request).await?);
                        }
                        Ok(ResponsePacket::Batch(responses))
                    }
                }
            })
        }
    }

    /// An `eth_getBlockByNumber` result: an empty block at height 1 with the
    /// given base fee (`None` for a pre-London block).
    pub fn block_with_base_fee(base_fee: Option<u64>) -> Value {
        let mut block: Block = Block::default();
        block.header.inner.number = 1;
        block.header.inner.base_fee_per_gas = base_fee;
        json!(block)
    }

    // A panicking handler poisons the lock; the script itself is still usable.
    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
