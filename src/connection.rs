//! Connection Factory (spec §4.2): opens a single authenticated WebSocket to a given URI with
//! signed headers.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/ws/factory.py` (`websocket_factory`)
//! and the `connect_async` usage in `examples/feothyuth-lr/src/ws_client.rs`'s `WsClient::connect`.

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Uri};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::errors::{Result, StreamError};

pub type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One signed header to attach to the WebSocket upgrade request.
#[derive(Debug, Clone)]
pub struct AuthHeader {
    pub name: &'static str,
    pub value: String,
}

/// Opens a WebSocket connection to `uri`, attaching `headers` to the HTTP upgrade request.
/// Failure surfaces as `ConnectFailed`; the caller decides retry policy.
pub async fn open(uri: &Uri, headers: &[AuthHeader]) -> Result<WsSocket> {
    let mut request = uri
        .to_string()
        .into_client_request()
        .map_err(|err| StreamError::ConnectFailed(err.to_string()))?;

    let request_headers = request.headers_mut();
    for header in headers {
        let value = HeaderValue::from_str(&header.value)
            .map_err(|err| StreamError::ConnectFailed(format!("invalid header value: {err}")))?;
        request_headers.insert(header.name, value);
    }
    let (socket, _response) = connect_async(request)
        .await
        .map_err(|err| StreamError::ConnectFailed(err.to_string()))?;

    Ok(socket)
}
