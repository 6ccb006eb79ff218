//! The connect handshake.
//!
//! Before a socket can be opened, the client trades its product and device
//! IDs (plus an optional access token) for a relay URL and a channel ID:
//!
//! ```text
//! POST {endpoint}/v1/client/connect   {"productId": .., "deviceId": ..}
//! 2xx  {"signalingUrl": .., "channelId": .., "deviceOnline": true}
//! 4xx  {"message": .., "code": "DEVICE_ID_NOT_FOUND"}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::HttpError;
use crate::core::constants::{DEVICE_ID_NOT_FOUND, PRODUCT_ID_NOT_FOUND};

/// Successful handshake result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConnectResponse {
    /// WebSocket URL of the relay.
    pub signaling_url: String,
    /// Channel to use on the relay.
    pub channel_id: String,
    /// Whether the device is currently connected to the relay.
    #[serde(default)]
    pub device_online: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Performs the connect handshake.
#[async_trait]
pub trait ConnectBackend: Send + Sync + 'static {
    /// Ask the service for a relay URL and channel.
    async fn client_connect(&self, access_token: Option<&str>) -> Result<ClientConnectResponse, HttpError>;
}

/// Interpret a handshake response by status code and body.
pub fn parse_connect_response(status: u16, body: &[u8]) -> Result<ClientConnectResponse, HttpError> {
    if (200..300).contains(&status) {
        return serde_json::from_slice(body).map_err(|_| HttpError::Unknown {
            status: Some(status),
            message: "OK response but failed to parse response body".to_string(),
        });
    }
    Err(map_error_response(status, body))
}

/// Map a non-2xx handshake response to an [`HttpError`].
pub fn map_error_response(status: u16, body: &[u8]) -> HttpError {
    let Ok(error) = serde_json::from_slice::<ErrorResponse>(body) else {
        return HttpError::Unknown {
            status: Some(status),
            message: "Failed to parse error response body".to_string(),
        };
    };
    match error.code.as_deref() {
        Some(PRODUCT_ID_NOT_FOUND) => HttpError::ProductIdNotFound {
            status,
            message: error.message,
        },
        Some(DEVICE_ID_NOT_FOUND) => HttpError::DeviceIdNotFound {
            status,
            message: error.message,
        },
        _ => HttpError::Unknown {
            status: Some(status),
            message: error.message,
        },
    }
}

#[cfg(feature = "http")]
pub use http::HttpBackend;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::core::constants::CLIENT_CONNECT_PATH;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct RequestBody<'a> {
        product_id: &'a str,
        device_id: &'a str,
    }

    /// [`ConnectBackend`] speaking HTTPS to the signaling service.
    #[derive(Debug, Clone)]
    pub struct HttpBackend {
        http: reqwest::Client,
        endpoint_url: String,
        product_id: String,
        device_id: String,
    }

    impl HttpBackend {
        /// Create a backend for one product/device pair.
        pub fn new(
            endpoint_url: impl Into<String>,
            product_id: impl Into<String>,
            device_id: impl Into<String>,
        ) -> Self {
            Self {
                http: reqwest::Client::new(),
                endpoint_url: endpoint_url.into(),
                product_id: product_id.into(),
                device_id: device_id.into(),
            }
        }

        /// Full URL of the connect request.
        pub fn connect_url(&self) -> String {
            format!("{}{}", self.endpoint_url.trim_end_matches('/'), CLIENT_CONNECT_PATH)
        }
    }

    fn transport_error(err: reqwest::Error) -> HttpError {
        HttpError::Unknown {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    #[async_trait]
    impl ConnectBackend for HttpBackend {
        async fn client_connect(&self, access_token: Option<&str>) -> Result<ClientConnectResponse, HttpError> {
            let body = RequestBody {
                product_id: &self.product_id,
                device_id: &self.device_id,
            };
            let mut request = self.http.post(self.connect_url()).json(&body);
            if let Some(token) = access_token {
                request = request.bearer_auth(token);
            }

            let res = request.send().await.map_err(transport_error)?;
            let status = res.status().as_u16();
            let bytes = res.bytes().await.map_err(transport_error)?;
            tracing::debug!(status, url = %self.connect_url(), "client connect response");
            parse_connect_response(status, &bytes)
        }
    }

}
