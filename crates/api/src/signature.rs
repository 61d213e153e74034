//! GitHub webhook signature verification middleware.
//!
//! GitHub signs each delivery with `X-Hub-Signature-256: sha256=<hex>`, the
//! HMAC-SHA256 of the raw body under the shared webhook secret. The
//! middleware buffers the body, checks the signature in constant time and
//! hands the same bytes on to the handler.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing X-Hub-Signature-256 header")]
    Missing,

    #[error("Malformed signature header")]
    Malformed,

    #[error("Invalid signature")]
    Invalid,
}

impl SignatureError {
    pub fn code(&self) -> &'static str {
        match self {
            SignatureError::Missing => "MISSING_SIGNATURE",
            SignatureError::Malformed | SignatureError::Invalid => "INVALID_SIGNATURE",
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct SignatureErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(SignatureErrorBody {
                error: self.to_string(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Webhook verification settings shared by every request.
#[derive(Clone)]
pub struct WebhookVerifier {
    /// `None` only in insecure development mode
    secret: Option<Arc<[u8]>>,
    max_body_bytes: usize,
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>, max_body_bytes: usize) -> Self {
        Self {
            secret: Some(Arc::from(secret.as_ref())),
            max_body_bytes,
        }
    }

    /// Accept every delivery without checking signatures.
    pub fn insecure(max_body_bytes: usize) -> Self {
        Self {
            secret: None,
            max_body_bytes,
        }
    }

    pub fn is_insecure(&self) -> bool {
        self.secret.is_none()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Check a `sha256=<hex>` header value against `body`.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let Some(ref secret) = self.secret else {
            return Ok(());
        };
        let header = header.ok_or(SignatureError::Missing)?;
        let provided = header
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .and_then(|h| hex::decode(h).ok())
            .ok_or(SignatureError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Invalid)?;
        mac.update(body);
        mac.verify_slice(&provided).map_err(|_| SignatureError::Invalid)
    }
}

/// Signature header value for `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Reject webhook deliveries that are too large or not signed with the
/// shared secret.
pub async fn verify_signature(
    State(verifier): State<WebhookVerifier>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, verifier.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, limit = verifier.max_body_bytes, "Rejected webhook body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(SignatureErrorBody {
                    error: format!("Request body exceeds {} bytes", verifier.max_body_bytes),
                    code: "PAYLOAD_TOO_LARGE",
                }),
            )
                .into_response();
        }
    };

    if verifier.is_insecure() {
        debug!("Signature verification disabled, accepting delivery");
    } else {
        let header = parts
            .headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verifier.verify(&bytes, header) {
            warn!(error = %e, "Rejected webhook delivery");
            return e.into_response();
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
