//! WhatsApp session endpoints.
//!
//! The bridge in front of the WhatsApp client reports lifecycle events to
//! `POST /whatsapp/events`; operators read the resulting session state from
//! `GET /whatsapp/status` (including the QR code to scan while pending).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use duebell_channels::ChannelEvent;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use super::{api_error, ApiError};
use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// GET /whatsapp/status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.session.snapshot().map_err(api_error)?;
    Ok(Json(json!(snapshot)))
}

/// POST /whatsapp/events
///
/// Body is one event: `{"event":"qr","qr":"..."}`, `{"event":"ready"}` or
/// `{"event":"disconnected","reason":"..."}`. Returns the session snapshot
/// after the transition.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if let Some(secret) = state.config.whatsapp.webhook_secret.as_deref() {
        verify_signature(&headers, &body, secret).map_err(|e| auth_error(&e))?;
    }

    let event: ChannelEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid whatsapp event body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid event body", "reason": e.to_string()})),
        )
    })?;

    info!(event = event.name(), "whatsapp event received");
    let session = state.session.apply(event).map_err(api_error)?;
    Ok(Json(json!(session.snapshot())))
}

/// `sha256=<hex>` HMAC of the raw body in the `X-Signature-256` header.
fn verify_signature(headers: &HeaderMap, body: &Bytes, secret: &str) -> Result<(), String> {
    let sig_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing X-Signature-256 header".to_string())?;

    let sig_hex = sig_header
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed X-Signature-256 header".to_string())?;

    let expected =
        hex::decode(sig_hex).map_err(|_| "X-Signature-256 is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| "HMAC signature mismatch".to_string())
}

fn auth_error(reason: &str) -> ApiError {
    warn!(reason = %reason, "whatsapp event authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, test_support};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use duebell_core::DuebellConfig;
    use tower::ServiceExt;

    fn sign(secret: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    async fn post_event(
        router: axum::Router,
        body: &str,
        signature: Option<String>,
    ) -> (StatusCode, Value) {
        let mut req = Request::post("/whatsapp/events").header("content-type", "application/json");
        if let Some(sig) = signature {
            req = req.header(SIGNATURE_HEADER, sig);
        }
        let resp = router
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn status_starts_disconnected() {
        let router = build_router(test_support::state(DuebellConfig::default()));
        let resp = router
            .oneshot(Request::get("/whatsapp/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["status"], "disconnected");
        assert!(v["qr"].is_null());
    }

    #[tokio::test]
    async fn qr_then_ready_events_drive_the_session() {
        let state = test_support::state(DuebellConfig::default());

        let (status, v) =
            post_event(build_router(state.clone()), r#"{"event":"qr","qr":"2@abc"}"#, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "pending");
        assert_eq!(v["qr"], "2@abc");
        assert!(!v["generated_at"].is_null());

        let (_, v) = post_event(build_router(state.clone()), r#"{"event":"ready"}"#, None).await;
        assert_eq!(v["status"], "ready");
        assert!(v["qr"].is_null());
        assert!(state.session.is_ready().unwrap());

        let (_, v) = post_event(
            build_router(state.clone()),
            r#"{"event":"disconnected","reason":"LOGOUT"}"#,
            None,
        )
        .await;
        assert_eq!(v["status"], "disconnected");
        assert_eq!(v["last_disconnect_reason"], "LOGOUT");
    }

    #[tokio::test]
    async fn unknown_event_is_bad_request() {
        let state = test_support::state(DuebellConfig::default());
        let (status, _) = post_event(build_router(state.clone()), r#"{"event":"typing"}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!state.session.is_ready().unwrap());
    }

    #[tokio::test]
    async fn signed_events_require_valid_signature() {
        let mut config = DuebellConfig::default();
        config.whatsapp.webhook_secret = Some("s3cret".to_string());
        let state = test_support::state(config);
        let body = r#"{"event":"ready"}"#;

        let (status, _) = post_event(build_router(state.clone()), body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_event(build_router(state.clone()), body, Some(sign("wrong", body))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!state.session.is_ready().unwrap());

        let (status, v) =
            post_event(build_router(state.clone()), body, Some(sign("s3cret", body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "ready");
    }
}
