//! Contract lifecycle hooks.
//!
//! The system that owns contracts calls these after it commits a change.
//! Every write endpoint takes the full contract so the reminder row can
//! carry the current recipient details.

use axum::{
    extract::{Query, State},
    Json,
};
use duebell_core::Contract;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, ApiError};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ContractRef {
    pub contract_id: String,
}

/// POST /contracts/created
pub async fn created_handler(
    State(state): State<Arc<AppState>>,
    Json(contract): Json<Contract>,
) -> Result<Json<Value>, ApiError> {
    let reminder = state
        .scheduler
        .on_contract_created(&contract)
        .map_err(api_error)?;
    Ok(Json(json!({"reminder": reminder})))
}

/// POST /contracts/due-date
///
/// `reminder` is null when nothing was pending to move.
pub async fn due_date_handler(
    State(state): State<Arc<AppState>>,
    Json(contract): Json<Contract>,
) -> Result<Json<Value>, ApiError> {
    let reminder = state
        .scheduler
        .on_contract_due_date_changed(&contract)
        .map_err(api_error)?;
    Ok(Json(json!({"reminder": reminder})))
}

/// POST /contracts/cancelled
pub async fn cancelled_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContractRef>,
) -> Result<Json<Value>, ApiError> {
    let cancelled = state
        .scheduler
        .cancel_pending(&body.contract_id)
        .map_err(api_error)?;
    Ok(Json(json!({"cancelled": cancelled})))
}

/// POST /contracts/next-cycle
pub async fn next_cycle_handler(
    State(state): State<Arc<AppState>>,
    Json(contract): Json<Contract>,
) -> Result<Json<Value>, ApiError> {
    let (next_due, reminder) = state
        .scheduler
        .schedule_next_cycle(&contract)
        .map_err(api_error)?;
    Ok(Json(json!({
        "next_due_date": next_due.format("%Y-%m-%d").to_string(),
        "reminder": reminder,
    })))
}

/// GET /contracts/reminders?contract_id=...
pub async fn reminders_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ContractRef>,
) -> Result<Json<Value>, ApiError> {
    let reminders = state
        .scheduler
        .store()
        .list_for_contract(&q.contract_id)
        .map_err(api_error)?;
    Ok(Json(json!({"contract_id": q.contract_id, "reminders": reminders})))
}

#[cfg(test)]
mod tests {
    use crate::app::{build_router, test_support, AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::{DateTime, Utc};
    use duebell_core::DuebellConfig;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn costa_rica() -> Arc<AppState> {
        let mut config = DuebellConfig::default();
        config.reminders.timezone = "America/Costa_Rica".to_string();
        test_support::state(config)
    }

    fn contract(due: &str) -> Value {
        json!({
            "id": "ctr-7",
            "client_name": "Ana Mora",
            "phone": "8888-1234",
            "due_date": due,
            "billing_cycle": "monthly",
        })
    }

    async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(state: &Arc<AppState>, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        call(state, req).await
    }

    fn instant(v: &Value) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(v.as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn created_then_due_date_change_moves_same_reminder() {
        let state = costa_rica();

        let (status, v) = post(&state, "/contracts/created", contract("2026-02-10")).await;
        assert_eq!(status, StatusCode::OK);
        let id = v["reminder"]["id"].as_str().unwrap().to_string();
        assert_eq!(v["reminder"]["status"], "pending");
        assert_eq!(
            instant(&v["reminder"]["scheduled_for"]),
            DateTime::parse_from_rfc3339("2026-02-10T09:00:00-06:00").unwrap()
        );

        let (status, v) = post(&state, "/contracts/due-date", contract("2026-02-15")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["reminder"]["id"], id.as_str());
        assert_eq!(
            instant(&v["reminder"]["scheduled_for"]),
            DateTime::parse_from_rfc3339("2026-02-15T09:00:00-06:00").unwrap()
        );

        let (status, v) = call(
            &state,
            Request::get("/contracts/reminders?contract_id=ctr-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["reminders"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn due_date_change_without_pending_returns_null() {
        let state = costa_rica();
        let (status, v) = post(&state, "/contracts/due-date", contract("2026-02-15")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["reminder"].is_null());
    }

    #[tokio::test]
    async fn cancel_then_next_cycle() {
        let state = costa_rica();
        post(&state, "/contracts/created", contract("2026-01-31")).await;

        let (_, v) = post(&state, "/contracts/next-cycle", contract("2026-01-31")).await;
        assert_eq!(v["next_due_date"], "2026-02-28");
        assert!(v["reminder"].is_null());

        let (_, v) = post(&state, "/contracts/cancelled", json!({"contract_id": "ctr-7"})).await;
        assert_eq!(v["cancelled"], 1);

        let (_, v) = post(&state, "/contracts/next-cycle", contract("2026-01-31")).await;
        assert_eq!(v["reminder"]["due_date"], "2026-02-28");
        assert_eq!(v["reminder"]["status"], "pending");
    }

    #[tokio::test]
    async fn blank_contract_id_is_unprocessable() {
        let state = costa_rica();
        let mut c = contract("2026-02-10");
        c["id"] = json!("  ");
        let (status, v) = post(&state, "/contracts/created", c).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(v["code"], "INVALID_CONTRACT");
    }

    #[tokio::test]
    async fn health_reports_window_and_session() {
        let state = costa_rica();
        let (status, v) = call(&state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "ok");
        assert_eq!(v["whatsapp"], "disconnected");
        assert_eq!(v["timezone"], "America/Costa_Rica");
        assert_eq!(v["send_time"], "09:00");
    }
}
