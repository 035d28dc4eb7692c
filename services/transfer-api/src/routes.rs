use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use transfer_models::{
    SecuritySettings, SecurityUpdate, SecurityUpdateReceipt, TransferReceipt, TransferRequest,
    VerifyRequest, VerifyResponse,
};

use crate::error::TransferError;
use crate::service::TransferService;
use crate::session::Caller;

pub type AppState = Arc<TransferService>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/transfers", post(create_transfer))
        .route("/v1/transfers/verify", post(verify_transfer))
        .route(
            "/v1/users/me/security",
            get(get_security).put(update_security),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler still answers with the regular internal-error body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "unknown panic".to_string()
    };
    TransferError::Internal(format!("handler panicked: {detail}")).into_response()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, TransferError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| TransferError::Validation(rejection.body_text()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "transfer-api",
        "timestamp": Utc::now()
    }))
}

async fn create_transfer(
    State(service): State<AppState>,
    caller: Caller,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, TransferError> {
    let request = body(payload)?;
    service.transfer(&caller, &request).await.map(Json)
}

async fn verify_transfer(
    State(service): State<AppState>,
    caller: Caller,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, TransferError> {
    let request = body(payload)?;
    service.verify(&caller, &request).await.map(Json)
}

async fn get_security(
    State(service): State<AppState>,
    caller: Caller,
) -> Result<Json<SecuritySettings>, TransferError> {
    service.security_settings(&caller).await.map(Json)
}

async fn update_security(
    State(service): State<AppState>,
    caller: Caller,
    payload: Result<Json<SecurityUpdate>, JsonRejection>,
) -> Result<Json<SecurityUpdateReceipt>, TransferError> {
    let update = body(payload)?;
    service.update_security(&caller, &update).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn panicking_handler_becomes_internal_error() {
        let app = Router::new()
            .route("/boom", get(|| async { panic!("ledger exploded") as () }))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], json!("INTERNAL_ERROR"));
        assert_eq!(body["error"], json!("Transfer failed"));
    }

    #[test]
    fn panic_payloads_of_any_type_are_handled() {
        let response = panic_response(Box::new(42_u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
