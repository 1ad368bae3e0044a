use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::handlers::{message, Message};
use crate::http::server::AppState;
use crate::services::users::SessionOutcome;
use crate::services::{SignUp, SignUpOutcome};

#[derive(Debug, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPassword {
    pub token: String,
    pub password: String,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUp>,
) -> Result<(StatusCode, Json<SignUpOutcome>), ApiError> {
    let outcome = state.users.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignIn>,
) -> Result<Json<SessionOutcome>, ApiError> {
    let session = state.users.sign_in(&request.email, &request.password).await?;
    Ok(Json(session))
}

pub async fn send_recovery_link(
    State(state): State<AppState>,
    Json(request): Json<RecoveryRequest>,
) -> Result<Json<Message>, ApiError> {
    state.users.send_recovery_link(&request.email).await?;
    Ok(message("Recovery link sent"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPassword>,
) -> Result<Json<Message>, ApiError> {
    state.users.reset_password(&request.token, &request.password).await?;
    Ok(message("Password changed"))
}
