use axum::{extract::State, Json};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::services::InviteReport;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub emails: Vec<String>,
}

pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteReport>, ApiError> {
    if request.emails.is_empty() {
        return Err(ApiError::bad_request("emails must not be empty"));
    }
    let report = state.invites.send_invites(&request.emails).await?;
    if report.sent.is_empty() {
        return Err(ApiError::not_found("No invite could be sent"));
    }
    tracing::info!(user_id = user.id(), sent = report.sent.len(), "Invites sent");
    Ok(Json(report))
}
