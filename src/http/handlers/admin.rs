use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::ledger::Election;

/// Elections the caller administers.
pub async fn elections(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Election>>, ApiError> {
    Ok(Json(state.elections.admin_elections(user.id()).await?))
}
