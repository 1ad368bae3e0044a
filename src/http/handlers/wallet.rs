use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::blockchain::FundingReport;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::services::WalletInfo;

pub async fn show(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<WalletInfo>, ApiError> {
    Ok(Json(state.users.wallet(user.id()).await?))
}

/// Top the caller's wallet up to the funding target.
pub async fn fund(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<FundingReport>, ApiError> {
    Ok(Json(state.users.fund_wallet(user.id()).await?))
}
