use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::accounts::UserSummary;
use crate::auth::AuthUser;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub name: Option<String>,
}

/// Users a signed-in user can pick as candidates or voters.
pub async fn search(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<CandidateQuery>,
) -> Json<Vec<UserSummary>> {
    Json(state.users.search_candidates(query.name.as_deref()))
}
