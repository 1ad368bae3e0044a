//! Election endpoints. Every mutation acts with the caller's wallet.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::http::error::ApiError;
use crate::http::handlers::{message, Message};
use crate::http::server::AppState;
use crate::ledger::{Election, ElectionResult};
use crate::services::{CreateElection, ElectionDetail, VoterEntry};

#[derive(Debug, Deserialize)]
pub struct EndElection {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtendElection {
    pub secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddVoters {
    pub voters: Vec<VoterEntry>,
}

#[derive(Debug, Serialize)]
pub struct AddedVoters {
    pub voter_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVoter {
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CastVote {
    pub candidate_id: u64,
}

#[derive(Debug, Serialize)]
pub struct VoteStatus {
    pub has_voted: bool,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateElection>,
) -> Result<(StatusCode, Json<ElectionDetail>), ApiError> {
    let detail = state.elections.create_election(user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn open(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Election>>, ApiError> {
    Ok(Json(state.elections.open_elections().await?))
}

pub async fn results(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<ElectionResult>>, ApiError> {
    Ok(Json(state.elections.results().await?))
}

pub async fn mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Election>>, ApiError> {
    Ok(Json(state.elections.my_elections(user.id()).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<ElectionDetail>, ApiError> {
    Ok(Json(state.elections.detail(id).await?))
}

pub async fn start(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Election>, ApiError> {
    Ok(Json(state.elections.start(user.id(), id).await?))
}

pub async fn end(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(request): Json<EndElection>,
) -> Result<Json<Election>, ApiError> {
    Ok(Json(state.elections.end(user.id(), id, &request.reason).await?))
}

pub async fn extend(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(request): Json<ExtendElection>,
) -> Result<Json<Election>, ApiError> {
    Ok(Json(state.elections.extend(user.id(), id, request.secs).await?))
}

pub async fn add_voters(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(request): Json<AddVoters>,
) -> Result<(StatusCode, Json<AddedVoters>), ApiError> {
    let voter_ids = state.elections.add_voters(user.id(), id, request.voters).await?;
    Ok((StatusCode::CREATED, Json(AddedVoters { voter_ids })))
}

pub async fn update_voter(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, voter_id)): Path<(u64, u64)>,
    Json(request): Json<UpdateVoter>,
) -> Result<Json<Message>, ApiError> {
    state
        .elections
        .update_voter(user.id(), id, voter_id, &request.name, &request.password)
        .await?;
    Ok(message("Voter updated"))
}

pub async fn remove_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, candidate_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    state.elections.remove_candidate(user.id(), id, candidate_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, candidate_id)): Path<(u64, u64)>,
) -> Result<StatusCode, ApiError> {
    state.elections.withdraw(user.id(), id, candidate_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
    Json(request): Json<CastVote>,
) -> Result<Json<Message>, ApiError> {
    state.elections.cast_vote(user.id(), id, request.candidate_id).await?;
    Ok(message("Vote cast"))
}

pub async fn has_voted(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<VoteStatus>, ApiError> {
    let has_voted = state.elections.has_voted(user.id(), id).await?;
    Ok(Json(VoteStatus { has_voted }))
}
