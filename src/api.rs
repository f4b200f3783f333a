//! HTTP API endpoints.
//!
//! Moderator and participant requests both land here. Participants identify
//! themselves with an opaque key in the `x-identity-key` header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{Committed, TournamentError};
use crate::sink::TournamentResults;
use crate::state::{AppState, ParticipantView, TournamentView, VoteReceipt};

pub const IDENTITY_KEY_HEADER: &str = "x-identity-key";

/// Error body, `{ "code": "DUPLICATE_VOTE", "msg": "..." }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

#[derive(Debug)]
pub struct ApiError(pub TournamentError);

impl From<TournamentError> for ApiError {
    fn from(e: TournamentError) -> Self {
        Self(e)
    }
}

fn status_for(error: &TournamentError) -> StatusCode {
    match error {
        TournamentError::InvalidInput(_) | TournamentError::InvalidCode(_) => {
            StatusCode::BAD_REQUEST
        }
        TournamentError::IdentityMismatch(_) => StatusCode::FORBIDDEN,
        TournamentError::UnknownTournament(_) | TournamentError::UnknownParticipant(_) => {
            StatusCode::NOT_FOUND
        }
        TournamentError::InsufficientPrompts { .. }
        | TournamentError::NotInWaitingState { .. }
        | TournamentError::DuplicateVote
        | TournamentError::VotingClosed
        | TournamentError::AlreadyRegistered(_)
        | TournamentError::AlreadyStarted { .. }
        | TournamentError::NotStarted
        | TournamentError::GameOver
        | TournamentError::NoActiveMatchup => StatusCode::CONFLICT,
        TournamentError::PersistenceFailure(_) | TournamentError::InconsistentBracket(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            code: self.0.code().to_string(),
            msg: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn identity_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDENTITY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

fn require_identity_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    identity_key(headers).ok_or_else(|| {
        ApiError(TournamentError::InvalidInput(format!(
            "missing {} header",
            IDENTITY_KEY_HEADER
        )))
    })
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub first_name: String,
    pub last_name: String,
    pub alias: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub code: String,
    pub alias: String,
}

/// POST /api/tournaments/{name}/select
pub async fn select_tournament(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Committed<TournamentView>> {
    Ok(Json(state.select_tournament(&name).await?))
}

/// POST /api/tournaments/{name}/start
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Committed<TournamentView>> {
    Ok(Json(state.start_game(&name).await?))
}

/// POST /api/tournaments/{name}/launch
pub async fn launch_next(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Committed<TournamentView>> {
    Ok(Json(state.launch_next(&name).await?))
}

/// POST /api/tournaments/{name}/reset
pub async fn reset_game(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Committed<TournamentView>> {
    Ok(Json(state.reset_game(&name).await?))
}

/// POST /api/tournaments/{name}/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Committed<ParticipantView>> {
    let key = require_identity_key(&headers)?;
    Ok(Json(
        state
            .register(&name, key, &req.first_name, &req.last_name)
            .await?,
    ))
}

/// POST /api/tournaments/{name}/confirm
pub async fn confirm_identity(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Committed<ParticipantView>> {
    let key = require_identity_key(&headers)?;
    Ok(Json(
        state
            .confirm_identity(&name, key, &req.first_name, &req.last_name, &req.alias)
            .await?,
    ))
}

/// GET /api/tournaments/{name}/state
///
/// The identity key is optional here; with it the view includes the
/// caller's participant record and whether they already voted.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Committed<TournamentView>> {
    Ok(Json(state.get_state(&name, identity_key(&headers)).await?))
}

/// POST /api/tournaments/{name}/vote
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Committed<VoteReceipt>> {
    let key = require_identity_key(&headers)?;
    Ok(Json(state.vote(&name, key, &req.alias, &req.code).await?))
}

/// GET /api/tournaments/{name}/results
pub async fn results(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<TournamentResults> {
    Ok(Json(state.results(&name).await?))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tournaments/{name}/select", post(select_tournament))
        .route("/api/tournaments/{name}/start", post(start_game))
        .route("/api/tournaments/{name}/launch", post(launch_next))
        .route("/api/tournaments/{name}/reset", post(reset_game))
        .route("/api/tournaments/{name}/register", post(register))
        .route("/api/tournaments/{name}/confirm", post(confirm_identity))
        .route("/api/tournaments/{name}/state", get(get_state))
        .route("/api/tournaments/{name}/vote", post(vote))
        .route("/api/tournaments/{name}/results", get(results))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
