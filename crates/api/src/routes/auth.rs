//! Registration and login endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// POST /register — create an account.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(req) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let user_id = state.auth.register(&req.email, &req.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user_id.as_i64(),
        }),
    ))
}

/// POST /token — exchange credentials for a bearer token.
#[tracing::instrument(skip_all)]
pub async fn token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let access_token = state.auth.authenticate(&req.email, &req.password).await?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
