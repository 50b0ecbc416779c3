use crate::{
    AppState,
    auth::{AuthUser, Profile, issue_token},
    errors::AppError,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": state.users.list(),
        "message": "Available users for authentication",
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let user = state
        .users
        .verify_credentials(&request.email, &request.password)
        .ok_or_else(|| {
            tracing::debug!(email = %request.email, "Login rejected");
            AppError::unauthorized("Invalid credentials", "Email or password is incorrect")
        })?;

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.jwt_expires_in)?;
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "user": Profile::from(&user),
        },
    })))
}

pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(json!({ "success": true, "data": Profile::from(&user) }))
}

pub async fn docs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let available_users: Vec<_> = state
        .users
        .list()
        .into_iter()
        .map(|u| json!({ "id": u.id, "username": u.username, "email": u.email }))
        .collect();

    Json(json!({
        "endpoints": {
            "GET /api/auth/users": "Get all available users for demo",
            "POST /api/auth/login": "Login with email and password",
            "GET /api/auth/me": "Get current user info (requires auth)",
        },
        "authentication": {
            "type": "JWT Token",
            "description": "Use JWT token in Authorization header",
            "example": "Authorization: Bearer <your-jwt-token>",
        },
        "available_users": available_users,
    }))
}
