//! Mock accounts and bearer-token authentication.

use crate::{AppState, errors::AppError, models::UserId};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password: String,
    pub credits: u32,
    pub avatar: String,
}

/// What other users may see about an account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub credits: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub credits: u32,
    pub avatar: String,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            credits: user.credits,
            avatar: user.avatar.clone(),
        }
    }
}

/// The fixed set of demo accounts. Credit balances live only in memory.
pub struct UserDirectory {
    users: RwLock<Vec<User>>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        let seed = [
            (1, "mememaster", "meme@example.com", 1000),
            (2, "vibelord", "vibe@example.com", 750),
            (3, "stonksguy", "stonks@example.com", 500),
            (4, "cryptoqueen", "crypto@example.com", 2000),
            (5, "nftnoob", "nft@example.com", 100),
        ];
        let users = seed
            .into_iter()
            .map(|(id, username, email, credits)| User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                password: "meme".to_string(),
                credits,
                avatar: format!("https://i.pravatar.cc/150?u={}", id),
            })
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }
}

impl UserDirectory {
    pub fn find(&self, id: UserId) -> Option<User> {
        self.users.read().iter().find(|u| u.id == id).cloned()
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.read().iter().find(|u| u.email == email).cloned()
    }

    pub fn list(&self) -> Vec<PublicUser> {
        self.users
            .read()
            .iter()
            .map(|u| PublicUser {
                id: u.id,
                username: u.username.clone(),
                email: u.email.clone(),
                credits: u.credits,
            })
            .collect()
    }

    /// Checks email and password; `None` for either mismatch.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Option<User> {
        self.find_by_email(email).filter(|u| u.password == password)
    }

    /// Spends `amount` credits, failing without change when the balance is short.
    pub fn spend_credits(&self, id: UserId, amount: u32) -> Result<User, AppError> {
        let mut users = self.users.write();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User with ID {}", id)))?;
        if user.credits < amount {
            return Err(AppError::InsufficientCredits {
                required: amount,
                available: user.credits,
            });
        }
        user.credits -= amount;
        Ok(user.clone())
    }

    pub fn refund_credits(&self, id: UserId, amount: u32) {
        if let Some(user) = self.users.write().iter_mut().find(|u| u.id == id) {
            user.credits = user.credits.saturating_add(amount);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(user_id: UserId, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let exp = i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| AppError::InternalServerError("Token lifetime is out of range".to_string()))?;
    let claims = Claims {
        user_id,
        iat: now,
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Resolves an `Authorization: Bearer` header to one of the mock users.
pub fn authenticate(header: Option<&str>, secret: &str, users: &UserDirectory) -> Result<User, AppError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Authorization token required", "Please provide a valid bearer token"))?;

    let claims = verify_token(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "Token verification failed");
        AppError::unauthorized("Invalid token", "Token verification failed")
    })?;

    let user = users
        .find(claims.user_id)
        .ok_or_else(|| AppError::unauthorized("Invalid token", "User not found or token expired"))?;

    tracing::debug!(username = %user.username, "Authenticated user");
    Ok(user)
}

/// Extractor for routes that require a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        authenticate(header, &state.config.jwt_secret, &state.users).map(AuthUser)
    }
}
