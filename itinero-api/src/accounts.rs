use anyhow::Context;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use itinero_core::account::{validate_username, ProfileUpdate, User};

use crate::error::AppError;
use crate::middleware::auth::{CustomerClaims, ROLE_CUSTOMER};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
struct SignupRequest {
    username: String,
    email: String,
    password: String,
    full_name: String,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: Uuid,
    username: String,
    email: String,
    full_name: String,
    phone: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            created_at: user.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/accounts/signup", post(signup))
        .route("/v1/accounts/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route(
        "/v1/accounts/profile",
        get(get_profile).put(update_profile),
    )
}

async fn hash_password(password: String) -> Result<String, AppError> {
    // Argon2 is deliberately slow; keep it off the async runtime.
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    })
    .await
    .context("password hashing task failed")?
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .context("password verification task failed")
    .map_err(AppError::from)
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_username(&req.username)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(req.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        username: req.username,
        email: req.email,
        full_name: req.full_name,
        phone: req.phone,
        password_hash,
        created_at: Utc::now(),
    };

    state.users.create_user(&user).await?;

    info!(username = %user.username, "account created");
    Ok(Json(user.into()))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::Authentication("Invalid username or password".to_string());

    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let claims = CustomerClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: ROLE_CUSTOMER.to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))?;

    info!(username = %user.username, "login succeeded");
    Ok(Json(AuthResponse { token }))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .find_by_id(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("Account no longer exists".to_string()))?;

    Ok(Json(user.into()))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .update_profile(claims.user_id()?, &update)
        .await?;

    info!(username = %user.username, "profile updated");
    Ok(Json(user.into()))
}
