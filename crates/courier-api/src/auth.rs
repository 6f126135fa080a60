use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use courier_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, RegisteredUser,
};

use crate::convert::account_from_row;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub const MIN_PASSWORD_CHARS: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.+-]+@([\w-]+\.)+[\w-]{2,}$").expect("email regex is valid")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username regex is valid"));

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(username), Some(email), Some(password)) = (req.username, req.email, req.password)
    else {
        return Err(ApiError::InvalidInput("Fill all the fields".into()));
    };
    let username = username.trim().to_string();
    let email = email.trim().to_string();

    if !USERNAME_RE.is_match(&username) {
        return Err(ApiError::InvalidInput(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(ApiError::InvalidInput("Invalid email format".into()));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "Password needs to be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }

    let user_id = Uuid::new_v4();
    let (name, mail) = (username.clone(), email.clone());
    run_blocking(&state, move |s| {
        let password_hash = hash_password(&password)?;
        // UNIQUE constraints decide duplicates; no check-then-insert.
        s.db
            .create_user(&user_id.to_string(), &name, &mail, &password_hash)?;
        Ok(())
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &username, state.token_ttl)?;
    info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".into(),
            token,
            user: RegisteredUser {
                id: user_id,
                username,
                email,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let email = req.email.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::InvalidInput("Input username or email".into()));
    }
    let Some(password) = req.password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::InvalidInput("Input password".into()));
    };

    let user = run_blocking(&state, move |s| {
        let user = s
            .db
            .find_user_by_username_or_email(username.as_deref(), email.as_deref())?
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;
        verify_password(&password, &user.password_hash)?;
        Ok(user)
    })
    .await?;

    let account = account_from_row(user)?;
    let token = create_token(&state.jwt_secret, account.id, &account.username, state.token_ttl)?;
    info!("User {} logged in", account.username);

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: account,
    }))
}

/// Hash with Argon2id and a random salt, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(format!("stored password hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| {
            warn!("Failed login attempt");
            ApiError::Unauthorized("Invalid credentials".into())
        })
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    ttl: chrono::Duration,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}
