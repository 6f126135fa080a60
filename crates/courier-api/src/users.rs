use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use courier_types::api::{Claims, SearchQuery, UpdateProfileRequest};

use crate::convert::{account_from_row, profile_from_row, summary_from_row};
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub const SEARCH_LIMIT: u32 = 20;
const MAX_DISPLAY_NAME_CHARS: usize = 64;
const MAX_BIO_CHARS: usize = 500;

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account = run_blocking(&state, move |s| {
        let row = s
            .db
            .get_user_by_id(&claims.sub.to_string())?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        account_from_row(row)
    })
    .await?;

    Ok(Json(account))
}

/// PUT /users/me. Absent fields are kept, empty strings clear.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = req.display_name.map(|s| s.trim().to_string());
    let bio = req.bio.map(|s| s.trim().to_string());

    if display_name
        .as_deref()
        .is_some_and(|s| s.chars().count() > MAX_DISPLAY_NAME_CHARS)
    {
        return Err(ApiError::InvalidInput(format!(
            "Display name exceeds {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    if bio.as_deref().is_some_and(|s| s.chars().count() > MAX_BIO_CHARS) {
        return Err(ApiError::InvalidInput(format!(
            "Bio exceeds {} characters",
            MAX_BIO_CHARS
        )));
    }

    let account = run_blocking(&state, move |s| {
        let row = s
            .db
            .update_profile(&claims.sub.to_string(), display_name.as_deref(), bio.as_deref())?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        account_from_row(row)
    })
    .await?;

    Ok(Json(account))
}

/// GET /users/search?q=: up to 20 matches on username or display name.
pub async fn search_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.trim().to_string();
    let users = run_blocking(&state, move |s| {
        s.db
            .search_users(&q, SEARCH_LIMIT)?
            .into_iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(users))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(&state, move |s| {
        let row = s
            .db
            .get_user_by_id(&user_id.to_string())?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        profile_from_row(row)
    })
    .await?;

    Ok(Json(profile))
}
