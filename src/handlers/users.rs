use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{RegisterUserRequest, User, UserProfile},
    repository::constraints,
    validation,
};

/// register_user
///
/// [Public Route] Creates an account in the identity provider and mirrors it as
/// a local profile. The provider issues the id; the username lives here.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid payload, username taken or provider rejection")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    validation::registration(&payload)?;

    // Checked before the provider call so a taken username never leaves a
    // dangling external account behind.
    if state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::field("username", validation::USERNAME_TAKEN));
    }

    let id = state
        .identity
        .sign_up(&payload.email, &payload.password)
        .await?;

    let user = User {
        id,
        username: payload.username,
        email: payload.email,
    };
    let created = state.repo.create_user(user).await.map_err(|e| {
        if e.is_constraint(constraints::UNIQUE_USERNAME) {
            ApiError::field("username", validation::USERNAME_TAKEN)
        } else {
            ApiError::from(e)
        }
    })?;

    tracing::info!(user = %created.id, username = %created.username, "user registered");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state.repo.get_user(id).await?.ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}
