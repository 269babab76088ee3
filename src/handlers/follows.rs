use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{Follow, FollowPayload, NewFollow},
    repository::{RepositoryError, constraints},
    validation,
};

/// FollowFilter
///
/// Query parameters accepted by `GET /follow`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FollowFilter {
    /// Case-insensitive exact match on the followed username.
    pub search: Option<String>,
}

/// list_follows
///
/// [Authenticated Route] The caller's own outgoing follow edges.
#[utoipa::path(
    get,
    path = "/api/v1/follow",
    params(FollowFilter),
    responses(
        (status = 200, description = "Follows of the caller", body = [Follow]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_follows(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<FollowFilter>,
) -> Result<Json<Vec<Follow>>, ApiError> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let follows = state.repo.list_follows(id, search).await?;
    Ok(Json(follows))
}

/// create_follow
///
/// [Authenticated Route] Makes the caller follow `following`.
///
/// Self-follows and duplicate edges are refused before the insert; the
/// `one_following`/`user_not_author` constraints catch concurrent requests
/// that slip past the pre-check and are reported with the same messages.
#[utoipa::path(
    post,
    path = "/api/v1/follow",
    request_body = FollowPayload,
    responses(
        (status = 201, description = "Following", body = Follow),
        (status = 400, description = "Unknown user, self-follow or duplicate"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_follow(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Follow>), ApiError> {
    let username = validation::follow_target(&body)?;
    let following = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| validation::unknown_user(&username))?;

    validation::not_self_follow(user_id, following.id)?;
    if state.repo.follow_exists(user_id, following.id).await? {
        return Err(ApiError::non_field(validation::DUPLICATE_FOLLOW));
    }

    let edge = NewFollow {
        user_id,
        following_id: following.id,
    };
    let follow = state.repo.create_follow(edge).await.map_err(|e| match e {
        e if e.is_constraint(constraints::ONE_FOLLOWING) => {
            ApiError::non_field(validation::DUPLICATE_FOLLOW)
        }
        e if e.is_constraint(constraints::USER_NOT_AUTHOR) => {
            ApiError::non_field(validation::SELF_FOLLOW)
        }
        RepositoryError::MissingReference(_) => validation::unknown_user(&username),
        e => ApiError::from(e),
    })?;

    tracing::info!(user = %user_id, following = %following.id, "follow created");
    Ok((StatusCode::CREATED, Json(follow)))
}
