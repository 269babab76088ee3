use axum::{
    Json,
    extract::{Path, State},
};

use crate::{AppState, error::ApiError, models::Group};

/// list_groups
///
/// [Public Route] All groups, open to anyone.
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    responses((status = 200, description = "Groups", body = [Group]))
)]
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.repo.list_groups().await?))
}

/// get_group
#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}",
    params(("id" = i64, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Found", body = Group),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Group>, ApiError> {
    let group = state.repo.get_group(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(group))
}
