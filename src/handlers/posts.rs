use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode},
};
use serde_json::Value;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{Post, PostPayload},
    pagination::{Listing, Page, PaginationParams},
    permissions,
    validation::{self, WriteMode},
};

/// Rejects a `group` id that does not name an existing group.
async fn ensure_group_exists(state: &AppState, group: Option<i64>) -> Result<(), ApiError> {
    if let Some(id) = group {
        if state.repo.get_group(id).await?.is_none() {
            return Err(validation::unknown_group(id));
        }
    }
    Ok(())
}

/// list_posts
///
/// [Public Route] Lists posts in insertion order. With `limit` the response is
/// a page (`count`, `next`, `previous`, `results`), otherwise a plain array.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(PaginationParams),
    responses((status = 200, description = "Posts, paginated when `limit` is given", body = [Post]))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Listing<Post>>, ApiError> {
    let listing = match params.page_request() {
        Some(page) => {
            let count = state.repo.count_posts().await?;
            let results = state.repo.list_posts(Some(page)).await?;
            Listing::Page(Page::new(uri.path(), page, count, results))
        }
        None => Listing::All(state.repo.list_posts(None).await?),
    };
    Ok(Json(listing))
}

/// get_post
///
/// [Public Route] Retrieves a single post.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let post = state.repo.get_post(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(post))
}

/// create_post
///
/// [Authenticated Route] Publishes a post authored by the caller. Bodies
/// carrying a `comments` key are refused.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = PostPayload,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_post(
    AuthUser { id: author_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let new_post = validation::new_post(&body)?;
    ensure_group_exists(&state, new_post.group).await?;

    let post = state.repo.create_post(author_id, new_post).await?;
    tracing::info!(post_id = post.id, author = %author_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] PUT replaces the editable fields, PATCH updates only
/// the supplied ones. Author-only; the author is re-stamped as the caller.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostPayload,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Post>, ApiError> {
    let post = state.repo.get_post(id).await?.ok_or(ApiError::NotFound)?;
    permissions::is_author_or_read_only(&method, &post, Some(&user))?;

    let changes = validation::post_changes(&body, WriteMode::from_partial(method == Method::PATCH))?;
    if let Some(group) = changes.group {
        ensure_group_exists(&state, group).await?;
    }

    let updated = state
        .repo
        .update_post(id, user.id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(post_id = id, author = %user.id, "post updated");
    Ok(Json(updated))
}

/// delete_post
///
/// [Authenticated Route] Author-only. The post's comments are deleted with it.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = state.repo.get_post(id).await?.ok_or(ApiError::NotFound)?;
    permissions::is_author_or_read_only(&method, &post, Some(&user))?;

    if !state.repo.delete_post(id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(post_id = id, author = %user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}
