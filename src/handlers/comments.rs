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
    models::{Comment, CommentPayload, Post},
    pagination::{Listing, Page, PaginationParams},
    permissions,
    validation::{self, WriteMode},
};

async fn load_post(state: &AppState, post_id: i64) -> Result<Post, ApiError> {
    state
        .repo
        .get_post(post_id)
        .await?
        .ok_or(ApiError::NotFound)
}

async fn load_comment(state: &AppState, post_id: i64, id: i64) -> Result<Comment, ApiError> {
    state
        .repo
        .get_comment(post_id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// list_comments
///
/// [Public Route] Comments of one post, oldest first. 404 if the post does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID"), PaginationParams),
    responses(
        (status = 200, description = "Comments, paginated when `limit` is given", body = [Comment]),
        (status = 404, description = "Post Not Found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(post_id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Listing<Comment>>, ApiError> {
    load_post(&state, post_id).await?;

    let listing = match params.page_request() {
        Some(page) => {
            let count = state.repo.count_comments(post_id).await?;
            let results = state.repo.list_comments(post_id, Some(page)).await?;
            Listing::Page(Page::new(uri.path(), page, count, results))
        }
        None => Listing::All(state.repo.list_comments(post_id, None).await?),
    };
    Ok(Json(listing))
}

/// get_comment
///
/// [Public Route] A single comment of the given post.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{post_id}/comments/{id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Found", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((post_id, id)): Path<(i64, i64)>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(load_comment(&state, post_id, id).await?))
}

/// create_comment
///
/// [Authenticated Route] Comments on the post named in the path, as the caller.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = CommentPayload,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Post Not Found")
    )
)]
pub async fn create_comment(
    AuthUser { id: author_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    load_post(&state, post_id).await?;
    let text = validation::comment_text(&body, WriteMode::Full)?.unwrap_or_default();

    let comment = state.repo.create_comment(post_id, author_id, text).await?;
    tracing::info!(comment_id = comment.id, post_id, author = %author_id, "comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Author-only. The post is re-derived from the path.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{post_id}/comments/{id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentPayload,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((post_id, id)): Path<(i64, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Comment>, ApiError> {
    let comment = load_comment(&state, post_id, id).await?;
    permissions::is_author_or_read_only(&method, &comment, Some(&user))?;

    let text = validation::comment_text(&body, WriteMode::from_partial(method == Method::PATCH))?;
    load_post(&state, post_id).await?;

    let updated = state
        .repo
        .update_comment(id, post_id, user.id, text)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(comment_id = id, post_id, author = %user.id, "comment updated");
    Ok(Json(updated))
}

/// delete_comment
///
/// [Authenticated Route] Author-only.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{post_id}/comments/{id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((post_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let comment = load_comment(&state, post_id, id).await?;
    permissions::is_author_or_read_only(&method, &comment, Some(&user))?;

    if !state.repo.delete_comment(id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(comment_id = id, post_id, author = %user.id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
