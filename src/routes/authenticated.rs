use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every write, plus the caller-scoped reads (`/follow`, `/me`). The auth
/// middleware layered on top of this router guarantees each handler receives
/// a resolved `AuthUser`; author-only checks happen in the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts
        // The author is always the caller, never taken from the body.
        .route("/posts", post(handlers::posts::create_post))
        // PUT/PATCH/DELETE /posts/{id}
        // Author-only.
        .route(
            "/posts/{id}",
            put(handlers::posts::update_post)
                .patch(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        // POST /posts/{post_id}/comments
        .route(
            "/posts/{post_id}/comments",
            post(handlers::comments::create_comment),
        )
        // PUT/PATCH/DELETE /posts/{post_id}/comments/{id}
        // Author-only.
        .route(
            "/posts/{post_id}/comments/{id}",
            put(handlers::comments::update_comment)
                .patch(handlers::comments::update_comment)
                .delete(handlers::comments::delete_comment),
        )
        // GET/POST /follow
        // Always scoped to the caller's own edges.
        .route(
            "/follow",
            get(handlers::follows::list_follows).post(handlers::follows::create_follow),
        )
        // GET /me
        .route("/me", get(handlers::users::get_me))
        // POST /upload/presigned
        // Short-lived URL for uploading a post image straight to the bucket.
        .route("/upload/presigned", post(handlers::uploads::get_presigned_url))
}
