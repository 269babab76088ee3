use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only access to posts, comments and groups, plus registration.
/// Anonymous writes on the same paths are answered by the authenticated
/// router's guard with 401.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /register
        // Creates the account in the identity provider and the local profile.
        .route("/register", post(handlers::users::register_user))
        // GET /posts?limit=&offset=
        // Paginated only when `limit` is given.
        .route("/posts", get(handlers::posts::list_posts))
        .route("/posts/{id}", get(handlers::posts::get_post))
        // GET /posts/{post_id}/comments
        // 404 when the post does not exist.
        .route(
            "/posts/{post_id}/comments",
            get(handlers::comments::list_comments),
        )
        .route(
            "/posts/{post_id}/comments/{id}",
            get(handlers::comments::get_comment),
        )
        // Groups are read-only over the API.
        .route("/groups", get(handlers::groups::list_groups))
        .route("/groups/{id}", get(handlers::groups::get_group))
}
