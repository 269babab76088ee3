use axum::http::Method;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Comment, Post},
};

/// Resources owned by the user who created them.
pub trait Authored {
    fn author_id(&self) -> Uuid;
}

impl Authored for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// GET, HEAD and OPTIONS never modify state.
pub fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// is_author_or_read_only
///
/// Object-level rule shared by posts and comments: safe methods are always
/// allowed, anything else requires an authenticated caller who authored the
/// resource. Anonymous callers get 401, other users 403.
pub fn is_author_or_read_only<R: Authored>(
    method: &Method,
    resource: &R,
    user: Option<&AuthUser>,
) -> Result<(), ApiError> {
    if is_safe(method) {
        return Ok(());
    }
    match user {
        None => Err(ApiError::Unauthorized),
        Some(user) if user.id == resource.author_id() => Ok(()),
        Some(_) => Err(ApiError::Forbidden),
    }
}
