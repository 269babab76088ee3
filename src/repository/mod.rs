use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Comment, Follow, Group, NewFollow, NewGroup, NewPost, Post, PostChanges, User},
    pagination::PageRequest,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Constraint names shared by the schema and the in-memory implementation.
pub mod constraints {
    pub const ONE_FOLLOWING: &str = "one_following";
    pub const USER_NOT_AUTHOR: &str = "user_not_author";
    pub const UNIQUE_USERNAME: &str = "profiles_username_key";
    pub const UNIQUE_SLUG: &str = "groups_slug_key";
    pub const POST_AUTHOR: &str = "posts_author_id_fkey";
    pub const POST_GROUP: &str = "posts_group_id_fkey";
    pub const COMMENT_POST: &str = "comments_post_id_fkey";
    pub const COMMENT_AUTHOR: &str = "comments_author_id_fkey";
    pub const FOLLOW_USER: &str = "follows_user_id_fkey";
    pub const FOLLOW_FOLLOWING: &str = "follows_following_id_fkey";
}

/// RepositoryError
///
/// Persistence failures. Unique and check constraint violations are
/// translated into `Conflict`, foreign key violations into
/// `MissingReference`; everything else stays a raw database error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("constraint `{0}` rejected the write")]
    Conflict(String),

    #[error("reference checked by `{0}` does not exist")]
    MissingReference(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl RepositoryError {
    /// Whether this error was raised by the named constraint.
    pub fn is_constraint(&self, name: &str) -> bool {
        match self {
            RepositoryError::Conflict(c) | RepositoryError::MissingReference(c) => c == name,
            RepositoryError::Database(_) => false,
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() || db_err.is_check_violation() {
                return RepositoryError::Conflict(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::MissingReference(constraint);
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract the handlers are written against. Each entity gets
/// explicit query functions; relations are followed through ids, never through
/// implicit back-references.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: User) -> RepoResult<User>;
    // Cascades to the user's posts, comments and follow edges.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Groups ---
    async fn list_groups(&self) -> RepoResult<Vec<Group>>;
    async fn get_group(&self, id: i64) -> RepoResult<Option<Group>>;
    async fn create_group(&self, group: NewGroup) -> RepoResult<Group>;
    // Posts in the group survive with their group cleared.
    async fn delete_group(&self, id: i64) -> RepoResult<bool>;

    // --- Posts ---
    // Ordered by id; `None` returns every post.
    async fn list_posts(&self, page: Option<PageRequest>) -> RepoResult<Vec<Post>>;
    async fn count_posts(&self) -> RepoResult<i64>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, author_id: Uuid, post: NewPost) -> RepoResult<Post>;
    // Applies `changes` and stamps `author_id` as the author.
    async fn update_post(
        &self,
        id: i64,
        author_id: Uuid,
        changes: PostChanges,
    ) -> RepoResult<Option<Post>>;
    // Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    async fn list_comments(
        &self,
        post_id: i64,
        page: Option<PageRequest>,
    ) -> RepoResult<Vec<Comment>>;
    async fn count_comments(&self, post_id: i64) -> RepoResult<i64>;
    // Only returns the comment if it belongs to `post_id`.
    async fn get_comment(&self, post_id: i64, id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment>;
    // Reasserts `post_id` and `author_id`; `text` is left as is when `None`.
    async fn update_comment(
        &self,
        id: i64,
        post_id: i64,
        author_id: Uuid,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;

    // --- Follows ---
    // Outgoing edges of `user_id`, optionally narrowed to one followed username
    // (case-insensitive exact match).
    async fn list_follows(
        &self,
        user_id: Uuid,
        following: Option<&str>,
    ) -> RepoResult<Vec<Follow>>;
    async fn follow_exists(&self, user_id: Uuid, following_id: Uuid) -> RepoResult<bool>;
    // Fails with `Conflict` on a self-follow or a duplicate edge.
    async fn create_follow(&self, follow: NewFollow) -> RepoResult<Follow>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
