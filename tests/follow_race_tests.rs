mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use uuid::Uuid;
use yatube_api::{
    ApiError,
    handlers::follows,
    models::{Comment, Follow, Group, NewFollow, NewGroup, NewPost, Post, PostChanges, User},
    pagination::PageRequest,
    repository::{InMemoryRepository, RepoResult, Repository, RepositoryState},
    validation,
};

use common::{seed_user, test_context};

/// Delegates to the in-memory store but never sees an existing follow edge,
/// as when a concurrent request inserts the same edge between the
/// duplicate check and the insert.
struct StaleFollowCheck {
    inner: Arc<InMemoryRepository>,
}

#[async_trait]
impl Repository for StaleFollowCheck {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.inner.get_user_by_username(username).await
    }
    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.inner.create_user(user).await
    }
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.delete_user(id).await
    }
    async fn list_groups(&self) -> RepoResult<Vec<Group>> {
        self.inner.list_groups().await
    }
    async fn get_group(&self, id: i64) -> RepoResult<Option<Group>> {
        self.inner.get_group(id).await
    }
    async fn create_group(&self, group: NewGroup) -> RepoResult<Group> {
        self.inner.create_group(group).await
    }
    async fn delete_group(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_group(id).await
    }
    async fn list_posts(&self, page: Option<PageRequest>) -> RepoResult<Vec<Post>> {
        self.inner.list_posts(page).await
    }
    async fn count_posts(&self) -> RepoResult<i64> {
        self.inner.count_posts().await
    }
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        self.inner.get_post(id).await
    }
    async fn create_post(&self, author_id: Uuid, post: NewPost) -> RepoResult<Post> {
        self.inner.create_post(author_id, post).await
    }
    async fn update_post(
        &self,
        id: i64,
        author_id: Uuid,
        changes: PostChanges,
    ) -> RepoResult<Option<Post>> {
        self.inner.update_post(id, author_id, changes).await
    }
    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_post(id).await
    }
    async fn list_comments(
        &self,
        post_id: i64,
        page: Option<PageRequest>,
    ) -> RepoResult<Vec<Comment>> {
        self.inner.list_comments(post_id, page).await
    }
    async fn count_comments(&self, post_id: i64) -> RepoResult<i64> {
        self.inner.count_comments(post_id).await
    }
    async fn get_comment(&self, post_id: i64, id: i64) -> RepoResult<Option<Comment>> {
        self.inner.get_comment(post_id, id).await
    }
    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        self.inner.create_comment(post_id, author_id, text).await
    }
    async fn update_comment(
        &self,
        id: i64,
        post_id: i64,
        author_id: Uuid,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        self.inner.update_comment(id, post_id, author_id, text).await
    }
    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_comment(id).await
    }
    async fn list_follows(
        &self,
        user_id: Uuid,
        following: Option<&str>,
    ) -> RepoResult<Vec<Follow>> {
        self.inner.list_follows(user_id, following).await
    }
    async fn follow_exists(&self, _user_id: Uuid, _following_id: Uuid) -> RepoResult<bool> {
        Ok(false)
    }
    async fn create_follow(&self, follow: NewFollow) -> RepoResult<Follow> {
        self.inner.create_follow(follow).await
    }
}

fn non_field_errors(err: &ApiError) -> Vec<String> {
    match err {
        ApiError::Validation(errors) => errors
            .get("non_field_errors")
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_follow_caught_by_constraint_reads_as_duplicate() {
    let mut ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    ctx.repo
        .create_follow(NewFollow {
            user_id: alice.id,
            following_id: bob.id,
        })
        .await
        .unwrap();
    ctx.state.repo = Arc::new(StaleFollowCheck {
        inner: ctx.repo.clone(),
    }) as RepositoryState;

    let err = follows::create_follow(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "following": "bob" })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        non_field_errors(&err),
        vec![validation::DUPLICATE_FOLLOW.to_string()]
    );
    assert_eq!(ctx.repo.follow_count(), 1);
}

#[tokio::test]
async fn test_stale_check_still_allows_a_new_follow() {
    let mut ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    seed_user(&ctx.repo, "bob").await;
    ctx.state.repo = Arc::new(StaleFollowCheck {
        inner: ctx.repo.clone(),
    }) as RepositoryState;

    let (status, Json(follow)) = follows::create_follow(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "following": "bob" })),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(follow.following, "bob");
    assert_eq!(ctx.repo.follow_count(), 1);
}
