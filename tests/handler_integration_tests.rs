mod common;

use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode, Uri},
};
use serde_json::json;
use yatube_api::{
    ApiError,
    handlers::{comments, follows, groups, posts, uploads, users},
    identity::{IdentityState, MockIdentityProvider},
    models::{PresignedUrlRequest, RegisterUserRequest},
    pagination::{Listing, PaginationParams},
    repository::Repository,
    storage::{MockStorageService, StorageState},
    validation,
};

use common::{seed_group, seed_post, seed_user, test_context};

fn field_errors(err: &ApiError, field: &str) -> Vec<String> {
    match err {
        ApiError::Validation(errors) => errors.get(field).map(<[String]>::to_vec).unwrap_or_default(),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

fn page(limit: &str, offset: Option<&str>) -> Query<PaginationParams> {
    Query(PaginationParams {
        limit: Some(limit.to_string()),
        offset: offset.map(str::to_string),
    })
}

fn uri(path: &str) -> OriginalUri {
    OriginalUri(path.parse::<Uri>().unwrap())
}

// --- Posts ---

#[tokio::test]
async fn test_create_post_sets_caller_as_author() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let (status, Json(post)) = posts::create_post(
        alice.clone(),
        State(ctx.state.clone()),
        Json(json!({ "text": "  Hello world  ", "author": "mallory" })),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.author, "alice");
    assert_eq!(post.text, "Hello world");
    assert_eq!(post.group, None);
    assert_eq!(post.image, None);
}

#[tokio::test]
async fn test_create_post_in_existing_group() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let group = seed_group(&ctx.repo, "cats").await;

    let (_, Json(post)) = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Meow", "group": group.id, "image": "posts/cat.jpg" })),
    )
    .await
    .unwrap();

    assert_eq!(post.group, Some(group.id));
    assert_eq!(post.image.as_deref(), Some("posts/cat.jpg"));
}

#[tokio::test]
async fn test_create_post_rejects_unknown_group() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Hi", "group": 999 })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        field_errors(&err, "group"),
        vec!["Invalid pk \"999\" - object does not exist.".to_string()]
    );
    assert_eq!(ctx.repo.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_post_requires_text() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let missing = posts::create_post(alice.clone(), State(ctx.state.clone()), Json(json!({})))
        .await
        .unwrap_err();
    assert_eq!(field_errors(&missing, "text"), vec![validation::REQUIRED.to_string()]);

    let blank = posts::create_post(alice, State(ctx.state.clone()), Json(json!({ "text": "   " })))
        .await
        .unwrap_err();
    assert_eq!(field_errors(&blank, "text"), vec![validation::BLANK.to_string()]);
}

#[tokio::test]
async fn test_create_post_with_comments_is_refused() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Hi", "comments": [{ "text": "first" }] })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(matches!(err, ApiError::Parse(ref msg) if msg == validation::POST_WITH_COMMENTS));
    assert_eq!(ctx.repo.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_post_rejects_image_outside_attachment_prefix() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Hi", "image": "../secrets.txt" })),
    )
    .await
    .unwrap_err();

    assert_eq!(field_errors(&err, "image").len(), 1);
}

#[tokio::test]
async fn test_create_post_rejects_image_key_longer_than_column() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let key = format!("posts/{}.png", "a".repeat(120));

    let err = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Hi", "image": key })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        field_errors(&err, "image"),
        vec![validation::IMAGE_TOO_LONG.to_string()]
    );
    assert_eq!(ctx.repo.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_posts_without_limit_returns_plain_array() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    for text in ["one", "two", "three"] {
        seed_post(&ctx.repo, &alice, text).await;
    }

    let Json(listing) = posts::list_posts(
        State(ctx.state.clone()),
        uri("/api/v1/posts"),
        Query(PaginationParams::default()),
    )
    .await
    .unwrap();

    let Listing::All(items) = listing else {
        panic!("expected an unpaginated listing");
    };
    let texts: Vec<_> = items.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_list_posts_paginated_window_and_links() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    for i in 0..5 {
        seed_post(&ctx.repo, &alice, &format!("post {}", i)).await;
    }

    let Json(listing) = posts::list_posts(
        State(ctx.state.clone()),
        uri("/api/v1/posts?limit=2&offset=2"),
        page("2", Some("2")),
    )
    .await
    .unwrap();

    let Listing::Page(page) = listing else {
        panic!("expected a page");
    };
    assert_eq!(page.count, 5);
    assert_eq!(page.next.as_deref(), Some("/api/v1/posts?limit=2&offset=4"));
    assert_eq!(page.previous.as_deref(), Some("/api/v1/posts?limit=2"));
    let texts: Vec<_> = page.results.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["post 2", "post 3"]);
}

#[tokio::test]
async fn test_list_posts_ignores_invalid_limit() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    seed_post(&ctx.repo, &alice, "only").await;

    let Json(listing) = posts::list_posts(
        State(ctx.state.clone()),
        uri("/api/v1/posts"),
        page("abc", None),
    )
    .await
    .unwrap();

    assert!(matches!(listing, Listing::All(ref items) if items.len() == 1));
}

#[tokio::test]
async fn test_list_posts_offset_near_i64_max_is_an_empty_page() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    seed_post(&ctx.repo, &alice, "only").await;

    let Json(listing) = posts::list_posts(
        State(ctx.state.clone()),
        uri("/api/v1/posts?limit=10&offset=9223372036854775800"),
        page("10", Some("9223372036854775800")),
    )
    .await
    .unwrap();

    let Listing::Page(page) = listing else {
        panic!("expected a page");
    };
    assert_eq!(page.count, 1);
    assert!(page.results.is_empty());
    assert_eq!(page.next, None);
}

#[tokio::test]
async fn test_get_missing_post_is_not_found() {
    let ctx = test_context();
    let err = posts::get_post(State(ctx.state.clone()), Path(42))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn test_update_post_by_non_author_is_forbidden() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "original").await;

    let err = posts::update_post(
        bob,
        Method::PUT,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "text": "hijacked" })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::Forbidden));
    let stored = ctx.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "original");
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = posts::update_post(
        alice,
        Method::PATCH,
        State(ctx.state.clone()),
        Path(7),
        Json(json!({ "text": "x" })),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn test_put_requires_text_but_patch_does_not() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let group = seed_group(&ctx.repo, "dogs").await;
    let post = seed_post(&ctx.repo, &alice, "original").await;

    let err = posts::update_post(
        alice.clone(),
        Method::PUT,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "group": group.id })),
    )
    .await
    .unwrap_err();
    assert_eq!(field_errors(&err, "text"), vec![validation::REQUIRED.to_string()]);

    let Json(updated) = posts::update_post(
        alice,
        Method::PATCH,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "group": group.id })),
    )
    .await
    .unwrap();
    assert_eq!(updated.text, "original");
    assert_eq!(updated.group, Some(group.id));
    assert_eq!(updated.author, "alice");
}

#[tokio::test]
async fn test_patch_with_null_group_clears_it() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let group = seed_group(&ctx.repo, "birds").await;
    let (_, Json(post)) = posts::create_post(
        alice.clone(),
        State(ctx.state.clone()),
        Json(json!({ "text": "tweet", "group": group.id })),
    )
    .await
    .unwrap();

    let Json(updated) = posts::update_post(
        alice,
        Method::PATCH,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "group": null })),
    )
    .await
    .unwrap();

    assert_eq!(updated.group, None);
    assert_eq!(updated.text, "tweet");
}

#[tokio::test]
async fn test_patch_with_null_text_is_rejected() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let post = seed_post(&ctx.repo, &alice, "keep me").await;

    let err = posts::update_post(
        alice,
        Method::PATCH,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "text": null })),
    )
    .await
    .unwrap_err();

    assert_eq!(field_errors(&err, "text"), vec![validation::NULL.to_string()]);
    let stored = ctx.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "keep me");
}

#[tokio::test]
async fn test_non_integer_group_is_a_field_error() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = posts::create_post(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "text": "Hi", "group": "abc" })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        field_errors(&err, "group"),
        vec!["Incorrect type. Expected pk value, received str.".to_string()]
    );
    assert_eq!(ctx.repo.count_posts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_post_cascades_to_comments() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "doomed").await;
    ctx.repo
        .create_comment(post.id, bob.id, "nice".to_string())
        .await
        .unwrap();

    let status = posts::delete_post(alice, Method::DELETE, State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.repo.get_post(post.id).await.unwrap().is_none());
    assert_eq!(ctx.repo.comment_count(), 0);
}

#[tokio::test]
async fn test_delete_post_by_non_author_is_forbidden() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "mine").await;

    let err = posts::delete_post(bob, Method::DELETE, State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Forbidden));
    assert!(ctx.repo.get_post(post.id).await.unwrap().is_some());
}

// --- Comments ---

#[tokio::test]
async fn test_comments_of_missing_post_are_not_found() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let list = comments::list_comments(
        State(ctx.state.clone()),
        uri("/api/v1/posts/5/comments"),
        Path(5),
        Query(PaginationParams::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(list, ApiError::NotFound));

    let create = comments::create_comment(
        alice,
        State(ctx.state.clone()),
        Path(5),
        Json(json!({ "text": "hello?" })),
    )
    .await
    .unwrap_err();
    assert!(matches!(create, ApiError::NotFound));
    assert_eq!(ctx.repo.comment_count(), 0);
}

#[tokio::test]
async fn test_create_comment_binds_post_and_author() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "post").await;

    let (status, Json(comment)) = comments::create_comment(
        bob,
        State(ctx.state.clone()),
        Path(post.id),
        Json(json!({ "text": "first!", "post": 999, "author": "alice" })),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment.post, post.id);
    assert_eq!(comment.author, "bob");
    assert_eq!(comment.text, "first!");
}

#[tokio::test]
async fn test_create_comment_requires_text() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let post = seed_post(&ctx.repo, &alice, "post").await;

    let err = comments::create_comment(alice, State(ctx.state.clone()), Path(post.id), Json(json!({})))
        .await
        .unwrap_err();

    assert_eq!(field_errors(&err, "text"), vec![validation::REQUIRED.to_string()]);
}

#[tokio::test]
async fn test_comment_lookup_is_scoped_to_post() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let first = seed_post(&ctx.repo, &alice, "first").await;
    let second = seed_post(&ctx.repo, &alice, "second").await;
    let comment = ctx
        .repo
        .create_comment(first.id, alice.id, "on first".to_string())
        .await
        .unwrap();

    let Json(found) = comments::get_comment(State(ctx.state.clone()), Path((first.id, comment.id)))
        .await
        .unwrap();
    assert_eq!(found.id, comment.id);

    let err = comments::get_comment(State(ctx.state.clone()), Path((second.id, comment.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

#[tokio::test]
async fn test_update_comment_author_only() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "post").await;
    let comment = ctx
        .repo
        .create_comment(post.id, bob.id, "typo".to_string())
        .await
        .unwrap();

    let err = comments::update_comment(
        alice,
        Method::PATCH,
        State(ctx.state.clone()),
        Path((post.id, comment.id)),
        Json(json!({ "text": "edited by alice" })),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    let Json(updated) = comments::update_comment(
        bob,
        Method::PUT,
        State(ctx.state.clone()),
        Path((post.id, comment.id)),
        Json(json!({ "text": "fixed" })),
    )
    .await
    .unwrap();
    assert_eq!(updated.text, "fixed");
    assert_eq!(updated.author, "bob");
    assert_eq!(updated.post, post.id);
}

#[tokio::test]
async fn test_list_comments_paginated() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let post = seed_post(&ctx.repo, &alice, "post").await;
    for i in 0..3 {
        ctx.repo
            .create_comment(post.id, alice.id, format!("c{}", i))
            .await
            .unwrap();
    }
    let path = format!("/api/v1/posts/{}/comments", post.id);

    let Json(listing) = comments::list_comments(
        State(ctx.state.clone()),
        uri(&path),
        Path(post.id),
        page("2", None),
    )
    .await
    .unwrap();

    let Listing::Page(page) = listing else {
        panic!("expected a page");
    };
    assert_eq!(page.count, 3);
    assert_eq!(page.next, Some(format!("{}?limit=2&offset=2", path)));
    assert_eq!(page.previous, None);
    assert_eq!(page.results.len(), 2);
}

#[tokio::test]
async fn test_delete_comment_author_only() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    let post = seed_post(&ctx.repo, &alice, "post").await;
    let comment = ctx
        .repo
        .create_comment(post.id, bob.id, "bye".to_string())
        .await
        .unwrap();

    let err = comments::delete_comment(
        alice,
        Method::DELETE,
        State(ctx.state.clone()),
        Path((post.id, comment.id)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    let status = comments::delete_comment(
        bob,
        Method::DELETE,
        State(ctx.state.clone()),
        Path((post.id, comment.id)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(ctx.repo.comment_count(), 0);
}

// --- Groups ---

#[tokio::test]
async fn test_groups_are_listed_and_retrieved() {
    let ctx = test_context();
    let cats = seed_group(&ctx.repo, "cats").await;
    seed_group(&ctx.repo, "dogs").await;

    let Json(all) = groups::list_groups(State(ctx.state.clone())).await.unwrap();
    assert_eq!(all.len(), 2);

    let Json(one) = groups::get_group(State(ctx.state.clone()), Path(cats.id))
        .await
        .unwrap();
    assert_eq!(one, cats);

    let err = groups::get_group(State(ctx.state.clone()), Path(cats.id + 100))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
}

// --- Follows ---

#[tokio::test]
async fn test_follow_lifecycle() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    seed_user(&ctx.repo, "bob").await;

    let (status, Json(follow)) = follows::create_follow(
        alice.clone(),
        State(ctx.state.clone()),
        Json(json!({ "following": "bob" })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(follow.user, "alice");
    assert_eq!(follow.following, "bob");

    let duplicate = follows::create_follow(
        alice.clone(),
        State(ctx.state.clone()),
        Json(json!({ "following": "bob" })),
    )
    .await
    .unwrap_err();
    assert_eq!(
        field_errors(&duplicate, "non_field_errors"),
        vec![validation::DUPLICATE_FOLLOW.to_string()]
    );
    assert_eq!(ctx.repo.follow_count(), 1);
}

#[tokio::test]
async fn test_follow_self_is_rejected() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let err = follows::create_follow(
        alice,
        State(ctx.state.clone()),
        Json(json!({ "following": "alice" })),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        field_errors(&err, "non_field_errors"),
        vec![validation::SELF_FOLLOW.to_string()]
    );
    assert_eq!(ctx.repo.follow_count(), 0);
}

#[tokio::test]
async fn test_follow_unknown_or_missing_user() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let unknown = follows::create_follow(
        alice.clone(),
        State(ctx.state.clone()),
        Json(json!({ "following": "ghost" })),
    )
    .await
    .unwrap_err();
    assert_eq!(
        field_errors(&unknown, "following"),
        vec!["Object with username=ghost does not exist.".to_string()]
    );

    let missing = follows::create_follow(alice, State(ctx.state.clone()), Json(json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        field_errors(&missing, "following"),
        vec![validation::REQUIRED.to_string()]
    );
}

#[tokio::test]
async fn test_list_follows_is_caller_scoped_and_searchable() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    let bob = seed_user(&ctx.repo, "bob").await;
    seed_user(&ctx.repo, "Carol").await;

    for target in ["bob", "Carol"] {
        follows::create_follow(
            alice.clone(),
            State(ctx.state.clone()),
            Json(json!({ "following": target })),
        )
        .await
        .unwrap();
    }
    follows::create_follow(
        bob.clone(),
        State(ctx.state.clone()),
        Json(json!({ "following": "alice" })),
    )
    .await
    .unwrap();

    let Json(all) = follows::list_follows(
        alice.clone(),
        State(ctx.state.clone()),
        Query(follows::FollowFilter::default()),
    )
    .await
    .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|f| f.user == "alice"));

    let Json(filtered) = follows::list_follows(
        alice,
        State(ctx.state.clone()),
        Query(follows::FollowFilter {
            search: Some("carol".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].following, "Carol");

    let Json(bobs) = follows::list_follows(
        bob,
        State(ctx.state.clone()),
        Query(follows::FollowFilter::default()),
    )
    .await
    .unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].following, "alice");
}

// --- Users ---

fn registration(username: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        email: format!("{}@example.com", username),
        password: "correct-horse".to_string(),
        username: username.to_string(),
    }
}

#[tokio::test]
async fn test_register_creates_local_profile() {
    let ctx = test_context();

    let (status, Json(profile)) =
        users::register_user(State(ctx.state.clone()), Json(registration("newbie")))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile.username, "newbie");
    let stored = ctx.repo.get_user(profile.id).await.unwrap().unwrap();
    assert_eq!(stored.email, "newbie@example.com");
}

#[tokio::test]
async fn test_register_rejects_taken_username() {
    let ctx = test_context();
    seed_user(&ctx.repo, "taken").await;

    let err = users::register_user(State(ctx.state.clone()), Json(registration("taken")))
        .await
        .unwrap_err();

    assert_eq!(
        field_errors(&err, "username"),
        vec![validation::USERNAME_TAKEN.to_string()]
    );
}

#[tokio::test]
async fn test_register_validates_payload() {
    let ctx = test_context();
    let request = RegisterUserRequest {
        email: "not-an-email".to_string(),
        password: "short".to_string(),
        username: "bad name!".to_string(),
    };

    let err = users::register_user(State(ctx.state.clone()), Json(request))
        .await
        .unwrap_err();

    assert_eq!(field_errors(&err, "email").len(), 1);
    assert_eq!(field_errors(&err, "password").len(), 1);
    assert_eq!(field_errors(&err, "username").len(), 1);
}

#[tokio::test]
async fn test_register_surfaces_provider_rejection() {
    let mut ctx = test_context();
    ctx.state.identity = Arc::new(MockIdentityProvider::new_rejecting()) as IdentityState;

    let err = users::register_user(State(ctx.state.clone()), Json(registration("newbie")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(ctx.repo.get_user_by_username("newbie").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_me_returns_caller_profile() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let Json(me) = users::get_me(alice.clone(), State(ctx.state.clone()))
        .await
        .unwrap();

    assert_eq!(me.id, alice.id);
    assert_eq!(me.username, "alice");
    assert_eq!(me.email, "alice@example.com");
}

// --- Uploads ---

#[tokio::test]
async fn test_presigned_url_uses_attachment_prefix() {
    let ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;

    let Json(response) = uploads::get_presigned_url(
        alice,
        State(ctx.state.clone()),
        Json(PresignedUrlRequest {
            filename: "Sunset.JPG".to_string(),
            file_type: "image/jpeg".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(response.resource_key.starts_with("posts/"));
    assert!(response.resource_key.ends_with(".jpg"));
    assert!(response.upload_url.contains(&response.resource_key));
    assert!(validation::attachment_key(&response.resource_key).is_ok());
}

#[tokio::test]
async fn test_presigned_url_storage_failure_is_internal_error() {
    let mut ctx = test_context();
    let alice = seed_user(&ctx.repo, "alice").await;
    ctx.state.storage = Arc::new(MockStorageService::new_failing()) as StorageState;

    let err = uploads::get_presigned_url(
        alice,
        State(ctx.state.clone()),
        Json(PresignedUrlRequest {
            filename: "a.png".to_string(),
            file_type: "image/png".to_string(),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_attachment_key_defaults_extension() {
    let key = uploads::attachment_key_for("README");
    assert!(key.starts_with("posts/"));
    assert!(key.ends_with(".bin"));

    let long = uploads::attachment_key_for(&format!("photo.{}", "x".repeat(200)));
    assert!(long.ends_with(".bin"));
    assert!(validation::attachment_key(&long).is_ok());
}
