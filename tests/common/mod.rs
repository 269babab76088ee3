#![allow(dead_code)]

use std::sync::Arc;

use yatube_api::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    identity::{IdentityState, MockIdentityProvider},
    models::{Group, NewGroup, NewPost, Post, User},
    repository::{InMemoryRepository, Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use uuid::Uuid;

/// A fresh in-memory application state plus a typed handle on its repository.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
}

pub fn test_context() -> TestContext {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        identity: Arc::new(MockIdentityProvider::new()) as IdentityState,
        config: AppConfig::default(),
    };
    TestContext { state, repo }
}

pub async fn seed_user(repo: &InMemoryRepository, username: &str) -> AuthUser {
    let user = repo
        .create_user(User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
        })
        .await
        .expect("seed user");
    AuthUser {
        id: user.id,
        username: user.username,
    }
}

pub async fn seed_group(repo: &InMemoryRepository, slug: &str) -> Group {
    repo.create_group(NewGroup {
        title: format!("Group {}", slug),
        slug: slug.to_string(),
        description: "A test group".to_string(),
    })
    .await
    .expect("seed group")
}

pub async fn seed_post(repo: &InMemoryRepository, author: &AuthUser, text: &str) -> Post {
    repo.create_post(
        author.id,
        NewPost {
            text: text.to_string(),
            group: None,
            image: None,
        },
    )
    .await
    .expect("seed post")
}
