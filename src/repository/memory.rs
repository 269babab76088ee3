use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError, constraints};
use crate::{
    models::{Comment, Follow, Group, NewFollow, NewGroup, NewPost, Post, PostChanges, User},
    pagination::PageRequest,
};

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: DateTime<Utc>,
    author_id: Uuid,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: Uuid,
    text: String,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct FollowRow {
    id: i64,
    user_id: Uuid,
    following_id: Uuid,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    follows: BTreeMap<i64, FollowRow>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .get(&id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn render_post(&self, row: &PostRow) -> Post {
        Post {
            id: row.id,
            text: row.text.clone(),
            pub_date: row.pub_date,
            image: row.image.clone(),
            group: row.group_id,
            author: self.username(row.author_id),
            author_id: row.author_id,
        }
    }

    fn render_comment(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            author: self.username(row.author_id),
            post: row.post_id,
            text: row.text.clone(),
            created: row.created,
            author_id: row.author_id,
        }
    }

    fn render_follow(&self, row: &FollowRow) -> Follow {
        Follow {
            user: self.username(row.user_id),
            following: self.username(row.following_id),
        }
    }

    fn require_user(&self, id: Uuid, constraint: &str) -> RepoResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::MissingReference(constraint.to_string()))
        }
    }

    fn require_group(&self, id: Option<i64>) -> RepoResult<()> {
        match id {
            Some(id) if !self.groups.contains_key(&id) => Err(
                RepositoryError::MissingReference(constraints::POST_GROUP.to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn delete_post_cascade(&mut self, id: i64) -> bool {
        let removed = self.posts.remove(&id).is_some();
        if removed {
            self.comments.retain(|_, c| c.post_id != id);
        }
        removed
    }
}

fn window<T>(items: Vec<T>, page: Option<PageRequest>) -> Vec<T> {
    match page {
        Some(PageRequest { limit, offset }) => items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect(),
        None => items,
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory, used by the test suite and
/// by local runs without `DATABASE_URL`. It enforces the same relational rules
/// as the Postgres schema: unique usernames, slugs and follow edges, the
/// self-follow check, foreign keys, cascading deletes and `SET NULL` on group
/// deletion.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored follow edges, across all users.
    pub fn follow_count(&self) -> usize {
        self.tables().follows.len()
    }

    /// Number of stored comments, across all posts.
    pub fn comment_count(&self) -> usize {
        self.tables().comments.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut tables = self.tables();
        if tables.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict("profiles_pkey".to_string()));
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict(
                constraints::UNIQUE_USERNAME.to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        let authored: Vec<i64> = tables
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in authored {
            tables.delete_post_cascade(post_id);
        }
        tables.comments.retain(|_, c| c.author_id != id);
        tables
            .follows
            .retain(|_, f| f.user_id != id && f.following_id != id);
        Ok(true)
    }

    async fn list_groups(&self) -> RepoResult<Vec<Group>> {
        Ok(self.tables().groups.values().cloned().collect())
    }

    async fn get_group(&self, id: i64) -> RepoResult<Option<Group>> {
        Ok(self.tables().groups.get(&id).cloned())
    }

    async fn create_group(&self, group: NewGroup) -> RepoResult<Group> {
        let mut tables = self.tables();
        if tables.groups.values().any(|g| g.slug == group.slug) {
            return Err(RepositoryError::Conflict(constraints::UNIQUE_SLUG.to_string()));
        }
        let id = tables.next_id();
        let created = Group {
            id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        tables.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_group(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables();
        if tables.groups.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(true)
    }

    async fn list_posts(&self, page: Option<PageRequest>) -> RepoResult<Vec<Post>> {
        let tables = self.tables();
        let posts = tables.posts.values().map(|p| tables.render_post(p)).collect();
        Ok(window(posts, page))
    }

    async fn count_posts(&self) -> RepoResult<i64> {
        Ok(self.tables().posts.len() as i64)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let tables = self.tables();
        Ok(tables.posts.get(&id).map(|p| tables.render_post(p)))
    }

    async fn create_post(&self, author_id: Uuid, post: NewPost) -> RepoResult<Post> {
        let mut tables = self.tables();
        tables.require_user(author_id, constraints::POST_AUTHOR)?;
        tables.require_group(post.group)?;

        let row = PostRow {
            id: tables.next_id(),
            text: post.text,
            pub_date: Utc::now(),
            author_id,
            group_id: post.group,
            image: post.image,
        };
        tables.posts.insert(row.id, row.clone());
        Ok(tables.render_post(&row))
    }

    async fn update_post(
        &self,
        id: i64,
        author_id: Uuid,
        changes: PostChanges,
    ) -> RepoResult<Option<Post>> {
        let mut tables = self.tables();
        if !tables.posts.contains_key(&id) {
            return Ok(None);
        }
        tables.require_user(author_id, constraints::POST_AUTHOR)?;
        if let Some(group) = changes.group {
            tables.require_group(group)?;
        }

        let Some(row) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            row.text = text;
        }
        if let Some(group) = changes.group {
            row.group_id = group;
        }
        if let Some(image) = changes.image {
            row.image = image;
        }
        row.author_id = author_id;

        let row = row.clone();
        Ok(Some(tables.render_post(&row)))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables().delete_post_cascade(id))
    }

    async fn list_comments(
        &self,
        post_id: i64,
        page: Option<PageRequest>,
    ) -> RepoResult<Vec<Comment>> {
        let tables = self.tables();
        let comments = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.render_comment(c))
            .collect();
        Ok(window(comments, page))
    }

    async fn count_comments(&self, post_id: i64) -> RepoResult<i64> {
        Ok(self
            .tables()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .count() as i64)
    }

    async fn get_comment(&self, post_id: i64, id: i64) -> RepoResult<Option<Comment>> {
        let tables = self.tables();
        Ok(tables
            .comments
            .get(&id)
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.render_comment(c)))
    }

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        let mut tables = self.tables();
        if !tables.posts.contains_key(&post_id) {
            return Err(RepositoryError::MissingReference(
                constraints::COMMENT_POST.to_string(),
            ));
        }
        tables.require_user(author_id, constraints::COMMENT_AUTHOR)?;

        let row = CommentRow {
            id: tables.next_id(),
            post_id,
            author_id,
            text,
            created: Utc::now(),
        };
        tables.comments.insert(row.id, row.clone());
        Ok(tables.render_comment(&row))
    }

    async fn update_comment(
        &self,
        id: i64,
        post_id: i64,
        author_id: Uuid,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        let mut tables = self.tables();
        if !tables.comments.contains_key(&id) {
            return Ok(None);
        }
        if !tables.posts.contains_key(&post_id) {
            return Err(RepositoryError::MissingReference(
                constraints::COMMENT_POST.to_string(),
            ));
        }
        tables.require_user(author_id, constraints::COMMENT_AUTHOR)?;

        let Some(row) = tables.comments.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = text {
            row.text = text;
        }
        row.post_id = post_id;
        row.author_id = author_id;

        let row = row.clone();
        Ok(Some(tables.render_comment(&row)))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables().comments.remove(&id).is_some())
    }

    async fn list_follows(
        &self,
        user_id: Uuid,
        following: Option<&str>,
    ) -> RepoResult<Vec<Follow>> {
        let tables = self.tables();
        let wanted = following.map(str::to_lowercase);
        Ok(tables
            .follows
            .values()
            .filter(|f| f.user_id == user_id)
            .map(|f| tables.render_follow(f))
            .filter(|f| {
                wanted
                    .as_ref()
                    .is_none_or(|name| f.following.to_lowercase() == *name)
            })
            .collect())
    }

    async fn follow_exists(&self, user_id: Uuid, following_id: Uuid) -> RepoResult<bool> {
        Ok(self
            .tables()
            .follows
            .values()
            .any(|f| f.user_id == user_id && f.following_id == following_id))
    }

    async fn create_follow(&self, follow: NewFollow) -> RepoResult<Follow> {
        let mut tables = self.tables();
        tables.require_user(follow.user_id, constraints::FOLLOW_USER)?;
        tables.require_user(follow.following_id, constraints::FOLLOW_FOLLOWING)?;
        if follow.user_id == follow.following_id {
            return Err(RepositoryError::Conflict(
                constraints::USER_NOT_AUTHOR.to_string(),
            ));
        }
        if tables
            .follows
            .values()
            .any(|f| f.user_id == follow.user_id && f.following_id == follow.following_id)
        {
            return Err(RepositoryError::Conflict(
                constraints::ONE_FOLLOWING.to_string(),
            ));
        }

        let row = FollowRow {
            id: tables.next_id(),
            user_id: follow.user_id,
            following_id: follow.following_id,
        };
        tables.follows.insert(row.id, row);
        Ok(tables.render_follow(&row))
    }
}
