use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{RepoResult, Repository};
use crate::{
    models::{Comment, Follow, Group, NewFollow, NewGroup, NewPost, Post, PostChanges, User},
    pagination::PageRequest,
};

// Every post read joins the author to render the username.
const SELECT_POSTS: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image, p.group_id, p.author_id, u.username AS author
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
"#;

const SELECT_COMMENTS: &str = r#"
    SELECT c.id, u.username AS author, c.post_id, c.text, c.created, c.author_id
    FROM comments c
    JOIN profiles u ON u.id = c.author_id
"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Cascades, `SET NULL` on group deletion and the follow constraints are all
/// enforced by the schema in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, page: Option<PageRequest>) {
    if let Some(PageRequest { limit, offset }) = page {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username, email FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email FROM profiles WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO profiles (id, username, email) VALUES ($1, $2, $3) RETURNING id, username, email",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- GROUPS ---

    async fn list_groups(&self) -> RepoResult<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM groups ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    async fn get_group(&self, id: i64) -> RepoResult<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn create_group(&self, group: NewGroup) -> RepoResult<Group> {
        let created = sqlx::query_as::<_, Group>(
            r#"INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3)
               RETURNING id, title, slug, description"#,
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn delete_group(&self, id: i64) -> RepoResult<bool> {
        // posts.group_id is ON DELETE SET NULL.
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- POSTS ---

    async fn list_posts(&self, page: Option<PageRequest>) -> RepoResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_POSTS);
        builder.push(" ORDER BY p.id");
        push_page(&mut builder, page);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn count_posts(&self) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_POSTS);
        builder.push(" WHERE p.id = ");
        builder.push_bind(id);

        let post = builder
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_post(&self, author_id: Uuid, post: NewPost) -> RepoResult<Post> {
        // Insert and join the author in one round trip.
        let created = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (text, author_id, group_id, image)
                VALUES ($1, $2, $3, $4)
                RETURNING id, text, pub_date, image, group_id, author_id
            )
            SELECT i.id, i.text, i.pub_date, i.image, i.group_id, i.author_id, u.username AS author
            FROM inserted i
            JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(&post.text)
        .bind(author_id)
        .bind(post.group)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_post(
        &self,
        id: i64,
        author_id: Uuid,
        changes: PostChanges,
    ) -> RepoResult<Option<Post>> {
        // COALESCE cannot clear a column, so nullable fields carry an explicit
        // "was supplied" flag next to their value.
        let updated = sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts
                SET text = COALESCE($3, text),
                    group_id = CASE WHEN $4 THEN $5 ELSE group_id END,
                    image = CASE WHEN $6 THEN $7 ELSE image END,
                    author_id = $2
                WHERE id = $1
                RETURNING id, text, pub_date, image, group_id, author_id
            )
            SELECT d.id, d.text, d.pub_date, d.image, d.group_id, d.author_id, u.username AS author
            FROM updated d
            JOIN profiles u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(author_id)
        .bind(changes.text)
        .bind(changes.group.is_some())
        .bind(changes.group.flatten())
        .bind(changes.image.is_some())
        .bind(changes.image.flatten())
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        // comments.post_id is ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(
        &self,
        post_id: i64,
        page: Option<PageRequest>,
    ) -> RepoResult<Vec<Comment>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COMMENTS);
        builder.push(" WHERE c.post_id = ");
        builder.push_bind(post_id);
        builder.push(" ORDER BY c.id");
        push_page(&mut builder, page);

        let comments = builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn count_comments(&self, post_id: i64) -> RepoResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn get_comment(&self, post_id: i64, id: i64) -> RepoResult<Option<Comment>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COMMENTS);
        builder.push(" WHERE c.id = ");
        builder.push_bind(id);
        builder.push(" AND c.post_id = ");
        builder.push_bind(post_id);

        let comment = builder
            .build_query_as::<Comment>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, text, created
            )
            SELECT i.id, u.username AS author, i.post_id, i.text, i.created, i.author_id
            FROM inserted i
            JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_comment(
        &self,
        id: i64,
        post_id: i64,
        author_id: Uuid,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        let updated = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments
                SET text = COALESCE($4, text),
                    post_id = $2,
                    author_id = $3
                WHERE id = $1
                RETURNING id, post_id, author_id, text, created
            )
            SELECT d.id, u.username AS author, d.post_id, d.text, d.created, d.author_id
            FROM updated d
            JOIN profiles u ON u.id = d.author_id
            "#,
        )
        .bind(id)
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- FOLLOWS ---

    async fn list_follows(
        &self,
        user_id: Uuid,
        following: Option<&str>,
    ) -> RepoResult<Vec<Follow>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT u.username AS "user", f.username AS following
            FROM follows fo
            JOIN profiles u ON u.id = fo.user_id
            JOIN profiles f ON f.id = fo.following_id
            WHERE fo.user_id = "#,
        );
        builder.push_bind(user_id);

        if let Some(username) = following {
            builder.push(" AND LOWER(f.username) = LOWER(");
            builder.push_bind(username.to_string());
            builder.push(")");
        }
        builder.push(" ORDER BY fo.id");

        let follows = builder
            .build_query_as::<Follow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(follows)
    }

    async fn follow_exists(&self, user_id: Uuid, following_id: Uuid) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND following_id = $2)",
        )
        .bind(user_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_follow(&self, follow: NewFollow) -> RepoResult<Follow> {
        // `one_following` and `user_not_author` surface as Conflict via From<sqlx::Error>.
        let created = sqlx::query_as::<_, Follow>(
            r#"
            WITH inserted AS (
                INSERT INTO follows (user_id, following_id)
                VALUES ($1, $2)
                RETURNING user_id, following_id
            )
            SELECT u.username AS "user", f.username AS following
            FROM inserted i
            JOIN profiles u ON u.id = i.user_id
            JOIN profiles f ON f.id = i.following_id
            "#,
        )
        .bind(follow.user_id)
        .bind(follow.following_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}
