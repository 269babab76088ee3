use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Local mirror of an identity-provider account, stored in the `profiles` table.
/// Posts, comments and follow edges all reference this record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    // Primary Key, issued by the identity provider.
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Group
///
/// A thematic community posts can be published into. Read-only through the API.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Post
///
/// A publication joined with its author's username. `author_id` never leaves
/// the server; the API exposes the username in `author` instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    /// Attachment object key (`posts/...`), if any.
    pub image: Option<String>,
    #[sqlx(rename = "group_id")]
    pub group: Option<i64>,
    pub author: String,
    #[serde(skip)]
    #[ts(skip)]
    pub author_id: Uuid,
}

/// Comment
///
/// A comment on a post, joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub author: String,
    #[sqlx(rename = "post_id")]
    pub post: i64,
    pub text: String,
    #[ts(type = "string")]
    pub created: DateTime<Utc>,
    #[serde(skip)]
    #[ts(skip)]
    pub author_id: Uuid,
}

/// Follow
///
/// A follow edge rendered with both usernames: `user` follows `following`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Follow {
    pub user: String,
    pub following: String,
}

/// NewFollow
///
/// Internal structure describing a follow edge about to be inserted into the
/// `follows` table. Both ids are resolved before it reaches the repository.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewFollow {
    pub user_id: Uuid,
    pub following_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// PostPayload
///
/// Input for POST/PUT/PATCH on `/posts`. Which fields are required depends on
/// the operation, so presence is checked in `validation` rather than here.
/// Every field distinguishes "absent" from an explicit `null`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
pub struct PostPayload {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub text: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    pub group: Option<Option<i64>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

/// NewPost
///
/// A validated post ready for insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub text: String,
    pub group: Option<i64>,
    pub image: Option<String>,
}

/// PostChanges
///
/// A validated set of post changes. `None` leaves the column untouched,
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostChanges {
    pub text: Option<String>,
    pub group: Option<Option<i64>>,
    pub image: Option<Option<String>>,
}

/// CommentPayload
///
/// Input for creating or editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentPayload {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(optional)]
    pub text: Option<Option<String>>,
}

/// FollowPayload
///
/// Input for `POST /follow`; `following` is the username to follow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct FollowPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub following: Option<String>,
}

/// NewGroup
///
/// Input for seeding a group. Groups have no public write endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate, Default)]
pub struct NewGroup {
    #[validate(
        custom(function = "crate::validation::not_blank"),
        length(max = 200, message = "Ensure this field has no more than 200 characters.")
    )]
    pub title: String,
    #[validate(
        regex(
            path = *crate::validation::SLUG_RE,
            message = "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens."
        ),
        length(max = 50, message = "Ensure this field has no more than 50 characters.")
    )]
    pub slug: String,
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub description: String,
}

/// RegisterUserRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// The password is passed through to the identity provider and never persisted
/// or logged by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,
    #[validate(
        regex(
            path = *crate::validation::USERNAME_RE,
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        ),
        length(max = 150, message = "Ensure this field has no more than 150 characters.")
    )]
    pub username: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to submit as `image` when creating or editing a post.
    pub resource_key: String,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /me) and registration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Deserializes a present field (including an explicit `null`) as `Some(..)`.
/// Combined with `#[serde(default)]`, an absent field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
