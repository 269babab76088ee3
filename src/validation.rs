//! Schema validation for incoming request bodies.
//!
//! Every function here is pure: it takes the raw JSON body (or an already
//! decoded payload) and either returns a typed, validated input or an
//! [`ApiError`] describing what is wrong with it. Checks that need the
//! database (group existence, duplicate follows) live in the handlers and run
//! after these.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    error::{ApiError, FieldErrors},
    models::{
        CommentPayload, FollowPayload, NewGroup, NewPost, PostChanges, PostPayload,
        RegisterUserRequest,
    },
};

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const POST_WITH_COMMENTS: &str = "Cannot create a post with comments.";
pub const SELF_FOLLOW: &str = "You cannot follow yourself.";
pub const DUPLICATE_FOLLOW: &str = "You are already following this author.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

pub const NULL: &str = "This field may not be null.";
pub const NOT_A_STRING: &str = "Not a valid string.";
pub const IMAGE_TOO_LONG: &str = "Ensure this filename has at most 100 characters.";

/// Object key prefix for post attachments.
pub const ATTACHMENT_PREFIX: &str = "posts/";

/// Width of the `posts.image` column.
pub const IMAGE_MAX_LENGTH: usize = 100;

pub static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());
pub static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// Whether a POST/PUT body or a PATCH body is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST and PUT: required fields must be present.
    Full,
    /// PATCH: every field is optional.
    Partial,
}

impl WriteMode {
    pub fn from_partial(partial: bool) -> Self {
        if partial {
            WriteMode::Partial
        } else {
            WriteMode::Full
        }
    }
}

fn message(code: &'static str, text: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(text));
    err
}

/// Rejects empty and whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(message("blank", BLANK));
    }
    Ok(())
}

/// Attachment keys must point inside the post attachment prefix and fit the
/// `posts.image` column.
pub fn attachment_key(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > IMAGE_MAX_LENGTH {
        return Err(message("max_length", IMAGE_TOO_LONG));
    }
    let inside_prefix = value
        .strip_prefix(ATTACHMENT_PREFIX)
        .is_some_and(|rest| !rest.is_empty());
    let traverses = value.split('/').any(|segment| segment == ".." || segment == ".");
    if !inside_prefix || traverses {
        return Err(message(
            "attachment",
            "Upload a valid image. Use the key returned by /upload/presigned.",
        ));
    }
    Ok(())
}

/// JSON type a body field must have when present and not `null`.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Text,
    /// Integer id of a related row.
    Pk,
}

const POST_FIELDS: &[(&str, Expect)] = &[
    ("text", Expect::Text),
    ("group", Expect::Pk),
    ("image", Expect::Text),
];
const COMMENT_FIELDS: &[(&str, Expect)] = &[("text", Expect::Text)];
const FOLLOW_FIELDS: &[(&str, Expect)] = &[("following", Expect::Text)];

/// Decodes a JSON object body into a payload type. Known fields holding the
/// wrong JSON type are reported against the field before decoding.
fn decode<T: DeserializeOwned>(body: &Value, fields: &[(&str, Expect)]) -> Result<T, ApiError> {
    if !body.is_object() {
        return Err(ApiError::non_field(format!(
            "Invalid data. Expected a dictionary, but got {}.",
            json_kind(body)
        )));
    }
    field_types(body, fields).into_result()?;
    serde_json::from_value(body.clone())
        .map_err(|e| ApiError::Parse(format!("JSON parse error - {}", e)))
}

fn field_types(body: &Value, fields: &[(&str, Expect)]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for &(field, expect) in fields {
        match (expect, body.get(field)) {
            (_, None | Some(Value::Null)) => {}
            (Expect::Text, Some(Value::String(_))) => {}
            (Expect::Pk, Some(Value::Number(n))) if n.is_i64() => {}
            (Expect::Text, Some(_)) => errors.add(field, NOT_A_STRING),
            (Expect::Pk, Some(other)) => errors.add(
                field,
                format!(
                    "Incorrect type. Expected pk value, received {}.",
                    json_kind(other)
                ),
            ),
        }
    }
    errors
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn validate_fields<T: Validate>(payload: &T) -> FieldErrors {
    match payload.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => errors.into(),
    }
}

fn require(errors: &mut FieldErrors, field: &str, present: bool) {
    if !present {
        errors.add(field, REQUIRED);
    }
}

/// Checks a non-nullable text field: required in [`WriteMode::Full`], never
/// `null`, never blank.
fn check_text(errors: &mut FieldErrors, field: &str, value: &Option<Option<String>>, mode: WriteMode) {
    match value {
        None if mode == WriteMode::Full => errors.add(field, REQUIRED),
        None => {}
        Some(None) => errors.add(field, NULL),
        Some(Some(text)) => {
            if let Err(err) = not_blank(text) {
                errors.add(field, err.message.unwrap_or(Cow::Borrowed(BLANK)));
            }
        }
    }
}

fn trimmed(text: Option<Option<String>>) -> Option<String> {
    text.flatten().map(|t| t.trim().to_string())
}

fn post_payload(body: &Value, mode: WriteMode) -> Result<PostPayload, ApiError> {
    let payload: PostPayload = decode(body, POST_FIELDS)?;

    let mut errors = FieldErrors::new();
    check_text(&mut errors, "text", &payload.text, mode);
    if let Some(Some(key)) = &payload.image {
        if let Err(err) = attachment_key(key) {
            errors.add("image", err.message.unwrap_or(Cow::Borrowed("invalid")));
        }
    }
    errors.into_result()?;

    Ok(payload)
}

/// Validates the body of `POST /posts`.
///
/// A body that carries a `comments` key is refused outright: posts are never
/// created pre-populated with comments.
pub fn new_post(body: &Value) -> Result<NewPost, ApiError> {
    if body.get("comments").is_some() {
        return Err(ApiError::Parse(POST_WITH_COMMENTS.to_string()));
    }

    let payload = post_payload(body, WriteMode::Full)?;
    Ok(NewPost {
        text: trimmed(payload.text).unwrap_or_default(),
        group: payload.group.flatten(),
        image: payload.image.flatten(),
    })
}

/// Validates the body of `PUT`/`PATCH /posts/{id}`.
pub fn post_changes(body: &Value, mode: WriteMode) -> Result<PostChanges, ApiError> {
    let payload = post_payload(body, mode)?;
    Ok(PostChanges {
        text: trimmed(payload.text),
        group: payload.group,
        image: payload.image,
    })
}

/// Validates a comment body, returning the trimmed text when one was supplied.
/// With [`WriteMode::Full`] the text is guaranteed to be `Some`.
pub fn comment_text(body: &Value, mode: WriteMode) -> Result<Option<String>, ApiError> {
    let payload: CommentPayload = decode(body, COMMENT_FIELDS)?;

    let mut errors = FieldErrors::new();
    check_text(&mut errors, "text", &payload.text, mode);
    errors.into_result()?;

    Ok(trimmed(payload.text))
}

/// Validates the body of `POST /follow`, returning the username to follow.
pub fn follow_target(body: &Value) -> Result<String, ApiError> {
    let payload: FollowPayload = decode(body, FOLLOW_FIELDS)?;

    let mut errors = validate_fields(&payload);
    require(&mut errors, "following", payload.following.is_some());
    errors.into_result()?;

    Ok(payload
        .following
        .map(|f| f.trim().to_string())
        .unwrap_or_default())
}

/// A user may not follow themselves.
pub fn not_self_follow(user_id: Uuid, following_id: Uuid) -> Result<(), ApiError> {
    if user_id == following_id {
        return Err(ApiError::non_field(SELF_FOLLOW));
    }
    Ok(())
}

pub fn new_group(group: &NewGroup) -> Result<(), ApiError> {
    validate_fields(group).into_result()
}

pub fn registration(request: &RegisterUserRequest) -> Result<(), ApiError> {
    validate_fields(request).into_result()
}

/// Error for a `group` id that does not resolve to an existing group.
pub fn unknown_group(id: i64) -> ApiError {
    ApiError::field(
        "group",
        format!("Invalid pk \"{}\" - object does not exist.", id),
    )
}

/// Error for a `following` username that does not resolve to a user.
pub fn unknown_user(username: &str) -> ApiError {
    ApiError::field(
        "following",
        format!("Object with username={} does not exist.", username),
    )
}
