use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Stored Records ---

/// User
///
/// The account record held by the user directory. Carries the credential hash and is
/// not `Serialize`; clients only ever see `UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Gravatar URL derived from the email at registration.
    pub avatar: String,
    // Argon2 PHC string.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the user directory. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub password_hash: String,
}

/// Post
///
/// A post with its embedded likes and comments. `name` and `avatar` are copies of the
/// author's profile taken when the post was created and are not refreshed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    /// Author's user id.
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Likes,
    pub comments: Comments,
    #[serde(rename = "date")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewPost
///
/// Insert payload for the post store, already denormalized with the author's profile.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
}

/// Like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Like {
    #[serde(rename = "user")]
    pub user_id: Uuid,
}

/// Likes
///
/// The likes on a post, most recent first, with at most one entry per user.
/// The only ways in are `insert` and `FromIterator`, both of which refuse duplicates,
/// so the uniqueness invariant cannot be broken by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct Likes(Vec<Like>);

impl Likes {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.0.iter().any(|like| like.user_id == user_id)
    }

    /// Prepends a like for `user_id`. Returns `false` and leaves the list untouched when
    /// the user already likes the post.
    pub fn insert(&mut self, user_id: Uuid) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.0.insert(0, Like { user_id });
        true
    }

    /// Removes the like for `user_id`. Returns `false` when there was none.
    pub fn remove(&mut self, user_id: Uuid) -> bool {
        match self.0.iter().position(|like| like.user_id == user_id) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Like> {
        self.0.iter()
    }
}

impl FromIterator<Like> for Likes {
    /// Collects likes in the given order, keeping the first entry for each user.
    fn from_iter<I: IntoIterator<Item = Like>>(iter: I) -> Self {
        let mut likes = Vec::new();
        for like in iter {
            if !likes.iter().any(|kept: &Like| kept.user_id == like.user_id) {
                likes.push(like);
            }
        }
        Likes(likes)
    }
}

impl<'de> Deserialize<'de> for Likes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Like>::deserialize(deserializer).map(Likes::from_iter)
    }
}

/// Comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    /// Author's user id.
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
    #[serde(rename = "date")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comments
///
/// The comments on a post, most recent first, addressed by comment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct Comments(Vec<Comment>);

impl Comments {
    pub fn get(&self, comment_id: Uuid) -> Option<&Comment> {
        self.0.iter().find(|comment| comment.id == comment_id)
    }

    /// Prepends `comment`. Returns `false` if a comment with the same id is present.
    pub fn insert(&mut self, comment: Comment) -> bool {
        if self.get(comment.id).is_some() {
            return false;
        }
        self.0.insert(0, comment);
        true
    }

    /// Removes exactly the comment with `comment_id`, whoever else has commented.
    pub fn remove(&mut self, comment_id: Uuid) -> Option<Comment> {
        let index = self.0.iter().position(|comment| comment.id == comment_id)?;
        Some(self.0.remove(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.0.iter()
    }
}

impl FromIterator<Comment> for Comments {
    fn from_iter<I: IntoIterator<Item = Comment>>(iter: I) -> Self {
        let mut comments = Vec::new();
        for comment in iter {
            if !comments.iter().any(|kept: &Comment| kept.id == comment.id) {
                comments.push(comment);
            }
        }
        Comments(comments)
    }
}

impl<'de> Deserialize<'de> for Comments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Comment>::deserialize(deserializer).map(Comments::from_iter)
    }
}

// --- Request Payloads ---
// Every field defaults to empty so a missing field reports as a validation error
// rather than a deserialization rejection.

/// RegisterUserRequest
///
/// Input payload for `POST /api/users`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct RegisterUserRequest {
    #[validate(length(min = 1, message = "Name is required."))]
    pub name: String,
    #[validate(email(message = "Please include a valid email."))]
    pub email: String,
    #[validate(length(min = 6, message = "Please enter a password with 6 or more characters."))]
    pub password: String,
}

/// LoginRequest
///
/// Input payload for `POST /api/auth`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "Please include a valid email."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// CreatePostRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
}

// --- Responses ---

/// TokenResponse
///
/// Returned by registration and login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// UserProfile
///
/// The caller's own account as returned by `GET /api/auth`, without the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: String,
    #[serde(rename = "date")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

/// MessageResponse
///
/// `{ "msg": ... }` body used for confirmations and domain errors alike.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
