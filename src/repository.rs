use crate::models::{Comment, Comments, Like, Likes, NewPost, NewUser, Post, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Store failures. `DuplicateEmail` and `PostMissing` are expected outcomes of racing
/// requests; `Database` is anything the store itself reports.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("email address is already registered")]
    DuplicateEmail,
    #[error("post {0} does not exist")]
    PostMissing(Uuid),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The user directory and post store behind the handlers. Handlers only see this trait,
/// so any backend (Postgres, in-memory) can be injected through `AppState`.
///
/// Like and comment mutations are single store-level operations (add-if-absent,
/// remove-if-present) rather than read-modify-write of the whole post, so concurrent
/// mutations on one post never overwrite each other.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- User Directory ---
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Fails with `DuplicateEmail` if the address is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    /// All posts, newest first.
    async fn list_posts(&self) -> RepoResult<Vec<Post>>;
    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>>;
    /// Deletes the post with its likes and comments. `false` if it did not exist.
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool>;

    // --- Likes ---
    /// Adds a like unless `user_id` already likes the post. Returns the updated likes,
    /// or `None` when the like was already present.
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>>;
    /// Removes the like of `user_id`. Returns the updated likes, or `None` when there
    /// was nothing to remove. Fails with `PostMissing` if the post is gone.
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>>;

    // --- Comments ---
    /// Prepends `comment` and returns the updated comments.
    async fn add_comment(&self, post_id: Uuid, comment: Comment) -> RepoResult<Comments>;
    /// Removes the comment with `comment_id`. Returns the updated comments, or `None`
    /// when no such comment exists on the post. Fails with `PostMissing` if the post is
    /// gone.
    async fn remove_comment(&self, post_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comments>>;
}

/// RepositoryState
///
/// The concrete type used to share the store across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    text: String,
    name: String,
    avatar: String,
    created_at: DateTime<Utc>,
}

impl PostRow {
    fn into_post(self, likes: Likes, comments: Comments) -> Post {
        Post {
            id: self.id,
            user_id: self.user_id,
            text: self.text,
            name: self.name,
            avatar: self.avatar,
            likes,
            comments,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LikeRow {
    post_id: Uuid,
    user_id: Uuid,
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    text: String,
    name: String,
    avatar: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            name: row.name,
            avatar: row.avatar,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, avatar, password_hash, created_at";
const POST_COLUMNS: &str = "id, user_id, text, name, avatar, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, user_id, text, name, avatar, created_at";

/// Maps a foreign-key violation on a post reference to `PostMissing`.
fn post_write_error(err: sqlx::Error, post_id: Uuid) -> RepositoryError {
    match err.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => RepositoryError::PostMissing(post_id),
        _ => RepositoryError::Database(err),
    }
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Likes and comments live in their own tables
/// (`post_likes`, `post_comments`) keyed to the post, and are assembled into `Post`
/// on read. Ordering within a post follows the insertion sequence column, newest first.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Wraps an already connected pool. Migrations are run by the caller.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinguishes "nothing to remove" from "the post itself is gone". A post deleted
    /// concurrently takes its likes and comments with it, so an empty `DELETE` alone
    /// cannot tell the two apart.
    async fn ensure_post(&self, post_id: Uuid) -> RepoResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(RepositoryError::PostMissing(post_id))
        }
    }

    /// Likes of one post, newest first.
    async fn likes_for(&self, post_id: Uuid) -> RepoResult<Likes> {
        let rows = sqlx::query_as::<_, LikeRow>(
            "SELECT post_id, user_id FROM post_likes WHERE post_id = $1 ORDER BY seq DESC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| Like { user_id: row.user_id }).collect())
    }

    async fn comments_for(&self, post_id: Uuid) -> RepoResult<Comments> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM post_comments WHERE post_id = $1 ORDER BY seq DESC"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// Attaches likes and comments to a batch of post rows with one query per table.
    async fn assemble(&self, rows: Vec<PostRow>) -> RepoResult<Vec<Post>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let like_rows = sqlx::query_as::<_, LikeRow>(
            "SELECT post_id, user_id FROM post_likes WHERE post_id = ANY($1) ORDER BY seq DESC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let comment_rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM post_comments WHERE post_id = ANY($1) ORDER BY seq DESC"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut likes: HashMap<Uuid, Vec<Like>> = HashMap::new();
        for row in like_rows {
            likes
                .entry(row.post_id)
                .or_default()
                .push(Like { user_id: row.user_id });
        }

        let mut comments: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for row in comment_rows {
            comments.entry(row.post_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let post_likes = likes.remove(&row.id).unwrap_or_default();
                let post_comments = comments.remove(&row.id).unwrap_or_default();
                row.into_post(
                    post_likes.into_iter().collect(),
                    post_comments.into_iter().collect(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_user
    ///
    /// Looks up an account by id. Used to resolve the author of new posts and comments.
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// find_user_by_email
    ///
    /// Exact match on the stored address; the login key.
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Relies on the unique index on `users.email`; a violation becomes `DuplicateEmail`.
    /// The id is generated here, the timestamp by the database.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, avatar, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err.as_database_error() {
            Some(db) if db.is_unique_violation() => RepositoryError::DuplicateEmail,
            _ => RepositoryError::Database(err),
        })
    }

    /// create_post
    ///
    /// Inserts the post row. A new post has no likes or comments, so nothing else is read
    /// back.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (id, user_id, text, name, avatar, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(post.user_id)
        .bind(&post.text)
        .bind(&post.name)
        .bind(&post.avatar)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_post(Likes::default(), Comments::default()))
    }

    /// list_posts
    ///
    /// Every post, newest first, with likes and comments attached by `assemble`
    /// (three queries in total regardless of the number of posts).
    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    /// find_post
    ///
    /// One post with its likes and comments, or `None` if the id is unknown.
    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let likes = self.likes_for(id).await?;
                let comments = self.comments_for(id).await?;
                Ok(Some(row.into_post(likes, comments)))
            }
            None => Ok(None),
        }
    }

    /// delete_post
    ///
    /// Likes and comments go with the post via `ON DELETE CASCADE`.
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// add_like
    ///
    /// The `(post_id, user_id)` primary key plus `ON CONFLICT DO NOTHING` makes this an
    /// atomic add-if-absent. Zero inserted rows means the like already existed.
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>> {
        let result = sqlx::query(
            "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|err| post_write_error(err, post_id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.likes_for(post_id).await.map(Some)
    }

    /// remove_like
    ///
    /// Deletes exactly the `(post_id, user_id)` row. An empty delete is followed by an
    /// existence check so a concurrently deleted post reports `PostMissing` rather than
    /// "not liked".
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>> {
        let result = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            self.ensure_post(post_id).await?;
            return Ok(None);
        }
        self.likes_for(post_id).await.map(Some)
    }

    /// add_comment
    ///
    /// Inserts the comment with its caller-assigned id and timestamp. A foreign-key
    /// violation means the post was deleted in the meantime and maps to `PostMissing`.
    async fn add_comment(&self, post_id: Uuid, comment: Comment) -> RepoResult<Comments> {
        sqlx::query(
            "INSERT INTO post_comments (id, post_id, user_id, text, name, avatar, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(comment.id)
        .bind(post_id)
        .bind(comment.user_id)
        .bind(&comment.text)
        .bind(&comment.name)
        .bind(&comment.avatar)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| post_write_error(err, post_id))?;

        self.comments_for(post_id).await
    }

    /// remove_comment
    ///
    /// Deletes the comment by its own id, scoped to the post. Like `remove_like`, an
    /// empty delete checks whether the post itself is gone.
    async fn remove_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> RepoResult<Option<Comments>> {
        let result = sqlx::query("DELETE FROM post_comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            self.ensure_post(post_id).await?;
            return Ok(None);
        }
        self.comments_for(post_id).await.map(Some)
    }
}

// --- In-memory ---

/// InMemoryRepository
///
/// `Repository` held entirely in process memory. Used for local runs without
/// `DATABASE_URL` and as the store behind the test suite. Every mutation happens under a
/// single write guard, which gives the same add-if-absent / remove-if-present atomicity
/// as the Postgres backend.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<User>>,
    // Insertion order; `list_posts` sorts by date.
    posts: RwLock<Vec<Post>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    /// The duplicate check and the insert happen under one write guard, so two
    /// registrations for the same address cannot both succeed.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let created = Post {
            id: Uuid::new_v4(),
            user_id: post.user_id,
            text: post.text,
            name: post.name,
            avatar: post.avatar,
            likes: Likes::default(),
            comments: Comments::default(),
            created_at: Utc::now(),
        };
        self.posts.write().await.push(created.clone());
        Ok(created)
    }

    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        // Reverse insertion order first so equal timestamps still list newest first
        // (sort_by is stable).
        let mut posts: Vec<Post> = self.posts.read().await.iter().rev().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn find_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        Ok(self.posts.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }

    // Like and comment mutations find the post and change it under the same guard.
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(RepositoryError::PostMissing(post_id))?;
        Ok(post.likes.insert(user_id).then(|| post.likes.clone()))
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> RepoResult<Option<Likes>> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(RepositoryError::PostMissing(post_id))?;
        Ok(post.likes.remove(user_id).then(|| post.likes.clone()))
    }

    async fn add_comment(&self, post_id: Uuid, comment: Comment) -> RepoResult<Comments> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(RepositoryError::PostMissing(post_id))?;
        post.comments.insert(comment);
        Ok(post.comments.clone())
    }

    async fn remove_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> RepoResult<Option<Comments>> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(RepositoryError::PostMissing(post_id))?;
        Ok(post
            .comments
            .remove(comment_id)
            .map(|_| post.comments.clone()))
    }
}
