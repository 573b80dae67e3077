use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, ValidationErrorResponse},
    gravatar,
    models::{
        Comment, Comments, CreateCommentRequest, CreatePostRequest, Likes, LoginRequest,
        MessageResponse, NewPost, NewUser, Post, RegisterUserRequest, TokenResponse, User,
        UserProfile,
    },
    password,
    validation::ValidatedJson,
};
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

// --- Helpers ---

/// Parses a path identifier. A malformed id cannot name anything in the store, so it
/// reports the same `NotFound` as an absent one.
fn parse_id(raw: &str, not_found: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(not_found))
}

async fn load_post(state: &AppState, raw_id: &str) -> Result<Post, ApiError> {
    let id = parse_id(raw_id, "Post not found")?;
    state
        .repo
        .find_post(id)
        .await?
        .ok_or(ApiError::NotFound("Post not found"))
}

/// The caller's own user record. A valid token for a user the directory does not know
/// is a server-side inconsistency, not a client error.
async fn load_author(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    state
        .repo
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("no user record for authenticated id {user_id}")))
}

// --- Accounts ---

/// register_user
///
/// [Public Route] Creates an account and returns a session token for it.
///
/// The avatar is derived from the email via Gravatar; the password is stored only as an
/// Argon2 hash. An already registered email is rejected without issuing a token.
///
/// *Note*: the lookup below only short-circuits the common case. Two concurrent
/// registrations for one address are settled by the store, which reports
/// `DuplicateEmail` to the loser with the same 400 body.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Registered", body = TokenResponse),
        (status = 400, description = "Invalid input or email taken", body = ValidationErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterUserRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let RegisterUserRequest {
        name,
        email,
        password,
    } = payload;

    // 1. Reject a known address before paying for the hash.
    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".into()));
    }

    // 2. Build the record: gravatar link and Argon2 hash.
    let new_user = NewUser {
        avatar: gravatar::avatar_url(&email),
        password_hash: password::hash_password(&password)?,
        name,
        email,
    };
    // 3. Persist, then sign a token for the new id.
    let user = state.repo.create_user(new_user).await?;
    let token = auth::issue_token(user.id, &state.config)?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(TokenResponse { token }))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token.
/// Unknown email and wrong password produce the same response.
#[utoipa::path(
    post,
    path = "/api/auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 400, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid credentials.".into());

    let user = state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = auth::issue_token(user.id, &state.config)?;
    tracing::debug!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile, without the credential hash.
///
/// *Note*: mounted on the public router next to `login`; the `AuthUser` argument is what
/// enforces the token here.
#[utoipa::path(
    get,
    path = "/api/auth",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token", body = MessageResponse)
    )
)]
pub async fn get_me(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .find_user(id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(user.into()))
}

// --- Posts ---

/// create_post
///
/// [Authenticated Route] Publishes a post as the caller. The author's current name and
/// avatar are copied onto the post.
#[utoipa::path(
    post,
    path = "/api/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Created", body = Post),
        (status = 400, description = "Text missing", body = ValidationErrorResponse)
    )
)]
pub async fn create_post(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let author = load_author(&state, id).await?;

    let post = state
        .repo
        .create_post(NewPost {
            user_id: id,
            text: payload.text,
            name: author.name,
            avatar: author.avatar,
        })
        .await?;

    tracing::info!(post_id = %post.id, user_id = %id, "post created");
    Ok(Json(post))
}

/// list_posts
///
/// [Authenticated Route] Every post, newest first.
#[utoipa::path(
    get,
    path = "/api/posts",
    responses((status = 200, description = "All posts", body = [Post]))
)]
pub async fn list_posts(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.repo.list_posts().await?))
}

/// get_post
///
/// [Authenticated Route] One post by id.
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_post(
    _caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    load_post(&state, &id).await.map(Json)
}

/// delete_post
///
/// [Authenticated Route] Deletes a post together with its likes and comments.
///
/// *Authorization*: existence is checked before ownership, so a missing post is a 404
/// for every caller and only an existing post can produce 401.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Not Author", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn delete_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    // 1. Existence.
    let post = load_post(&state, &id).await?;

    // 2. Ownership.
    if post.user_id != caller {
        return Err(ApiError::Unauthorized);
    }

    // 3. Delete. `false` means a concurrent delete got there first.
    if !state.repo.delete_post(post.id).await? {
        return Err(ApiError::NotFound("Post not found"));
    }

    tracing::info!(post_id = %post.id, "post removed");
    Ok(Json(MessageResponse::new("Post removed")))
}

/// like_post
///
/// [Authenticated Route] Adds the caller's like. A second like from the same user is
/// rejected and leaves the likes unchanged.
///
/// *Concurrency*: the duplicate check is the store's add-if-absent, not a read of the
/// post, so two simultaneous likes from one user still produce a single like.
#[utoipa::path(
    put,
    path = "/api/posts/like/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Updated likes", body = Likes),
        (status = 400, description = "Already liked", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn like_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Likes>, ApiError> {
    let post = load_post(&state, &id).await?;

    state
        .repo
        .add_like(post.id, caller)
        .await?
        .map(Json)
        .ok_or(ApiError::Conflict("Post already liked"))
}

/// unlike_post
///
/// [Authenticated Route] Withdraws the caller's like. Rejected if there is none.
#[utoipa::path(
    put,
    path = "/api/posts/unlike/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Updated likes", body = Likes),
        (status = 400, description = "Not liked", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn unlike_post(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Likes>, ApiError> {
    let post = load_post(&state, &id).await?;

    state
        .repo
        .remove_like(post.id, caller)
        .await?
        .map(Json)
        .ok_or(ApiError::Conflict("Post has not yet been liked"))
}

// --- Comments ---

/// add_comment
///
/// [Authenticated Route] Comments on a post as the caller and returns all comments,
/// newest first.
///
/// The comment carries copies of the author's current name and avatar, like posts do.
/// Its id and timestamp are assigned here, before the store sees it.
#[utoipa::path(
    post,
    path = "/api/posts/comment/{id}",
    params(("id" = String, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Updated comments", body = Comments),
        (status = 400, description = "Text missing", body = ValidationErrorResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn add_comment(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> Result<Json<Comments>, ApiError> {
    // 1. Resolve the author, then the target post.
    let author = load_author(&state, caller).await?;
    let post = load_post(&state, &id).await?;

    // 2. Snapshot the author onto the comment and prepend it.
    let comment = Comment {
        id: Uuid::new_v4(),
        user_id: caller,
        text: payload.text,
        name: author.name,
        avatar: author.avatar,
        created_at: Utc::now(),
    };
    let comment_id = comment.id;

    let comments = state.repo.add_comment(post.id, comment).await?;
    tracing::info!(post_id = %post.id, %comment_id, "comment added");
    Ok(Json(comments))
}

/// delete_comment
///
/// [Authenticated Route] Deletes one comment, addressed by its own id. Only the
/// comment's author may delete it; other comments, including the same author's, stay.
///
/// *Authorization*: the post's author has no say over other people's comments. Checks
/// run in the order post exists, comment exists, caller wrote the comment.
#[utoipa::path(
    delete,
    path = "/api/posts/comment/{id}/{comment_id}",
    params(
        ("id" = String, Path, description = "Post ID"),
        ("comment_id" = String, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Updated comments", body = Comments),
        (status = 401, description = "Not Author", body = MessageResponse),
        (status = 404, description = "Post or comment not found", body = MessageResponse)
    )
)]
pub async fn delete_comment(
    AuthUser { id: caller }: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<Comments>, ApiError> {
    // 1. Post, then the comment on it.
    let post = load_post(&state, &id).await?;
    let comment_id = parse_id(&comment_id, "Comment does not exist")?;

    let comment = post
        .comments
        .get(comment_id)
        .ok_or(ApiError::NotFound("Comment does not exist"))?;

    // 2. Ownership.
    if comment.user_id != caller {
        return Err(ApiError::Unauthorized);
    }

    // 3. Remove by id.
    let comments = state
        .repo
        .remove_comment(post.id, comment_id)
        .await?
        // Deleted by a concurrent request between the read and the write.
        .ok_or(ApiError::NotFound("Comment does not exist"))?;

    tracing::info!(post_id = %post.id, %comment_id, "comment deleted");
    Ok(Json(comments))
}
