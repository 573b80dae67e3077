use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// The post operations. `create_router` wraps this router in the authorization guard, so
/// a request without a valid token never reaches these handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/posts, GET /api/posts
        .route("/posts", post(handlers::create_post).get(handlers::list_posts))
        // GET /api/posts/{id}, DELETE /api/posts/{id}
        // Deletion is author-only; checked in the handler after the existence check.
        .route(
            "/posts/{id}",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        // PUT /api/posts/like/{id}, PUT /api/posts/unlike/{id}
        // Each rejects the redundant call (double like, unlike without like).
        .route("/posts/like/{id}", put(handlers::like_post))
        .route("/posts/unlike/{id}", put(handlers::unlike_post))
        // POST /api/posts/comment/{id}
        .route("/posts/comment/{id}", post(handlers::add_comment))
        // DELETE /api/posts/comment/{id}/{comment_id}
        // Author-only; removes exactly the addressed comment.
        .route(
            "/posts/comment/{id}/{comment_id}",
            delete(handlers::delete_comment),
        )
}
