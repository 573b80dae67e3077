use chrono::Utc;
use postboard::{
    models::{Comment, NewPost, NewUser, User},
    repository::{InMemoryRepository, PostgresRepository, Repository, RepositoryError},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

// --- Shared Scenarios ---
// Each scenario runs against any `Repository`; the in-memory store always, Postgres when
// DATABASE_URL points at a disposable database.

async fn seed_user(repo: &dyn Repository, name: &str) -> User {
    repo.create_user(NewUser {
        name: name.to_string(),
        email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4()),
        avatar: format!("https://avatars.test/{name}"),
        password_hash: "$argon2id$placeholder".to_string(),
    })
    .await
    .unwrap()
}

fn new_comment(user: &User, text: &str) -> Comment {
    Comment {
        id: Uuid::new_v4(),
        user_id: user.id,
        text: text.to_string(),
        name: user.name.clone(),
        avatar: user.avatar.clone(),
        created_at: Utc::now(),
    }
}

async fn duplicate_email_is_rejected(repo: &dyn Repository) {
    let user = seed_user(repo, "Dup").await;

    let result = repo
        .create_user(NewUser {
            name: "Other".to_string(),
            email: user.email.clone(),
            avatar: String::new(),
            password_hash: String::new(),
        })
        .await;

    assert!(matches!(result, Err(RepositoryError::DuplicateEmail)));
    assert_eq!(
        repo.find_user_by_email(&user.email).await.unwrap().unwrap().id,
        user.id
    );
}

async fn like_primitives_are_add_if_absent(repo: &dyn Repository) {
    let author = seed_user(repo, "Author").await;
    let fan = seed_user(repo, "Fan").await;
    let post = repo
        .create_post(NewPost {
            user_id: author.id,
            text: "hello".to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        })
        .await
        .unwrap();

    let likes = repo.add_like(post.id, fan.id).await.unwrap().unwrap();
    assert_eq!(likes.len(), 1);
    assert!(repo.add_like(post.id, fan.id).await.unwrap().is_none());

    let likes = repo.add_like(post.id, author.id).await.unwrap().unwrap();
    let order: Vec<Uuid> = likes.iter().map(|l| l.user_id).collect();
    assert_eq!(order, vec![author.id, fan.id]);

    let likes = repo.remove_like(post.id, fan.id).await.unwrap().unwrap();
    assert_eq!(likes.len(), 1);
    assert!(repo.remove_like(post.id, fan.id).await.unwrap().is_none());
}

async fn comments_are_removed_by_id(repo: &dyn Repository) {
    let author = seed_user(repo, "Author").await;
    let post = repo
        .create_post(NewPost {
            user_id: author.id,
            text: "thread".to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        })
        .await
        .unwrap();

    let first = new_comment(&author, "first");
    let second = new_comment(&author, "second");
    repo.add_comment(post.id, first.clone()).await.unwrap();
    let comments = repo.add_comment(post.id, second.clone()).await.unwrap();
    assert_eq!(comments.iter().next().unwrap().id, second.id);

    let comments = repo.remove_comment(post.id, first.id).await.unwrap().unwrap();
    let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.id]);
    assert!(repo.remove_comment(post.id, first.id).await.unwrap().is_none());
}

async fn delete_post_takes_likes_and_comments(repo: &dyn Repository) {
    let author = seed_user(repo, "Author").await;
    let post = repo
        .create_post(NewPost {
            user_id: author.id,
            text: "short-lived".to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        })
        .await
        .unwrap();
    repo.add_like(post.id, author.id).await.unwrap();
    repo.add_comment(post.id, new_comment(&author, "bye"))
        .await
        .unwrap();

    assert!(repo.delete_post(post.id).await.unwrap());
    assert!(repo.find_post(post.id).await.unwrap().is_none());
    assert!(!repo.delete_post(post.id).await.unwrap());
    assert!(matches!(
        repo.add_like(post.id, author.id).await,
        Err(RepositoryError::PostMissing(id)) if id == post.id
    ));
}

async fn removals_on_deleted_post_report_missing_post(repo: &dyn Repository) {
    let author = seed_user(repo, "Author").await;
    let post = repo
        .create_post(NewPost {
            user_id: author.id,
            text: "gone soon".to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        })
        .await
        .unwrap();
    let comment = new_comment(&author, "still here?");
    repo.add_like(post.id, author.id).await.unwrap();
    repo.add_comment(post.id, comment.clone()).await.unwrap();

    // A delete that lands between a handler's existence check and its removal.
    assert!(repo.delete_post(post.id).await.unwrap());

    assert!(matches!(
        repo.remove_like(post.id, author.id).await,
        Err(RepositoryError::PostMissing(id)) if id == post.id
    ));
    assert!(matches!(
        repo.remove_comment(post.id, comment.id).await,
        Err(RepositoryError::PostMissing(id)) if id == post.id
    ));
}

async fn list_posts_is_newest_first(repo: &dyn Repository) {
    let author = seed_user(repo, "Author").await;
    let mut created = Vec::new();
    for text in ["one", "two", "three"] {
        let post = repo
            .create_post(NewPost {
                user_id: author.id,
                text: text.to_string(),
                name: author.name.clone(),
                avatar: author.avatar.clone(),
            })
            .await
            .unwrap();
        created.push(post.id);
    }

    let listed: Vec<Uuid> = repo
        .list_posts()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .filter(|id| created.contains(id))
        .collect();
    created.reverse();
    assert_eq!(listed, created);
}

// --- In-memory ---

#[tokio::test]
async fn test_in_memory_duplicate_email() {
    duplicate_email_is_rejected(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_likes() {
    like_primitives_are_add_if_absent(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_comments() {
    comments_are_removed_by_id(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_delete_post() {
    delete_post_takes_likes_and_comments(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_removals_after_post_deleted() {
    removals_on_deleted_post_report_missing_post(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_list_order() {
    list_posts_is_newest_first(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_in_memory_concurrent_likes_are_not_lost() {
    let repo = Arc::new(InMemoryRepository::new());
    let author = seed_user(repo.as_ref(), "Author").await;
    let post = repo
        .create_post(NewPost {
            user_id: author.id,
            text: "race".to_string(),
            name: author.name.clone(),
            avatar: author.avatar.clone(),
        })
        .await
        .unwrap();

    let post_id = post.id;
    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.add_like(post_id, Uuid::new_v4()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = repo.find_post(post_id).await.unwrap().unwrap();
    assert_eq!(stored.likes.len(), 32);
}

// --- Postgres ---

async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run Postgres integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");
    PostgresRepository::new(pool)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_repository_scenarios() {
    let repo = postgres().await;
    duplicate_email_is_rejected(&repo).await;
    like_primitives_are_add_if_absent(&repo).await;
    comments_are_removed_by_id(&repo).await;
    delete_post_takes_likes_and_comments(&repo).await;
    removals_on_deleted_post_report_missing_post(&repo).await;
    list_posts_is_newest_first(&repo).await;
}
