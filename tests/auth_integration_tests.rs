use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use postboard::{
    ApiError, AppState, InMemoryRepository,
    auth::{AuthUser, Claims, TOKEN_HEADER, issue_token, verify_token},
    config::{AppConfig, MAX_JWT_EXPIRY_SECS},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs claims directly, bypassing `issue_token`, so tests can forge expiry and secret.
fn create_token(user_id: Uuid, iat: u64, exp: u64, secret: &str) -> String {
    let claims = Claims {
        sub: user_id,
        iat: iat as usize,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn create_app_state() -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()),
        config: test_config(),
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

async fn extract_with(header_name: &str, value: &str) -> Result<AuthUser, ApiError> {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_bytes(header_name.as_bytes()).unwrap(),
        header::HeaderValue::from_str(value).unwrap(),
    );
    AuthUser::from_request_parts(&mut parts, &create_app_state()).await
}

// --- Token Service ---

#[test]
fn test_issued_token_resolves_to_its_identity() {
    let config = test_config();
    let user_id = Uuid::new_v4();

    let token = issue_token(user_id, &config).unwrap();
    let claims = verify_token(&token, TEST_JWT_SECRET).unwrap();

    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.exp - claims.iat, config.jwt_expiry_secs as usize);
}

#[test]
fn test_longest_lifetime_issues_a_valid_token() {
    let config = AppConfig {
        jwt_expiry_secs: MAX_JWT_EXPIRY_SECS,
        ..test_config()
    };

    let token = issue_token(TEST_USER_ID, &config).unwrap();
    let claims = verify_token(&token, TEST_JWT_SECRET).unwrap();

    assert_eq!(claims.sub, TEST_USER_ID);
    assert!(claims.exp > claims.iat);
}

#[test]
fn test_overflowing_lifetime_fails_instead_of_issuing_expired_token() {
    let config = AppConfig {
        jwt_expiry_secs: u64::MAX,
        ..test_config()
    };

    let err = issue_token(TEST_USER_ID, &config).unwrap_err();

    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let token = create_token(TEST_USER_ID, now(), now() + 3600, "some-other-secret");
    assert!(verify_token(&token, TEST_JWT_SECRET).is_err());
}

#[test]
fn test_tampered_token_is_rejected() {
    let token = issue_token(TEST_USER_ID, &test_config()).unwrap();

    // Swap the payload for one naming a different user, keeping the original signature.
    let mut segments: Vec<&str> = token.split('.').collect();
    let forged = create_token(Uuid::from_u128(2), now(), now() + 3600, "attacker-secret");
    let forged_payload = forged.split('.').nth(1).unwrap().to_string();
    segments[1] = &forged_payload;
    let tampered = segments.join(".");

    assert!(verify_token(&tampered, TEST_JWT_SECRET).is_err());
}

#[test]
fn test_expired_token_is_rejected() {
    // Well past the default 60s validation leeway.
    let token = create_token(TEST_USER_ID, now() - 7200, now() - 3600, TEST_JWT_SECRET);
    assert!(verify_token(&token, TEST_JWT_SECRET).is_err());
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_success_with_x_auth_token() {
    let token = create_token(TEST_USER_ID, now(), now() + 3600, TEST_JWT_SECRET);

    let user = extract_with(TOKEN_HEADER, &token).await.unwrap();

    assert_eq!(user.id, TEST_USER_ID);
}

#[tokio::test]
async fn test_auth_success_with_bearer_header() {
    let token = create_token(TEST_USER_ID, now(), now() + 3600, TEST_JWT_SECRET);

    let user = extract_with("authorization", &format!("Bearer {token}"))
        .await
        .unwrap();

    assert_eq!(user.id, TEST_USER_ID);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let err = AuthUser::from_request_parts(&mut parts, &create_app_state())
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.to_string(), "No token, authorization denied");
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let token = create_token(TEST_USER_ID, now() - 7200, now() - 3600, TEST_JWT_SECRET);

    let err = extract_with(TOKEN_HEADER, &token).await.unwrap_err();

    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.to_string(), "Token is not valid");
}

#[tokio::test]
async fn test_auth_failure_with_garbage_token() {
    let err = extract_with(TOKEN_HEADER, "not.a.jwt").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let token = create_token(TEST_USER_ID, now(), now() + 3600, TEST_JWT_SECRET);

    let err = extract_with("authorization", &format!("Basic {token}"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "No token, authorization denied");
}
