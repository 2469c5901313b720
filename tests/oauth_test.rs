use httpmock::prelude::*;
use recipe_calendar::adapters::google_oauth::{GoogleOAuth, OAuthGrant, OAuthToken, DRIVE_FILE_SCOPE};
use recipe_calendar::config::AppConfig;
use recipe_calendar::AppError;
use serde_json::json;

fn oauth_for(server: &MockServer) -> GoogleOAuth {
    let config = AppConfig::from_toml_str(&format!(
        r#"
[server]
public_url = "http://localhost:8501"

[auth]
client_id = "login-client"
client_secret = "login-secret"
token_url = "{base}/token"
userinfo_url = "{base}/userinfo"
auth_url = "{base}/auth"

[google_drive]
client_id = "drive-client"
client_secret = "drive-secret"
"#,
        base = server.base_url()
    ))
    .unwrap();
    GoogleOAuth::from_config(reqwest::Client::new(), &config)
}

/// 授權碼交換：Drive 授權使用獨立的 client 與 redirect_uri
#[tokio::test]
async fn test_exchange_code_for_drive_grant() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/token")
                .x_www_form_urlencoded_tuple("grant_type", "authorization_code")
                .x_www_form_urlencoded_tuple("code", "auth-code-1")
                .x_www_form_urlencoded_tuple("client_id", "drive-client")
                .x_www_form_urlencoded_tuple(
                    "redirect_uri",
                    "http://localhost:8501/drive_oauth2callback",
                );
            then.status(200).json_body(json!({
                "access_token": "drive-access",
                "refresh_token": "drive-refresh",
                "expires_in": 3599,
                "scope": DRIVE_FILE_SCOPE,
                "token_type": "Bearer"
            }));
        })
        .await;

    let token = oauth_for(&server)
        .exchange_code(OAuthGrant::Drive, "auth-code-1")
        .await
        .unwrap();

    token_mock.assert_async().await;
    assert_eq!(token.access_token, "drive-access");
    assert_eq!(token.refresh_token.as_deref(), Some("drive-refresh"));
    assert!(token.has_scope(DRIVE_FILE_SCOPE));
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_refresh_keeps_existing_refresh_token_and_scope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/token")
                .x_www_form_urlencoded_tuple("grant_type", "refresh_token")
                .x_www_form_urlencoded_tuple("refresh_token", "keep-me");
            then.status(200).json_body(json!({
                "access_token": "fresh-access",
                "expires_in": 3600
            }));
        })
        .await;

    let stale = OAuthToken {
        access_token: "stale".to_string(),
        refresh_token: Some("keep-me".to_string()),
        expires_at: Some(chrono::Utc::now()),
        scope: Some(DRIVE_FILE_SCOPE.to_string()),
    };

    let fresh = oauth_for(&server)
        .refresh(OAuthGrant::Drive, &stale)
        .await
        .unwrap();

    assert_eq!(fresh.access_token, "fresh-access");
    assert_eq!(fresh.refresh_token.as_deref(), Some("keep-me"));
    assert!(fresh.has_scope(DRIVE_FILE_SCOPE));
}

#[tokio::test]
async fn test_refresh_without_refresh_token_fails_without_network() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({ "access_token": "x" }));
        })
        .await;

    let token = OAuthToken {
        access_token: "stale".to_string(),
        refresh_token: None,
        expires_at: None,
        scope: None,
    };
    let err = oauth_for(&server)
        .refresh(OAuthGrant::Drive, &token)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AuthError { .. }));
    assert_eq!(token_mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_token_endpoint_error_is_an_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            }));
        })
        .await;

    let err = oauth_for(&server)
        .exchange_code(OAuthGrant::Login, "used-code")
        .await
        .unwrap_err();

    match err {
        AppError::AuthError { message } => assert_eq!(message, "invalid_grant: Bad Request"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_user_profile_uses_bearer_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/userinfo")
                .header("authorization", "Bearer login-access");
            then.status(200).json_body(json!({
                "sub": "1234",
                "email": "cook@example.com",
                "name": "Home Cook",
                "given_name": "Home",
                "picture": "https://img.example.com/me.png",
                "email_verified": true
            }));
        })
        .await;

    let token = OAuthToken {
        access_token: "login-access".to_string(),
        refresh_token: None,
        expires_at: None,
        scope: Some("openid email profile".to_string()),
    };
    let profile = oauth_for(&server).user_profile(&token).await.unwrap();

    assert_eq!(profile.email, "cook@example.com");
    assert_eq!(profile.given_name.as_deref(), Some("Home"));
    assert_eq!(profile.email_verified, Some(true));
}

#[tokio::test]
async fn test_user_profile_rejected_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/userinfo");
            then.status(401);
        })
        .await;

    let token = OAuthToken {
        access_token: "revoked".to_string(),
        refresh_token: None,
        expires_at: None,
        scope: None,
    };
    let err = oauth_for(&server).user_profile(&token).await.unwrap_err();
    assert!(matches!(err, AppError::AuthError { .. }));
}
