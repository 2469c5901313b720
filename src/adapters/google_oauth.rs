use crate::config::{AppConfig, OAuthClientSettings};
use crate::domain::model::UserProfile;
use crate::utils::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// The two consents the app asks for. They are granted and stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthGrant {
    Login,
    Drive,
}

impl OAuthGrant {
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            OAuthGrant::Login => &["openid", "email", "profile"],
            OAuthGrant::Drive => &[DRIVE_FILE_SCOPE],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().any(|granted| granted == scope))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|s| now + Duration::seconds(s)),
            scope: self.scope,
        }
    }
}

/// Random value for the `state` parameter.
pub fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Authorization-code flow against Google's endpoints.
pub struct GoogleOAuth {
    client: Client,
    login: OAuthClientSettings,
    drive: OAuthClientSettings,
}

impl GoogleOAuth {
    pub fn new(client: Client, login: OAuthClientSettings, drive: OAuthClientSettings) -> Self {
        Self {
            client,
            login,
            drive,
        }
    }

    pub fn from_config(client: Client, config: &AppConfig) -> Self {
        Self::new(client, config.login_client(), config.drive_client())
    }

    pub fn settings(&self, grant: OAuthGrant) -> &OAuthClientSettings {
        match grant {
            OAuthGrant::Login => &self.login,
            OAuthGrant::Drive => &self.drive,
        }
    }

    pub fn authorization_url(&self, grant: OAuthGrant, state: &str) -> Result<String> {
        let settings = self.settings(grant);
        let mut url = Url::parse(&settings.auth_url).map_err(|e| AppError::ConfigError {
            message: format!("invalid authorization endpoint: {}", e),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &settings.client_id)
                .append_pair("redirect_uri", &settings.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &grant.scopes().join(" "))
                .append_pair("state", state);

            if grant == OAuthGrant::Drive {
                query
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent")
                    .append_pair("include_granted_scopes", "true");
            }
        }

        Ok(url.into())
    }

    async fn token_request(&self, settings: &OAuthClientSettings, form: &[(&str, &str)]) -> Result<OAuthToken> {
        let response = self
            .client
            .post(&settings.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("token endpoint returned {}", status),
            };
            tracing::warn!("Token request failed: {}", message);
            return Err(AppError::AuthError { message });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_token(Utc::now()))
    }

    pub async fn exchange_code(&self, grant: OAuthGrant, code: &str) -> Result<OAuthToken> {
        let settings = self.settings(grant);
        tracing::debug!("Exchanging authorization code for {:?} grant", grant);
        self.token_request(
            settings,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("redirect_uri", settings.redirect_uri.as_str()),
            ],
        )
        .await
    }

    /// New access token for `token`. The refresh token is kept when Google omits it.
    pub async fn refresh(&self, grant: OAuthGrant, token: &OAuthToken) -> Result<OAuthToken> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| AppError::AuthError {
            message: "no refresh token; sign in again".to_string(),
        })?;
        let settings = self.settings(grant);

        let mut fresh = self
            .token_request(
                settings,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", settings.client_id.as_str()),
                    ("client_secret", settings.client_secret.as_str()),
                ],
            )
            .await?;

        if fresh.refresh_token.is_none() {
            fresh.refresh_token = token.refresh_token.clone();
        }
        if fresh.scope.is_none() {
            fresh.scope = token.scope.clone();
        }
        tracing::info!("Refreshed {:?} access token", grant);
        Ok(fresh)
    }

    pub async fn user_profile(&self, token: &OAuthToken) -> Result<UserProfile> {
        let response = self
            .client
            .get(&self.login.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::AuthError {
                message: format!("userinfo endpoint returned {}", status),
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(redirect: &str) -> OAuthClientSettings {
        OAuthClientSettings {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: redirect.to_string(),
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url: "https://accounts.example.com/token".to_string(),
            userinfo_url: "https://accounts.example.com/userinfo".to_string(),
        }
    }

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(
            Client::new(),
            settings("http://localhost:8501/oauth2callback"),
            settings("http://localhost:8501/drive_oauth2callback"),
        )
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_login_authorization_url() {
        let url = oauth().authorization_url(OAuthGrant::Login, "abc").unwrap();
        let pairs = query(&url);

        assert!(url.starts_with("https://accounts.example.com/auth?"));
        assert!(pairs.contains(&("scope".to_string(), "openid email profile".to_string())));
        assert!(pairs.contains(&("state".to_string(), "abc".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8501/oauth2callback".to_string()
        )));
        assert!(!pairs.iter().any(|(k, _)| k == "access_type"));
    }

    #[test]
    fn test_drive_authorization_url_requests_offline_access() {
        let url = oauth().authorization_url(OAuthGrant::Drive, "xyz").unwrap();
        let pairs = query(&url);

        assert!(pairs.contains(&("scope".to_string(), DRIVE_FILE_SCOPE.to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "consent".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8501/drive_oauth2callback".to_string()
        )));
    }

    #[test]
    fn test_token_expiry_uses_skew() {
        let now = Utc::now();
        let mut token = OAuthToken {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: Some(now + Duration::seconds(30)),
            scope: Some(format!("openid {}", DRIVE_FILE_SCOPE)),
        };
        assert!(token.is_expired_at(now));

        token.expires_at = Some(now + Duration::seconds(3600));
        assert!(!token.is_expired_at(now));
        assert!(token.has_scope(DRIVE_FILE_SCOPE));
        assert!(!token.has_scope("email"));

        token.expires_at = None;
        assert!(!token.is_expired_at(now));
    }
}
