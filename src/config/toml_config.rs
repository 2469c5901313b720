use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_FOLDER_NAME: &str = "Recipe Calendar App Data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub google_drive: Option<DriveConfig>,
    pub anylist: Option<AnyListConfig>,
    pub library: Option<LibraryConfig>,
    pub planner: Option<PlannerConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub secure_cookies: Option<bool>,
    pub session_idle_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub api_base: Option<String>,
    pub folder_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnyListConfig {
    pub enabled: Option<bool>,
    pub node_binary: Option<String>,
    pub bridge_script: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub credentials_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub default_recipes_path: Option<String>,
    pub recipes_per_page: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub meals_per_week: Option<usize>,
    pub weeks_shown: Option<usize>,
    pub auto_populate: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// Client settings for one OAuth grant, resolved from `[auth]` / `[google_drive]`.
#[derive(Debug, Clone)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AppError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AppError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AppError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn host(&self) -> &str {
        self.server.host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(8501)
    }

    pub fn public_url(&self) -> String {
        self.server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port()))
            .trim_end_matches('/')
            .to_string()
    }

    pub fn secure_cookies(&self) -> bool {
        self.server.secure_cookies.unwrap_or(false)
    }

    pub fn session_idle_minutes(&self) -> u64 {
        self.server.session_idle_minutes.unwrap_or(12 * 60)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes().saturating_mul(60))
    }

    pub fn login_client(&self) -> OAuthClientSettings {
        OAuthClientSettings {
            client_id: self.auth.client_id.clone(),
            client_secret: self.auth.client_secret.clone(),
            redirect_uri: self
                .auth
                .redirect_uri
                .clone()
                .unwrap_or_else(|| format!("{}/oauth2callback", self.public_url())),
            auth_url: self.auth.auth_url.clone().unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            token_url: self.auth.token_url.clone().unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            userinfo_url: self
                .auth
                .userinfo_url
                .clone()
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
        }
    }

    /// Drive grant settings; client id and secret fall back to the login client.
    pub fn drive_client(&self) -> OAuthClientSettings {
        let login = self.login_client();
        let drive = self.google_drive.clone().unwrap_or_default();
        OAuthClientSettings {
            client_id: drive.client_id.unwrap_or(login.client_id),
            client_secret: drive.client_secret.unwrap_or(login.client_secret),
            redirect_uri: drive
                .redirect_uri
                .unwrap_or_else(|| format!("{}/drive_oauth2callback", self.public_url())),
            ..login
        }
    }

    pub fn drive_api_base(&self) -> String {
        self.google_drive
            .as_ref()
            .and_then(|d| d.api_base.clone())
            .unwrap_or_else(|| GOOGLE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn drive_folder_name(&self) -> String {
        self.google_drive
            .as_ref()
            .and_then(|d| d.folder_name.clone())
            .unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string())
    }

    pub fn anylist_enabled(&self) -> bool {
        self.anylist.as_ref().and_then(|a| a.enabled).unwrap_or(true)
    }

    pub fn node_binary(&self) -> String {
        self.anylist
            .as_ref()
            .and_then(|a| a.node_binary.clone())
            .unwrap_or_else(|| "node".to_string())
    }

    pub fn bridge_script(&self) -> String {
        self.anylist
            .as_ref()
            .and_then(|a| a.bridge_script.clone())
            .unwrap_or_else(|| "bridge/anylist_bridge.js".to_string())
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(
            self.anylist
                .as_ref()
                .and_then(|a| a.timeout_seconds)
                .unwrap_or(60),
        )
    }

    pub fn credentials_path(&self) -> String {
        self.anylist
            .as_ref()
            .and_then(|a| a.credentials_path.clone())
            .unwrap_or_else(|| "data/anylist_creds.json".to_string())
    }

    pub fn key_path(&self) -> String {
        self.anylist
            .as_ref()
            .and_then(|a| a.key_path.clone())
            .unwrap_or_else(|| "data/.encryption_key".to_string())
    }

    pub fn default_recipes_path(&self) -> Option<&str> {
        self.library
            .as_ref()
            .and_then(|l| l.default_recipes_path.as_deref())
    }

    pub fn recipes_per_page(&self) -> usize {
        self.library
            .as_ref()
            .and_then(|l| l.recipes_per_page)
            .unwrap_or(10)
    }

    pub fn meals_per_week(&self) -> usize {
        self.planner
            .as_ref()
            .and_then(|p| p.meals_per_week)
            .unwrap_or(crate::domain::model::DEFAULT_MEALS_PER_WEEK)
    }

    pub fn weeks_shown(&self) -> usize {
        self.planner.as_ref().and_then(|p| p.weeks_shown).unwrap_or(4)
    }

    pub fn auto_populate(&self) -> bool {
        self.planner
            .as_ref()
            .and_then(|p| p.auto_populate)
            .unwrap_or(true)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn log_format(&self) -> &str {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .unwrap_or("compact")
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("auth.client_id", &self.auth.client_id)?;
        validation::validate_non_empty_string("auth.client_secret", &self.auth.client_secret)?;
        if self.auth.client_id.contains("${") {
            return Err(AppError::MissingConfigError {
                field: "auth.client_id (environment variable not set)".to_string(),
            });
        }

        validation::validate_url("server.public_url", &self.public_url())?;
        validation::validate_range(
            "server.session_idle_minutes",
            self.session_idle_minutes(),
            1,
            7 * 24 * 60,
        )?;

        let login = self.login_client();
        validation::validate_url("auth.redirect_uri", &login.redirect_uri)?;
        validation::validate_url("auth.auth_url", &login.auth_url)?;
        validation::validate_url("auth.token_url", &login.token_url)?;
        validation::validate_url("auth.userinfo_url", &login.userinfo_url)?;
        validation::validate_url("google_drive.redirect_uri", &self.drive_client().redirect_uri)?;
        validation::validate_url("google_drive.api_base", &self.drive_api_base())?;
        validation::validate_non_empty_string("google_drive.folder_name", &self.drive_folder_name())?;

        if self.anylist_enabled() {
            validation::validate_non_empty_string("anylist.node_binary", &self.node_binary())?;
            validation::validate_file_extension(
                "anylist.bridge_script",
                &self.bridge_script(),
                &["js", "mjs", "cjs"],
            )?;
            validation::validate_range(
                "anylist.timeout_seconds",
                self.bridge_timeout().as_secs(),
                1,
                600,
            )?;
            validation::validate_path("anylist.credentials_path", &self.credentials_path())?;
            validation::validate_path("anylist.key_path", &self.key_path())?;
        }

        if let Some(path) = self.default_recipes_path() {
            validation::validate_path("library.default_recipes_path", path)?;
        }
        validation::validate_range("library.recipes_per_page", self.recipes_per_page(), 1, 100)?;
        validation::validate_positive_number("planner.meals_per_week", self.meals_per_week(), 1)?;
        validation::validate_range("planner.meals_per_week", self.meals_per_week(), 1, 14)?;
        validation::validate_range("planner.weeks_shown", self.weeks_shown(), 1, 8)?;

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.log_format()) {
            return Err(AppError::InvalidConfigValueError {
                field: "monitoring.log_format".to_string(),
                value: self.log_format().to_string(),
                reason: format!("Valid formats: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
