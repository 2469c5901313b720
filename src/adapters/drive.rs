use crate::domain::model::DocumentKind;
use crate::domain::ports::DocumentStore;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Drive v3 store. Every document lives as a single JSON file inside the app folder.
pub struct GoogleDriveStore {
    client: Client,
    api_base: String,
    access_token: String,
    folder_name: String,
    folder_id: Mutex<Option<String>>,
}

impl GoogleDriveStore {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
        folder_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            folder_name: folder_name.into(),
            folder_id: Mutex::new(None),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn upload_url(&self, file_id: &str) -> String {
        format!("{}/upload/drive/v3/files/{}", self.api_base, file_id)
    }

    async fn check(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Drive {} failed with {}: {}", action, status, body);
        Err(AppError::storage(format!("Drive {} returned {}", action, status)))
    }

    async fn list(&self, query: &str) -> Result<Vec<DriveFile>> {
        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive list request failed: {}", e)))?;

        let list: FileList = Self::check(response, "list")
            .await?
            .json()
            .await
            .map_err(|e| AppError::storage(format!("Drive list response unreadable: {}", e)))?;
        Ok(list.files)
    }

    async fn find_folder(&self) -> Result<Option<String>> {
        let query = folder_query(&self.folder_name);
        Ok(self.list(&query).await?.into_iter().next().map(|f| f.id))
    }

    /// Looks up the app folder, creating it on first use.
    pub async fn get_or_create_folder(&self) -> Result<String> {
        let mut cached = self.folder_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let id = match self.find_folder().await? {
            Some(id) => {
                tracing::info!("Found existing app folder: {}", id);
                id
            }
            None => {
                let id = self
                    .create_file(json!({
                        "name": self.folder_name,
                        "mimeType": FOLDER_MIME_TYPE,
                    }))
                    .await?;
                tracing::info!("Created new app folder: {}", id);
                id
            }
        };

        *cached = Some(id.clone());
        Ok(id)
    }

    async fn create_file(&self, metadata: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive create request failed: {}", e)))?;

        let file: DriveFile = Self::check(response, "create")
            .await?
            .json()
            .await
            .map_err(|e| AppError::storage(format!("Drive create response unreadable: {}", e)))?;
        Ok(file.id)
    }

    async fn find_document(&self, folder_id: &str, kind: DocumentKind) -> Result<Option<String>> {
        let query = file_query(kind.file_name(), folder_id);
        Ok(self.list(&query).await?.into_iter().next().map(|f| f.id))
    }

    async fn upload(&self, file_id: &str, data: &[u8]) -> Result<()> {
        let response = self
            .client
            .patch(self.upload_url(file_id))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive upload request failed: {}", e)))?;
        Self::check(response, "upload").await?;
        Ok(())
    }
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folder_query(folder_name: &str) -> String {
    format!(
        "name='{}' and mimeType='{}' and trashed=false",
        escape_query_value(folder_name),
        FOLDER_MIME_TYPE
    )
}

pub fn file_query(file_name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_value(file_name),
        escape_query_value(folder_id)
    )
}

#[async_trait]
impl DocumentStore for GoogleDriveStore {
    async fn read_document(&self, kind: DocumentKind) -> Result<Option<Vec<u8>>> {
        let folder_id = self.get_or_create_folder().await?;
        let Some(file_id) = self.find_document(&folder_id, kind).await? else {
            tracing::info!("No {} in Drive yet", kind.file_name());
            return Ok(None);
        };

        let response = self
            .client
            .get(format!("{}/{}", self.files_url(), file_id))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive download request failed: {}", e)))?;

        let bytes = Self::check(response, "download")
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::storage(format!("Drive download interrupted: {}", e)))?;
        tracing::debug!("Loaded {} ({} bytes)", kind.file_name(), bytes.len());
        Ok(Some(bytes.to_vec()))
    }

    async fn write_document(&self, kind: DocumentKind, data: &[u8]) -> Result<()> {
        let folder_id = self.get_or_create_folder().await?;

        let file_id = match self.find_document(&folder_id, kind).await? {
            Some(id) => id,
            None => {
                let id = self
                    .create_file(json!({
                        "name": kind.file_name(),
                        "parents": [folder_id],
                        "mimeType": "application/json",
                    }))
                    .await?;
                tracing::info!("Created {} in Drive: {}", kind.file_name(), id);
                id
            }
        };

        self.upload(&file_id, data).await?;
        tracing::info!("Saved {} to Drive ({} bytes)", kind.file_name(), data.len());
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut cached = self.folder_id.lock().await;
        let folder_id = match cached.take() {
            Some(id) => Some(id),
            None => self.find_folder().await?,
        };

        let Some(folder_id) = folder_id else {
            tracing::info!("No app folder to delete");
            return Ok(());
        };

        let response = self
            .client
            .patch(format!("{}/{}", self.files_url(), folder_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "trashed": true }))
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive trash request failed: {}", e)))?;
        Self::check(response, "trash").await?;

        tracing::info!("Moved app folder {} to trash", folder_id);
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[("pageSize", "1"), ("fields", "files(id, name)")])
            .send()
            .await
            .map_err(|e| AppError::storage(format!("Drive probe failed: {}", e)))?;
        Self::check(response, "probe").await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "google-drive"
    }
}
