//! HTTP-backed implementations of the settings-screen collaborators.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    domain::WorkspaceId,
    error::{ApiError, ApiException},
    models::{CurrencyEntry, WorkspacePatch},
};
use store::{ObservableStore, StoreKey};
use tracing::info;
use url::Url;

use crate::{AvatarUploader, CurrencySource, PickedImage, WorkspaceGateway};

pub struct ApiClient {
    http: Client,
    base_url: Url,
    store: Arc<dyn ObservableStore>,
}

impl ApiClient {
    pub fn new(server_url: &str, store: Arc<dyn ObservableStore>) -> Result<Self> {
        let base_url = Url::parse(server_url)
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            store,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path '{path}'"))
    }

    async fn decode_failure(response: reqwest::Response) -> anyhow::Error {
        let status = response.status();
        match response.json::<ApiError>().await {
            Ok(body) => ApiException::new(body.code, body.message).into(),
            Err(_) => anyhow!("request failed with status {status}"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadAvatarRequest {
    filename: String,
    content_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadAvatarResponse {
    url: String,
}

#[async_trait]
impl AvatarUploader for ApiClient {
    async fn upload_avatar(&self, image: PickedImage) -> Result<String> {
        let endpoint = self.endpoint("avatars")?;
        let response = self
            .http
            .post(endpoint)
            .json(&UploadAvatarRequest {
                filename: image.filename,
                content_b64: STANDARD.encode(&image.bytes),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::decode_failure(response).await);
        }
        let body: UploadAvatarResponse = response.json().await?;
        Ok(body.url)
    }
}

#[async_trait]
impl WorkspaceGateway for ApiClient {
    async fn update_workspace(
        &self,
        workspace_id: WorkspaceId,
        patch: WorkspacePatch,
    ) -> Result<()> {
        let endpoint = self.endpoint(&format!("workspaces/{}", workspace_id.0))?;
        let response = self.http.post(endpoint).json(&patch).send().await?;
        if !response.status().is_success() {
            return Err(Self::decode_failure(response).await);
        }

        // Sibling screens read the committed values from the store; carrying
        // the confirmed fields here saves them a refetch.
        self.store
            .merge(
                StoreKey::Workspace(workspace_id),
                json!({
                    "name": patch.name,
                    "avatar_url": patch.avatar_url,
                    "output_currency": patch.output_currency,
                    "is_updating": false,
                }),
            )
            .await;
        info!("api: workspace update committed workspace={}", workspace_id.0);
        Ok(())
    }
}

#[async_trait]
impl CurrencySource for ApiClient {
    async fn refresh_currency_list(&self) -> Result<()> {
        let endpoint = self.endpoint("currencies")?;
        let response = self.http.get(endpoint).send().await?;
        if !response.status().is_success() {
            return Err(Self::decode_failure(response).await);
        }
        let entries: Vec<CurrencyEntry> = response.json().await?;
        info!("api: currency list refreshed entries={}", entries.len());
        self.store
            .set(StoreKey::CurrencyList, serde_json::to_value(entries)?)
            .await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
