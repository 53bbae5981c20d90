use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use shared::{
    domain::WorkspaceId,
    models::{CurrencyEntry, Workspace, WorkspacePatch},
};
use store::{read_as, ObservableStore, StoreKey};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod api;
pub mod option_row;
pub mod permissions;
pub mod profile;

pub use api::ApiClient;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

pub const AVATAR_UPLOAD_FAILURE_MESSAGE: &str = "Avatar upload failed. Please try again.";
pub const WORKSPACE_UPDATE_FAILURE_MESSAGE: &str = "Workspace settings could not be saved.";

/// Image picked by the user: a local uri usable for an immediate preview plus
/// the bytes the upload backend needs.
#[derive(Debug, Clone)]
pub struct PickedImage {
    pub uri: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The editable subset of a workspace, held locally until the user saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceDraft {
    pub name: String,
    pub avatar_url: String,
    pub preview_avatar_url: String,
    pub currency: String,
}

/// The held upload settlement failed outside its own handler, i.e. the upload
/// task died before it could run the failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("avatar upload was interrupted before settling")]
pub struct UploadInterrupted;

type UploadSettlement = Shared<BoxFuture<'static, Result<(), UploadInterrupted>>>;

fn settled_upload() -> UploadSettlement {
    let ready: BoxFuture<'static, Result<(), UploadInterrupted>> =
        futures::future::ready(Ok(())).boxed();
    ready.shared()
}

#[async_trait]
pub trait AvatarUploader: Send + Sync {
    async fn upload_avatar(&self, image: PickedImage) -> Result<String>;
}

pub struct MissingAvatarUploader;

#[async_trait]
impl AvatarUploader for MissingAvatarUploader {
    async fn upload_avatar(&self, _image: PickedImage) -> Result<String> {
        Err(anyhow!("avatar upload backend is unavailable"))
    }
}

#[async_trait]
pub trait WorkspaceGateway: Send + Sync {
    async fn update_workspace(
        &self,
        workspace_id: WorkspaceId,
        patch: WorkspacePatch,
    ) -> Result<()>;
}

pub struct MissingWorkspaceGateway;

#[async_trait]
impl WorkspaceGateway for MissingWorkspaceGateway {
    async fn update_workspace(
        &self,
        workspace_id: WorkspaceId,
        _patch: WorkspacePatch,
    ) -> Result<()> {
        Err(anyhow!(
            "workspace update backend is unavailable for workspace {}",
            workspace_id.0
        ))
    }
}

#[async_trait]
pub trait CurrencySource: Send + Sync {
    /// Fetches the currency list and places it in the device store.
    async fn refresh_currency_list(&self) -> Result<()>;
}

pub struct MissingCurrencySource;

#[async_trait]
impl CurrencySource for MissingCurrencySource {
    async fn refresh_currency_list(&self) -> Result<()> {
        Err(anyhow!("currency list backend is unavailable"))
    }
}

/// Short-lived user-facing messages, the toast channel of the app shell.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
}

pub struct BroadcastNotifier {
    notices: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { notices }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn error(&self, message: &str) {
        let _ = self.notices.send(Notice {
            message: message.to_string(),
        });
    }
}

/// What the settings screen should do before any form state exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorGate {
    /// The user is not enrolled in the workspaces capability; leave the screen.
    NavigateBack,
    /// The workspace has not arrived from the sync layer yet; render nothing.
    Hidden,
    Ready,
}

pub fn editor_gate(betas: &[String], workspace: Option<&Workspace>) -> EditorGate {
    if !permissions::can_use_workspaces(betas) {
        return EditorGate::NavigateBack;
    }
    match workspace {
        None => EditorGate::Hidden,
        Some(_) => EditorGate::Ready,
    }
}

/// One row of the currency picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyItem {
    pub value: String,
    pub label: String,
}

/// Controller for the workspace settings form. Owns the local draft, tracks
/// the most recent avatar upload, and dispatches the update request only once
/// that upload has settled.
pub struct WorkspaceEditor {
    store: Arc<dyn ObservableStore>,
    uploader: Arc<dyn AvatarUploader>,
    workspaces: Arc<dyn WorkspaceGateway>,
    notifier: Arc<dyn Notifier>,
    workspace_id: WorkspaceId,
    draft: Mutex<WorkspaceDraft>,
    upload_settlement: Mutex<UploadSettlement>,
}

impl WorkspaceEditor {
    pub async fn mount(
        store: Arc<dyn ObservableStore>,
        uploader: Arc<dyn AvatarUploader>,
        workspaces: Arc<dyn WorkspaceGateway>,
        currencies: Arc<dyn CurrencySource>,
        notifier: Arc<dyn Notifier>,
        workspace_id: WorkspaceId,
    ) -> Result<Arc<Self>> {
        let workspace: Workspace = read_as(store.as_ref(), &StoreKey::Workspace(workspace_id))
            .await
            .with_context(|| format!("workspace {} is not loaded", workspace_id.0))?;

        let editor = Arc::new(Self {
            store,
            uploader,
            workspaces,
            notifier,
            workspace_id,
            draft: Mutex::new(WorkspaceDraft {
                name: workspace.name,
                avatar_url: workspace.avatar_url.clone(),
                preview_avatar_url: workspace.avatar_url,
                currency: workspace.output_currency,
            }),
            upload_settlement: Mutex::new(settled_upload()),
        });
        info!("settings: editor mounted workspace={}", workspace_id.0);

        // The picker needs the currency list exactly once per mount; a failed
        // refresh leaves the previously stored list in place.
        tokio::spawn(async move {
            if let Err(err) = currencies.refresh_currency_list().await {
                warn!("settings: currency list refresh failed err={err:#}");
            }
        });

        Ok(editor)
    }

    pub async fn draft(&self) -> WorkspaceDraft {
        self.draft.lock().await.clone()
    }

    pub async fn set_name(&self, name: impl Into<String>) {
        self.draft.lock().await.name = name.into();
    }

    pub async fn set_currency(&self, currency: impl Into<String>) {
        self.draft.lock().await.currency = currency.into();
    }

    pub async fn name_is_valid(&self) -> bool {
        !self.draft.lock().await.name.trim().is_empty()
    }

    async fn workspace(&self) -> Option<Workspace> {
        read_as(self.store.as_ref(), &StoreKey::Workspace(self.workspace_id)).await
    }

    async fn merge_workspace_flags(&self, patch: serde_json::Value) {
        self.store
            .merge(StoreKey::Workspace(self.workspace_id), patch)
            .await;
    }

    /// Starts uploading a freshly picked avatar. The preview switches to the
    /// local uri immediately, before the upload settles; the committed
    /// `avatar_url` only changes on upload success.
    pub async fn on_image_selected(self: &Arc<Self>, image: PickedImage) {
        self.merge_workspace_flags(json!({"is_avatar_uploading": true}))
            .await;
        self.draft.lock().await.preview_avatar_url = image.uri.clone();

        let editor = Arc::clone(self);
        let task = tokio::spawn(async move {
            match editor.uploader.upload_avatar(image).await {
                Ok(url) => {
                    editor.draft.lock().await.avatar_url = url;
                }
                Err(err) => {
                    warn!(
                        "settings: avatar upload failed workspace={} err={err:#}",
                        editor.workspace_id.0
                    );
                    editor.notifier.error(AVATAR_UPLOAD_FAILURE_MESSAGE);
                }
            }
            editor
                .merge_workspace_flags(json!({"is_avatar_uploading": false}))
                .await;
        });

        // The newest upload supersedes the held settlement; the previous
        // request keeps running but its result is no longer trusted.
        let settlement: UploadSettlement = async move { task.await.map_err(|_| UploadInterrupted) }
            .boxed()
            .shared();
        *self.upload_settlement.lock().await = settlement;
    }

    /// Clears both the committed and the preview avatar. An upload that is
    /// still in flight is not cancelled; if it later succeeds it overwrites
    /// `avatar_url` again (last write wins).
    pub async fn on_image_removed(&self) {
        let mut draft = self.draft.lock().await;
        draft.avatar_url.clear();
        draft.preview_avatar_url.clear();
    }

    /// Dispatches the settings mutation. The update request never goes out
    /// while the most recently started avatar upload is still unsettled.
    pub async fn submit(&self) {
        self.merge_workspace_flags(json!({"is_updating": true}))
            .await;

        let settlement = self.upload_settlement.lock().await.clone();
        if settlement.await.is_err() {
            // The upload task never settled; its own failure handling did not
            // run, so only the busy flag needs rolling back here.
            self.merge_workspace_flags(json!({"is_updating": false}))
                .await;
            return;
        }

        // Late-binding read: fields edited while the upload was settling are
        // picked up here, not snapshotted at press time.
        let patch = {
            let draft = self.draft.lock().await;
            WorkspacePatch {
                name: draft.name.trim().to_string(),
                avatar_url: draft.avatar_url.clone(),
                output_currency: draft.currency.clone(),
            }
        };

        if let Err(err) = self
            .workspaces
            .update_workspace(self.workspace_id, patch)
            .await
        {
            warn!(
                "settings: workspace update failed workspace={} err={err:#}",
                self.workspace_id.0
            );
            self.notifier.error(WORKSPACE_UPDATE_FAILURE_MESSAGE);
            self.merge_workspace_flags(json!({"is_updating": false}))
                .await;
        }
    }

    /// The save control is armed only when no avatar upload is in flight and
    /// the draft name or avatar differs from the stored workspace. A
    /// currency-only delta never arms it.
    pub async fn can_submit(&self) -> bool {
        let Some(workspace) = self.workspace().await else {
            return false;
        };
        if workspace.is_avatar_uploading {
            return false;
        }
        let draft = self.draft.lock().await;
        draft.avatar_url != workspace.avatar_url || draft.name != workspace.name
    }

    /// Projects the stored currency list into picker rows, keeping the order
    /// the provider returned.
    pub async fn currency_items(&self) -> Vec<CurrencyItem> {
        let entries: Vec<CurrencyEntry> = read_as(self.store.as_ref(), &StoreKey::CurrencyList)
            .await
            .unwrap_or_default();
        entries
            .into_iter()
            .map(|entry| CurrencyItem {
                label: format!("{} - {}", entry.code, entry.symbol),
                value: entry.code,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
