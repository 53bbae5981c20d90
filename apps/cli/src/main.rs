use std::sync::Arc;

use anyhow::Result;
use app_core::{editor_gate, ApiClient, BroadcastNotifier, EditorGate, WorkspaceEditor};
use clap::Parser;
use serde_json::json;
use shared::{domain::WorkspaceId, models::Workspace};
use store::{read_as, DeviceStore, ObservableStore, StoreKey};
use tokio_stream::StreamExt as _;

/// Drives the workspace settings flow against a live backend: seeds a local
/// device store, mounts the editor, applies edits and saves them.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: String,
    #[arg(long)]
    workspace_id: i64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long, default_value = "sqlite::memory:")]
    store_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let store = Arc::new(DeviceStore::new(&args.store_url).await?);
    let mut changes = store.change_stream();
    tokio::spawn(async move {
        while let Some(Ok(change)) = changes.next().await {
            tracing::debug!("store: {} changed", change.key);
        }
    });

    let workspace_id = WorkspaceId(args.workspace_id);
    let workspace_key = StoreKey::Workspace(workspace_id);

    // The sync layer normally populates these; seed enough for a round trip.
    if store.get(&StoreKey::Betas).await.is_none() {
        store.set(StoreKey::Betas, json!(["workspaces"])).await;
    }
    if store.get(&workspace_key).await.is_none() {
        store
            .set(
                workspace_key,
                json!({
                    "id": args.workspace_id,
                    "name": "My Workspace",
                    "avatar_url": "",
                    "output_currency": "USD",
                }),
            )
            .await;
    }

    let betas: Vec<String> = read_as(store.as_ref(), &StoreKey::Betas)
        .await
        .unwrap_or_default();
    let workspace: Option<Workspace> = read_as(store.as_ref(), &workspace_key).await;
    match editor_gate(&betas, workspace.as_ref()) {
        EditorGate::NavigateBack => {
            println!("Workspaces capability is not enabled for this account.");
            return Ok(());
        }
        EditorGate::Hidden => {
            println!("Workspace {} has not synced yet.", args.workspace_id);
            return Ok(());
        }
        EditorGate::Ready => {}
    }

    let api = Arc::new(ApiClient::new(&args.server_url, store.clone())?);
    let notifier = Arc::new(BroadcastNotifier::new());
    let mut notices = notifier.subscribe();

    let editor = WorkspaceEditor::mount(
        store.clone(),
        api.clone(),
        api.clone(),
        api.clone(),
        notifier.clone(),
        workspace_id,
    )
    .await?;

    if let Some(name) = &args.name {
        editor.set_name(name.clone()).await;
    }
    if let Some(currency) = &args.currency {
        editor.set_currency(currency.clone()).await;
    }

    // The currency refresh kicked off at mount runs in the background; give
    // it a moment before rendering the picker.
    let mut items = editor.currency_items().await;
    for _ in 0..50 {
        if !items.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        items = editor.currency_items().await;
    }
    println!("Currency options ({}):", items.len());
    for item in items.iter().take(10) {
        println!("  {}", item.label);
    }

    println!("Draft: {:?}", editor.draft().await);
    println!("Save enabled: {}", editor.can_submit().await);

    editor.submit().await;

    while let Ok(notice) = notices.try_recv() {
        println!("notice: {}", notice.message);
    }

    let saved: Option<Workspace> = read_as(store.as_ref(), &workspace_key).await;
    if let Some(saved) = saved {
        println!("Workspace after save: {}", serde_json::to_string(&saved)?);
    }

    Ok(())
}
