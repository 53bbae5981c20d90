use serde::{Deserialize, Serialize};

use crate::domain::WorkspaceId;

/// A workspace record as the sync layer delivers it. The editor never writes
/// these fields directly; it merges patches through the device store and asks
/// the gateway for remote mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub output_currency: String,
    #[serde(default)]
    pub is_avatar_uploading: bool,
    #[serde(default)]
    pub is_updating: bool,
}

/// Field patch sent to the workspace update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePatch {
    pub name: String,
    pub avatar_url: String,
    pub output_currency: String,
}

/// One currency the picker can offer. The list is kept as a sequence, not a
/// keyed map, so the order the provider returned survives a store round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    pub code: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub pronouns: String,
    #[serde(default)]
    pub timezone: Option<Timezone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timezone {
    pub name: String,
    #[serde(default)]
    pub automatic: bool,
}
