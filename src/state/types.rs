use dashforge_common::{AssetState, Protocol};
use serde::Serialize;

/// An asset registered with the cache index, as accepted by `addAvailable`.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub name: String,
    pub protocol: Protocol,
    pub path: String,
    pub is_live: bool,
}

/// One row of `GET /files`: an asset record plus its derived generation
/// state.
#[derive(Debug, Clone, Serialize)]
pub struct AssetListing {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Proto")]
    pub protocol: Protocol,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "IsLive")]
    pub is_live: bool,
    #[serde(rename = "Generated")]
    pub generated: bool,
    #[serde(rename = "State")]
    pub state: AssetState,
}
