//! Request / response types for `/admin/library/...`.

use hearth_core::services::CacheInfo;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LibraryResponse {
    /// Library model names not yet in the catalog.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheInfoResponse {
    pub size: usize,
    pub last_updated: Option<String>,
    pub ttl_secs: u64,
    pub expired: bool,
}

impl From<CacheInfo> for CacheInfoResponse {
    fn from(info: CacheInfo) -> Self {
        Self {
            size: info.size,
            last_updated: info.last_updated.map(|v| v.to_rfc3339()),
            ttl_secs: info.ttl_secs,
            expired: info.expired,
        }
    }
}
