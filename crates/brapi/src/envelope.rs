//! Response envelope shared by every BrAPI v2 endpoint:
//! `{"metadata": {...}, "result": {...}}`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub metadata: Metadata,
    pub result: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u32,
}

/// List responses wrap their records in `result.data`.
#[derive(Debug, Deserialize)]
pub struct DataResult<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Body of a `202 Accepted` search response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAccepted {
    pub search_results_db_id: String,
}

impl<T> Envelope<DataResult<T>> {
    /// Whether pages after `page` (0-based) remain.
    pub fn has_more(&self, page: u32) -> bool {
        self.metadata
            .pagination
            .is_some_and(|p| page + 1 < p.total_pages)
    }
}
