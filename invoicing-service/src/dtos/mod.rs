//! Request and response bodies of the HTTP surface.

pub mod auth;
pub mod client;
pub mod invoice;

use serde::Serialize;

use crate::utils::{PageRequest, PaginationMeta};

/// Body of every list endpoint. `pagination` is left out for `all=true`.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, page: Option<PageRequest>, total_items: i64) -> Self {
        Self {
            data,
            pagination: page.map(|page| PaginationMeta::new(page, total_items)),
        }
    }
}

/// `None` when the caller asked for every row.
pub(crate) fn page_request(
    page: Option<i64>,
    page_size: Option<i64>,
    all: Option<bool>,
) -> Option<PageRequest> {
    if all.unwrap_or(false) {
        None
    } else {
        Some(PageRequest::new(page, page_size))
    }
}
