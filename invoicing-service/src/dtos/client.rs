use serde::Deserialize;
use validator::Validate;

use super::page_request;
use crate::models::ListClientsFilter;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,

    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListClientsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub all: Option<bool>,
}

impl From<ListClientsQuery> for ListClientsFilter {
    fn from(query: ListClientsQuery) -> Self {
        Self {
            page: page_request(query.page, query.page_size, query.all),
            search: query.search,
        }
    }
}
