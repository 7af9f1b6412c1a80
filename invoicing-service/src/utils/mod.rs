pub mod pagination;
pub mod password;

pub use pagination::{like_pattern, normalize_search, PageRequest, PaginationMeta};
pub use password::{hash_password, verify_password, Password};
