pub mod links;
pub mod page;
pub mod patterns;
pub mod spec_fields;

pub use page::{parse_detail_page, Strictness};
