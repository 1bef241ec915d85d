//! On-disk layout of a part database repository.
//!
//! A database repository keeps one CSV table per category under
//! `Database/db-<Category>.csv`.

mod category;
mod error;
pub mod table;

pub use category::{
    Category, category_name, find_category, find_repo_root, is_repo_root, list_categories,
};
pub use table::{Row, RowMap};
