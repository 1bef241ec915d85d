//! Category discovery.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{LibraryError, Result};

const DATABASE_DIR: &str = "Database";
const CATEGORY_PREFIX: &str = "db-";
const CATEGORY_SUFFIX: &str = ".csv";

/// One category table, e.g. `Database/db-Resistors.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Display name (`Resistors`).
    pub name: String,
    /// File name (`db-Resistors.csv`).
    pub file_name: String,
    /// Absolute path to the CSV file.
    pub csv_path: PathBuf,
}

impl Category {
    /// Path relative to the repository root, with forward slashes as git expects.
    pub fn repo_relative_path(&self) -> String {
        format!("{DATABASE_DIR}/{}", self.file_name)
    }
}

/// Returns true if `path` looks like the root of a part database repository.
///
/// Accepts a `Database/` directory containing `categories.yml`, any
/// `*.kicad_dbl` definition, or at least one category table.
pub fn is_repo_root(path: &Path) -> bool {
    let db_dir = path.join(DATABASE_DIR);
    if !db_dir.is_dir() {
        return false;
    }
    if db_dir.join("categories.yml").is_file() {
        return true;
    }
    let Ok(entries) = fs::read_dir(&db_dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        name.ends_with(".kicad_dbl") || category_name(&name).is_some()
    })
}

/// Walk up from `start` and return the first database repository root.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let start = if start.is_file() {
        start.parent().unwrap_or(start)
    } else {
        start
    };
    start
        .ancestors()
        .find(|dir| is_repo_root(dir))
        .map(Path::to_path_buf)
        .ok_or_else(|| LibraryError::RepoNotFound(start.to_path_buf()).into())
}

/// List all categories of a repository, sorted by file name.
pub fn list_categories(repo_root: &Path) -> Result<Vec<Category>> {
    let db_dir = repo_root.join(DATABASE_DIR);
    let mut categories: Vec<Category> = fs::read_dir(&db_dir)?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = category_name(&file_name)?.to_string();
            Some(Category {
                name,
                csv_path: entry.path(),
                file_name,
            })
        })
        .collect();
    categories.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(categories)
}

/// Look up a category by display name.
pub fn find_category(repo_root: &Path, name: &str) -> Result<Category> {
    list_categories(repo_root)?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| LibraryError::UnknownCategory(name.to_string()).into())
}

/// Category name of a table file name, e.g. `Resistors` for `db-Resistors.csv`.
pub fn category_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(CATEGORY_PREFIX)?
        .strip_suffix(CATEGORY_SUFFIX)
        .filter(|name| !name.is_empty())
}
