//! Logical identity of a stored file

use crate::index::{Category, ContentScope, Selection};

/// Separator between store directory segments
pub const PATH_SEPARATOR: char = '/';

/// Two requests with equal identities target the same logical file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageIdentity {
    pub display_name: String,
    pub relative_path: String,
    pub category: Category,
    pub volume: String,
}

impl StorageIdentity {
    pub fn scope(&self) -> ContentScope {
        ContentScope::new(self.volume.clone(), self.category)
    }

    /// Exact-match predicate shared by lookup and eviction
    pub fn selection(&self) -> Selection {
        Selection {
            display_name: self.display_name.clone(),
            relative_path: self.relative_path.clone(),
        }
    }
}

/// `base_directory` alone when `app_folder` is blank, otherwise both joined
pub fn relative_path(base_directory: &str, app_folder: &str) -> String {
    if app_folder.trim().is_empty() {
        base_directory.to_string()
    } else {
        format!("{}{}{}", base_directory, PATH_SEPARATOR, app_folder)
    }
}
