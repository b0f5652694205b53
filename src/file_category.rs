/// Extension-based categorization for sorting files into subfolders.
///
/// The user configuration lists, for each category, the extensions that belong
/// to it. [`CategoryMap`] inverts that into a single-valued lookup from an
/// extension (including its leading dot) to the category name.
///
/// # Examples
///
/// ```
/// use organizer::file_category::CategoryMap;
///
/// let map = CategoryMap::build([
///     ("pdf".to_string(), vec![".pdf".to_string()]),
///     ("images".to_string(), vec![".png".to_string(), ".jpg".to_string()]),
/// ]);
/// assert_eq!(map.resolve(".png"), "images");
/// assert_eq!(map.resolve(".txt"), "");
/// ```
use std::collections::HashMap;
use std::path::Path;

/// Maps file extensions to category names.
///
/// An unmapped extension resolves to the empty string, which means the file
/// stays where it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    extension_map: HashMap<String, String>,
}

impl CategoryMap {
    /// Builds the lookup by inverting `category -> extensions`.
    ///
    /// Entries are applied in iteration order, so when the same extension is
    /// listed under two categories the one seen last wins.
    pub fn build<I, E>(category_to_extensions: I) -> Self
    where
        I: IntoIterator<Item = (String, E)>,
        E: IntoIterator<Item = String>,
    {
        let mut extension_map = HashMap::new();
        for (category, extensions) in category_to_extensions {
            for extension in extensions {
                extension_map.insert(extension, category.clone());
            }
        }
        Self { extension_map }
    }

    /// Returns the category for `extension`, or `""` if it is not mapped.
    pub fn resolve(&self, extension: &str) -> &str {
        self.extension_map
            .get(extension)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Returns the category for the extension of `path`.
    pub fn category_for(&self, path: &Path) -> &str {
        self.resolve(&extension_of(path))
    }

    /// Number of mapped extensions.
    pub fn len(&self) -> usize {
        self.extension_map.len()
    }

    /// True when nothing is mapped, i.e. no file will ever be moved.
    pub fn is_empty(&self) -> bool {
        self.extension_map.is_empty()
    }

    /// Number of distinct categories that at least one extension maps to.
    pub fn category_count(&self) -> usize {
        let mut categories: Vec<&str> = self.extension_map.values().map(String::as_str).collect();
        categories.sort_unstable();
        categories.dedup();
        categories.len()
    }
}

/// Returns the extension of `path` with its leading dot, or an empty string.
///
/// Follows [`Path::extension`]: only the last suffix counts (`a.tar.gz` gives
/// `.gz`) and dotfiles such as `.bashrc` have no extension.
///
/// ```
/// use organizer::file_category::extension_of;
/// use std::path::Path;
///
/// assert_eq!(extension_of(Path::new("/tmp/report.pdf")), ".pdf");
/// assert_eq!(extension_of(Path::new("README")), "");
/// ```
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}
