//! File name to path index over the workbook folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Workbooks under a base folder, keyed by file name.
///
/// Formulas name linked workbooks by file name only, and the cleaner drops
/// spaces outside quoted segments, so lookups fall back to a key with
/// whitespace removed and case folded.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    by_name: HashMap<String, PathBuf>,
    by_key: HashMap<String, PathBuf>,
}

pub(crate) fn lookup_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_workbook(path: &Path) -> bool {
    let is_lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)));
    has_extension && !is_lock_file
}

impl FileIndex {
    /// Walk `base` recursively. The first path seen for a name wins.
    pub fn build(base: &Path) -> Result<FileIndex> {
        let mut index = FileIndex::default();
        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_workbook(entry.path()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            index.insert(name, entry.into_path());
        }
        tracing::info!(base = %base.display(), files = index.len(), "indexed workbooks");
        Ok(index)
    }

    pub fn insert(&mut self, name: String, path: PathBuf) {
        if let Some(existing) = self.by_name.get(&name) {
            tracing::debug!(%name, kept = %existing.display(), skipped = %path.display(), "duplicate workbook name");
            return;
        }
        self.by_key.entry(lookup_key(&name)).or_insert_with(|| path.clone());
        self.by_name.insert(name, path);
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.by_name
            .get(name)
            .or_else(|| self.by_key.get(&lookup_key(name)))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_indexes_nested_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("PROJECT").join("sub");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("top.xlsx"), b"").unwrap();
        fs::write(nested.join("Deep Book.XLSM"), b"").unwrap();
        fs::write(nested.join("notes.txt"), b"").unwrap();
        fs::write(nested.join("~$top.xlsx"), b"").unwrap();

        let index = FileIndex::build(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("top.xlsx"), Some(dir.path().join("top.xlsx").as_path()));
        assert!(index.get("Deep Book.XLSM").is_some());
        assert!(index.get("notes.txt").is_none());
    }

    #[test]
    fn test_lookup_ignores_spaces_and_case() {
        let mut index = FileIndex::default();
        index.insert(
            "calculatie cat 2022 .xlsx".to_string(),
            PathBuf::from("/base/calculatie cat 2022 .xlsx"),
        );
        assert!(index.get("calculatiecat2022.xlsx").is_some());
        assert!(index.get("Calculatie Cat 2022.xlsx").is_some());
        assert!(index.get("calculatie cat 2023.xlsx").is_none());
    }

    #[test]
    fn test_first_path_wins() {
        let mut index = FileIndex::default();
        index.insert("a.xlsx".to_string(), PathBuf::from("/one/a.xlsx"));
        index.insert("a.xlsx".to_string(), PathBuf::from("/two/a.xlsx"));
        assert_eq!(index.get("a.xlsx"), Some(Path::new("/one/a.xlsx")));
    }
}
