//! Class label registry
//!
//! The ordered list of class names the model was trained with. Index `i` of the model's
//! score vector is class `i` of this list; the service cannot verify that contract, so the
//! list is shipped as an explicit labels file next to the model rather than re-derived from
//! a directory listing on every start.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::utils::error::{ClassifierError, Result};

/// Where the class names come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// A text file with one label per line, in model output order
    File(PathBuf),
    /// A dataset directory whose sorted sub-directory names are the labels
    DatasetDir(PathBuf),
}

impl LabelSource {
    pub fn path(&self) -> &Path {
        match self {
            LabelSource::File(path) | LabelSource::DatasetDir(path) => path,
        }
    }
}

/// Immutable, validated sequence of class names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRegistry {
    names: Vec<String>,
}

impl ClassRegistry {
    /// Create a registry, rejecting empty lists, blank labels and duplicates
    ///
    /// Labels must also survive a trip through the labels-file format: no surrounding
    /// whitespace, no leading `#`, no line breaks.
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(ClassifierError::Labels("no class labels found".to_string()));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ClassifierError::Labels(format!(
                    "label at index {} is blank",
                    idx
                )));
            }
            if name.trim() != name {
                return Err(ClassifierError::Labels(format!(
                    "label {:?} at index {} has surrounding whitespace",
                    name, idx
                )));
            }
            if name.starts_with('#') {
                return Err(ClassifierError::Labels(format!(
                    "label {:?} at index {} starts with '#' and would read back as a comment",
                    name, idx
                )));
            }
            if name.contains(|c| c == '\n' || c == '\r') {
                return Err(ClassifierError::Labels(format!(
                    "label {:?} at index {} contains a line break",
                    name, idx
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ClassifierError::Labels(format!(
                    "duplicate label '{}' at index {}",
                    name, idx
                )));
            }
        }

        Ok(Self { names })
    }

    /// Load from whichever source is configured
    pub fn load(source: &LabelSource) -> Result<Self> {
        match source {
            LabelSource::File(path) => Self::from_labels_file(path),
            LabelSource::DatasetDir(path) => Self::from_dataset_dir(path),
        }
    }

    /// Read a labels file: one label per line, `#` comments and blank lines ignored
    pub fn from_labels_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::PathNotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let names: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        let registry = Self::new(names)?;
        info!("Loaded {} class labels from {:?}", registry.len(), path);
        Ok(registry)
    }

    /// Derive labels from the sub-directories of a dataset root, sorted by name
    ///
    /// The directory structure is expected to be:
    /// ```text
    /// dataset/
    /// ├── cat/
    /// ├── dog/
    /// └── ...
    /// ```
    pub fn from_dataset_dir<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        if !root_dir.is_dir() {
            return Err(ClassifierError::PathNotFound(root_dir.to_path_buf()));
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(root_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let name = file_name.to_str().ok_or_else(|| {
                ClassifierError::Labels(format!(
                    "class directory {:?} is not valid UTF-8",
                    entry.path()
                ))
            })?;
            if !name.starts_with('.') {
                class_dirs.push(name.to_string());
            }
        }
        class_dirs.sort();

        warn!(
            "Deriving {} class labels from directory listing {:?}; \
             freeze them with `animal_classifier labels` to pin the order",
            class_dirs.len(),
            root_dir
        );

        Self::new(class_dirs)
    }

    /// Write the registry in labels-file format
    pub fn write_labels_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut contents = String::new();
        for name in &self.names {
            let _ = writeln!(contents, "{}", name);
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Label at `index`, if any
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check that a model with `num_outputs` scores lines up with this registry
    pub fn ensure_output_len(&self, num_outputs: usize) -> Result<()> {
        if num_outputs != self.names.len() {
            return Err(ClassifierError::ClassCountMismatch {
                expected: self.names.len(),
                actual: num_outputs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_rejects_empty() {
        assert!(matches!(
            ClassRegistry::new(Vec::new()),
            Err(ClassifierError::Labels(_))
        ));
    }

    #[test]
    fn test_registry_rejects_duplicates_and_blanks() {
        assert!(ClassRegistry::new(names(&["cat", "dog", "cat"])).is_err());
        assert!(ClassRegistry::new(names(&["cat", "  "])).is_err());
    }

    #[test]
    fn test_registry_rejects_labels_that_do_not_round_trip() {
        for bad in [" cat", "dog\t", "#misc", "horse\nzebra", "owl\r"] {
            let result = ClassRegistry::new(names(&["ant", bad]));
            assert!(
                matches!(result, Err(ClassifierError::Labels(_))),
                "{:?} should be rejected",
                bad
            );
        }
        // '#' is only special at the start of a line
        assert!(ClassRegistry::new(names(&["ant", "c#"])).is_ok());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ClassRegistry::new(names(&["cat", "dog", "horse"])).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(1), Some("dog"));
        assert_eq!(registry.get(3), None);
    }

    #[test]
    fn test_from_labels_file_keeps_line_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("labels.txt");
        fs::write(&path, "# trained 2024-05\nzebra\n\n  antelope \nbuffalo\n").unwrap();

        let registry = ClassRegistry::from_labels_file(&path).unwrap();
        assert_eq!(registry.names(), &names(&["zebra", "antelope", "buffalo"])[..]);
    }

    #[test]
    fn test_from_labels_file_missing() {
        let result = ClassRegistry::from_labels_file("/nonexistent/labels.txt");
        assert!(matches!(result, Err(ClassifierError::PathNotFound(_))));
    }

    #[test]
    fn test_from_dataset_dir_sorts_and_skips_files() {
        let temp_dir = TempDir::new().unwrap();
        for class in ["spider", "butterfly", "cat", ".cache"] {
            fs::create_dir(temp_dir.path().join(class)).unwrap();
        }
        fs::write(temp_dir.path().join("README.txt"), "not a class").unwrap();

        let registry = ClassRegistry::from_dataset_dir(temp_dir.path()).unwrap();
        assert_eq!(registry.names(), &names(&["butterfly", "cat", "spider"])[..]);
    }

    #[test]
    fn test_from_dataset_dir_rejects_comment_like_names() {
        let temp_dir = TempDir::new().unwrap();
        for class in ["#misc", " cat", "dog"] {
            fs::create_dir(temp_dir.path().join(class)).unwrap();
        }

        let result = ClassRegistry::from_dataset_dir(temp_dir.path());
        assert!(matches!(result, Err(ClassifierError::Labels(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_from_dataset_dir_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        for class in ["ant", "cat", "dog"] {
            fs::create_dir(temp_dir.path().join(class)).unwrap();
        }
        fs::create_dir(temp_dir.path().join(OsStr::from_bytes(b"bee\xff"))).unwrap();

        let result = ClassRegistry::from_dataset_dir(temp_dir.path());
        match result {
            Err(ClassifierError::Labels(msg)) => assert!(msg.contains("UTF-8")),
            other => panic!("expected a labels error, got {:?}", other),
        }
    }

    #[test]
    fn test_dataset_dir_survives_labels_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let dataset = temp_dir.path().join("dataset");
        for class in ["wolf", "bear", "c#", "lynx-cat"] {
            fs::create_dir_all(dataset.join(class)).unwrap();
        }
        let scanned = ClassRegistry::from_dataset_dir(&dataset).unwrap();

        let path = temp_dir.path().join("labels.txt");
        scanned.write_labels_file(&path).unwrap();
        let reloaded = ClassRegistry::from_labels_file(&path).unwrap();
        assert_eq!(reloaded, scanned);
    }

    #[test]
    fn test_write_then_read_labels_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model").join("labels.txt");
        let registry = ClassRegistry::new(names(&["dog", "cat"])).unwrap();

        registry.write_labels_file(&path).unwrap();
        let loaded = ClassRegistry::load(&LabelSource::File(path)).unwrap();
        assert_eq!(loaded, registry);
    }

    #[test]
    fn test_ensure_output_len() {
        let registry = ClassRegistry::new(names(&["cat", "dog"])).unwrap();
        assert!(registry.ensure_output_len(2).is_ok());
        assert!(matches!(
            registry.ensure_output_len(10),
            Err(ClassifierError::ClassCountMismatch {
                expected: 2,
                actual: 10
            })
        ));
    }
}
