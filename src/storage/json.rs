use std::{
    fs::{self, rename, write},
    io::ErrorKind,
    path::PathBuf,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::to_string;
use tracing::debug;
use uuid::Uuid;

use crate::storage::{Storage, StorageError};

pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::CreateDirFailed {
            path: self.dir.clone(),
            source: e,
        })
    }
}

impl Storage for JsonFileStorage {
    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cache file unreadable");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(document) => Some(document),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cache file corrupt");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, name: &str, document: &T) -> Result<(), StorageError> {
        let json = to_string(document).map_err(|e| StorageError::SerializeFailed { source: e })?;
        self.ensure_dir()?;

        let path = self.path_for(name);
        let unique_temp = format!("{}.tmp.{}", path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        if let Err(e) = write(&temp_path, json) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::SaveFailed {
                path: temp_path,
                source: e,
            });
        }

        // Rename is the last step, so a failed save leaves the previous file intact.
        if let Err(e) = rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::SaveFailed { path, source: e });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        count: u32,
        label: String,
    }

    fn doc(count: u32) -> Doc {
        Doc {
            count,
            label: format!("doc-{}", count),
        }
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());

        assert_eq!(storage.read::<Doc>("nothing.json"), None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());

        storage.write("doc.json", &doc(1)).unwrap();
        storage.write("doc.json", &doc(2)).unwrap();

        assert_eq!(storage.read::<Doc>("doc.json"), Some(doc(2)));
    }

    #[test]
    fn test_write_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = JsonFileStorage::new(nested.clone());

        storage.write("doc.json", &doc(3)).unwrap();

        assert!(nested.join("doc.json").is_file());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());

        for i in 0..5 {
            storage.write("doc.json", &doc(i)).unwrap();
        }

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);
    }

    #[test]
    fn test_corrupt_or_mismatched_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());

        fs::write(dir.path().join("corrupt.json"), "{ this is not valid json }").unwrap();
        fs::write(dir.path().join("other.json"), r#"{"unexpected": true}"#).unwrap();

        assert_eq!(storage.read::<Doc>("corrupt.json"), None);
        assert_eq!(storage.read::<Doc>("other.json"), None);
    }

    #[test]
    fn test_failed_temp_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().to_path_buf());

        match storage.write("missing/doc.json", &doc(1)) {
            Err(StorageError::SaveFailed { path, .. }) => {
                assert!(path.to_string_lossy().contains("doc.json.tmp."));
            }
            other => panic!("Expected SaveFailed, got {:?}", other.map(|_| ())),
        }

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_write_into_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let storage = JsonFileStorage::new(blocker);

        match storage.write("doc.json", &doc(1)) {
            Err(StorageError::CreateDirFailed { .. }) => {}
            other => panic!("Expected CreateDirFailed, got {:?}", other.map(|_| ())),
        }
    }
}
