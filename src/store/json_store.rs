use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;

use crate::store::StoreError;
use crate::store::kv::DurableStore;

/// One JSON document per key under a data directory.
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mindvault");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{name}.json"))
    }

    fn io_error(key: &str, source: io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl DurableStore for JsonStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| Self::io_error(key, e))
    }

    /// Write via a temp file and rename so a crash never leaves a torn document.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.file_path(key);
        let tmp_path = path.with_extension("tmp");

        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Self::io_error(key, e)
        })
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.file_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;
    use tempfile::TempDir;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_round_trip_through_files() {
        let (dir, mut store) = make_test_store();
        store.set_item("MindVault", "[]").unwrap();
        assert_eq!(store.get_item("MindVault").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("MindVault.json").exists());

        store.remove_item("MindVault").unwrap();
        assert_eq!(store.get_item("MindVault").unwrap(), None);
        // removing twice is fine
        store.remove_item("MindVault").unwrap();
    }

    #[test]
    fn test_scoped_keys_map_to_safe_file_names() {
        let (dir, mut store) = make_test_store();
        store.set_item("quizResults-chapter-2", "[]").unwrap();
        store.set_item("odd/key name", "1").unwrap();
        assert!(dir.path().join("quizResults-chapter-2.json").exists());
        assert!(dir.path().join("odd_key_name.json").exists());
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let (dir, mut store) = make_test_store();
        store.set_item("a", "1").unwrap();
        store.set_item("a", "2").unwrap();
        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }

    #[test]
    fn test_write_into_missing_dir_fails_and_stays_in_memory() {
        let dir = TempDir::new().unwrap();
        let bad_dir = dir.path().join("nonexistent_subdir");
        let store = KvStore::new(JsonStore {
            base_dir: bad_dir.clone(),
        });
        store.set("selectedAnswer-chapter-1", &Some(2));
        assert_eq!(store.pending_writes(), 1);
        assert_eq!(store.get::<Option<u32>>("selectedAnswer-chapter-1", None), Some(2));
        assert!(!bad_dir.exists());
    }

    #[test]
    fn test_values_survive_a_new_handle() {
        let dir = TempDir::new().unwrap();
        let first = KvStore::new(JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap());
        first.set("answeredQuestions-chapter-1", &vec!["q001", "q004"]);
        drop(first);

        let second = KvStore::new(JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap());
        let answered: Vec<String> = second.get("answeredQuestions-chapter-1", Vec::new());
        assert_eq!(answered, vec!["q001", "q004"]);
    }
}
