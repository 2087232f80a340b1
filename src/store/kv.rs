use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::StoreError;

/// Synchronous string-keyed storage medium.
pub trait DurableStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store. A byte quota or a disabled flag can be set to exercise
/// the write-failure path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryStore {
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl DurableStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable);
        }
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable);
        }
        if let Some(quota) = self.quota
            && self.used_bytes_without(key) + key.len() + value.len() > quota
        {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
            });
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        if self.disabled {
            return Err(StoreError::Unavailable);
        }
        self.items.remove(key);
        Ok(())
    }
}

struct Inner {
    backend: Box<dyn DurableStore>,
    // Writes the backend refused. `None` marks a removal.
    overlay: HashMap<String, Option<String>>,
    listeners: Vec<mpsc::Sender<String>>,
}

/// Typed JSON view over a [`DurableStore`], shared by every consumer in the process.
///
/// Reads never fail: absent or unparsable values yield the caller's default.
/// Failed writes are logged and kept in memory so the current run stays
/// consistent until restart. Concurrent writers elsewhere are last-writer-wins.
#[derive(Clone)]
pub struct KvStore {
    inner: Rc<RefCell<Inner>>,
}

impl KvStore {
    pub fn new(backend: impl DurableStore + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                backend: Box::new(backend),
                overlay: HashMap::new(),
                listeners: Vec::new(),
            })),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        let inner = self.inner.borrow();
        if let Some(pending) = inner.overlay.get(key) {
            return pending.clone();
        }
        match inner.backend.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("read of {key} failed: {e}");
                None
            }
        }
    }

    /// Stored value for `key`, or `default` when absent or malformed.
    /// The default is not written back.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.get_raw(key) else {
            return default;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("ignoring malformed value at {key}: {e}");
                default
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                log::error!("failed to serialize {key}: {e}");
                return;
            }
        };
        self.write(key, Some(json));
    }

    /// Read-modify-write through [`get`](Self::get). Returns the stored value.
    pub fn update<T, F>(&self, key: &str, default: T, f: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> T,
    {
        let next = f(self.get(key, default));
        self.set(key, &next);
        next
    }

    pub fn remove(&self, key: &str) {
        self.write(key, None);
    }

    /// Keys of every later write or removal, in order.
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.inner.borrow_mut().listeners.push(tx);
        rx
    }

    /// Number of writes held only in memory.
    pub fn pending_writes(&self) -> usize {
        self.inner.borrow().overlay.len()
    }

    fn write(&self, key: &str, value: Option<String>) {
        let mut inner = self.inner.borrow_mut();
        let result = match &value {
            Some(json) => inner.backend.set_item(key, json),
            None => inner.backend.remove_item(key),
        };
        match result {
            Ok(()) => {
                inner.overlay.remove(key);
            }
            Err(e) => {
                log::warn!("write of {key} not persisted: {e}");
                inner.overlay.insert(key.to_string(), value);
            }
        }
        inner
            .listeners
            .retain(|tx| tx.send(key.to_string()).is_ok());
    }
}
