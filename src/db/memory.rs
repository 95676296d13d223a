use super::KeyValueStore;
use crate::error::PollError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PollError> {
        Ok(self.entries.lock().ok().and_then(|e| e.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PollError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PollError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        Ok(())
    }
}
