//! Key-value backends: one key per collection holding the serialized list.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use super::document::{Collection, DocumentBackend, DocumentWrite};
use super::StoreError;

/// Process-local map. Useful for development and tests.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<&'static str, String>>,
    writer_lock: Mutex<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn load(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(collection.key()).cloned())
    }

    async fn commit(&self, writes: &[DocumentWrite]) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let unchanged = writes
            .iter()
            .all(|w| entries.get(w.collection.key()) == w.expected.as_ref());
        if !unchanged {
            return Ok(false);
        }
        for write in writes {
            entries.insert(write.collection.key(), write.body.clone());
        }
        Ok(true)
    }

    async fn writer_lock<'a>(&'a self) -> Option<MutexGuard<'a, ()>> {
        Some(self.writer_lock.lock().await)
    }
}

// ARGV holds one (has_expected, expected, body) triple per key.
const COMPARE_AND_SET: &str = r#"
for i, key in ipairs(KEYS) do
    local base = (i - 1) * 3
    local current = redis.call('GET', key)
    if ARGV[base + 1] == '1' then
        if current ~= ARGV[base + 2] then
            return 0
        end
    elseif current then
        return 0
    end
end
for i, key in ipairs(KEYS) do
    redis.call('SET', key, ARGV[(i - 1) * 3 + 3])
end
return 1
"#;

/// Redis, with multi-key commits done atomically by a Lua script.
pub struct RedisBackend {
    conn: ConnectionManager,
    prefix: String,
    compare_and_set: Script,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::with_connection(conn, ""))
    }

    /// Keys become `<prefix><collection key>`, letting several deployments
    /// share one Redis database.
    pub fn with_connection(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            compare_and_set: Script::new(COMPARE_AND_SET),
        }
    }

    fn key(&self, collection: Collection) -> String {
        format!("{}{}", self.prefix, collection.key())
    }
}

#[async_trait]
impl DocumentBackend for RedisBackend {
    async fn load(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let body: Option<String> = redis::cmd("GET")
            .arg(self.key(collection))
            .query_async(&mut conn)
            .await?;
        Ok(body)
    }

    async fn commit(&self, writes: &[DocumentWrite]) -> Result<bool, StoreError> {
        let mut invocation = self.compare_and_set.prepare_invoke();
        for write in writes {
            invocation
                .key(self.key(write.collection))
                .arg(if write.expected.is_some() { "1" } else { "0" })
                .arg(write.expected.as_deref().unwrap_or(""))
                .arg(&write.body);
        }
        let mut conn = self.conn.clone();
        let applied: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(applied == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_commit_is_all_or_nothing() {
        let backend = MemoryBackend::new();
        assert!(backend
            .commit(&[DocumentWrite {
                collection: Collection::Records,
                expected: None,
                body: "[1]".into(),
            }])
            .await
            .unwrap());

        let applied = backend
            .commit(&[
                DocumentWrite {
                    collection: Collection::Comments,
                    expected: None,
                    body: "[]".into(),
                },
                DocumentWrite {
                    collection: Collection::Records,
                    expected: None,
                    body: "[2]".into(),
                },
            ])
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(backend.load(Collection::Comments).await.unwrap(), None);
        assert_eq!(
            backend.load(Collection::Records).await.unwrap().as_deref(),
            Some("[1]")
        );
    }
}
