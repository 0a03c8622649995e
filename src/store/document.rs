// Document-style storage: each collection is one JSON list under one name.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::MutexGuard;

use super::{adjust_count, Store, StoreError};
use crate::db::models::*;

const MAX_ATTEMPTS: u32 = 16;
const RETRY_BASE_MS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    AdminConfig,
    Records,
    DogRecords,
    Comments,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::AdminConfig,
        Collection::Records,
        Collection::DogRecords,
        Collection::Comments,
    ];

    /// Key under which the collection lives (file stem or KV key).
    pub fn key(self) -> &'static str {
        match self {
            Collection::AdminConfig => "admin-config",
            Collection::Records => "records",
            Collection::DogRecords => "dog-records",
            Collection::Comments => "comments",
        }
    }

    fn parent_of(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Airdrop => Collection::Records,
            RecordKind::Dog => Collection::DogRecords,
        }
    }
}

/// One document replacement inside an atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub collection: Collection,
    /// Body the caller read; `None` if the document did not exist.
    pub expected: Option<String>,
    pub body: String,
}

/// Raw document storage with multi-document compare-and-swap.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn load(&self, collection: Collection) -> Result<Option<String>, StoreError>;

    /// Applies every write if each document still holds its `expected` body.
    /// Returns `false` and writes nothing if any of them changed.
    async fn commit(&self, writes: &[DocumentWrite]) -> Result<bool, StoreError>;

    /// Lock held across a whole read-modify-write, for backends whose writers
    /// all live in this process. `None` leaves conflicts to compare-and-swap.
    async fn writer_lock<'a>(&'a self) -> Option<MutexGuard<'a, ()>> {
        None
    }
}

/// Collections read at the start of a transaction, plus what was touched.
#[derive(Default)]
struct Snapshot {
    admin: Option<AdminConfig>,
    records: Vec<AirdropRecord>,
    dog_records: Vec<DogRecord>,
    comments: Vec<Comment>,
    raw: BTreeMap<Collection, Option<String>>,
    dirty: BTreeSet<Collection>,
}

impl Snapshot {
    fn mark(&mut self, collection: Collection) {
        debug_assert!(
            self.raw.contains_key(&collection),
            "{collection:?} was not loaded into this transaction"
        );
        self.dirty.insert(collection);
    }

    fn admin(&mut self, now: DateTime<Utc>) -> &AdminConfig {
        if self.admin.is_none() {
            self.mark(Collection::AdminConfig);
        }
        self.admin.get_or_insert_with(|| AdminConfig::default_at(now))
    }

    fn admin_mut(&mut self, now: DateTime<Utc>) -> &mut AdminConfig {
        self.mark(Collection::AdminConfig);
        self.admin.get_or_insert_with(|| AdminConfig::default_at(now))
    }

    fn records_mut(&mut self) -> &mut Vec<AirdropRecord> {
        self.mark(Collection::Records);
        &mut self.records
    }

    fn dog_records_mut(&mut self) -> &mut Vec<DogRecord> {
        self.mark(Collection::DogRecords);
        &mut self.dog_records
    }

    fn comments_mut(&mut self) -> &mut Vec<Comment> {
        self.mark(Collection::Comments);
        &mut self.comments
    }

    /// Rewrites a parent's comment counter. Returns false if the parent is gone.
    fn update_parent_count(
        &mut self,
        kind: RecordKind,
        record_id: i64,
        now: DateTime<Utc>,
        f: impl FnOnce(i64) -> i64,
    ) -> bool {
        match kind {
            RecordKind::Airdrop => {
                let Some(index) = self.records.iter().position(|r| r.id == record_id) else {
                    return false;
                };
                let record = &mut self.records_mut()[index];
                record.comment_count = f(record.comment_count);
                record.updated_at = now;
            }
            RecordKind::Dog => {
                let Some(index) = self.dog_records.iter().position(|r| r.id == record_id) else {
                    return false;
                };
                let record = &mut self.dog_records_mut()[index];
                record.comment_count = f(record.comment_count);
                record.updated_at = now;
            }
        }
        true
    }

    fn parent_exists(&self, kind: RecordKind, record_id: i64) -> bool {
        match kind {
            RecordKind::Airdrop => self.records.iter().any(|r| r.id == record_id),
            RecordKind::Dog => self.dog_records.iter().any(|r| r.id == record_id),
        }
    }

    fn pending_writes(&self) -> Result<Vec<DocumentWrite>, StoreError> {
        let mut writes = Vec::with_capacity(self.dirty.len());
        for &collection in &self.dirty {
            let body = match collection {
                Collection::AdminConfig => match &self.admin {
                    Some(admin) => serde_json::to_string_pretty(admin)?,
                    None => continue,
                },
                Collection::Records => serde_json::to_string_pretty(&self.records)?,
                Collection::DogRecords => serde_json::to_string_pretty(&self.dog_records)?,
                Collection::Comments => serde_json::to_string_pretty(&self.comments)?,
            };
            writes.push(DocumentWrite {
                collection,
                expected: self.raw.get(&collection).cloned().flatten(),
                body,
            });
        }
        Ok(writes)
    }
}

/// [`Store`] over any [`DocumentBackend`]. Every mutation is a
/// read-modify-write that retries when another writer got there first.
pub struct DocumentStore<B> {
    backend: B,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn read<T: DeserializeOwned + Default>(
        &self,
        collection: Collection,
    ) -> Result<T, StoreError> {
        match self.backend.load(collection).await? {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(T::default()),
        }
    }

    async fn snapshot(&self, collections: &[Collection]) -> Result<Snapshot, StoreError> {
        let mut snapshot = Snapshot::default();
        for &collection in collections {
            let raw = self.backend.load(collection).await?;
            if let Some(body) = raw.as_deref() {
                match collection {
                    Collection::AdminConfig => snapshot.admin = Some(serde_json::from_str(body)?),
                    Collection::Records => snapshot.records = serde_json::from_str(body)?,
                    Collection::DogRecords => snapshot.dog_records = serde_json::from_str(body)?,
                    Collection::Comments => snapshot.comments = serde_json::from_str(body)?,
                }
            }
            snapshot.raw.insert(collection, raw);
        }
        Ok(snapshot)
    }

    async fn transact<R, F>(&self, collections: &[Collection], mut apply: F) -> Result<R, StoreError>
    where
        R: Send,
        F: FnMut(&mut Snapshot) -> Result<R, StoreError> + Send,
    {
        let _writer = self.backend.writer_lock().await;
        for attempt in 1..=MAX_ATTEMPTS {
            let mut snapshot = self.snapshot(collections).await?;
            let outcome = apply(&mut snapshot)?;
            let writes = snapshot.pending_writes()?;
            if writes.is_empty() || self.backend.commit(&writes).await? {
                return Ok(outcome);
            }
            tracing::warn!(attempt, ?collections, "Concurrent write detected, retrying");
            tokio::time::sleep(retry_delay(attempt)).await;
        }
        let names: Vec<&str> = collections.iter().map(|c| c.key()).collect();
        Err(StoreError::Contention(names.join(", ")))
    }
}

/// Jittered, growing pause so racing writers spread out.
fn retry_delay(attempt: u32) -> Duration {
    let ceiling = RETRY_BASE_MS << attempt.min(6);
    Duration::from_millis(rand::thread_rng().gen_range(1..=ceiling))
}

#[async_trait]
impl<B: DocumentBackend> Store for DocumentStore<B> {
    async fn admin_config(&self) -> Result<AdminConfig, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::AdminConfig], |s| Ok(s.admin(now).clone()))
            .await
    }

    async fn update_admin_password(
        &self,
        current: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::AdminConfig], |s| {
            if s.admin(now).password != current {
                return Ok(false);
            }
            let admin = s.admin_mut(now);
            admin.password = new.to_string();
            admin.last_updated = now;
            Ok(true)
        })
        .await
    }

    async fn records(&self) -> Result<Vec<AirdropRecord>, StoreError> {
        let mut records: Vec<AirdropRecord> = self.read(Collection::Records).await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn record(&self, id: i64) -> Result<Option<AirdropRecord>, StoreError> {
        let records: Vec<AirdropRecord> = self.read(Collection::Records).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn create_record(&self, new: NewAirdropRecord) -> Result<AirdropRecord, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::Records], |s| {
            let record = new.clone().into_record(next_id(&s.records), now);
            s.records_mut().push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn update_record(
        &self,
        id: i64,
        patch: AirdropPatch,
    ) -> Result<Option<AirdropRecord>, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::Records], |s| {
            let Some(index) = s.records.iter().position(|r| r.id == id) else {
                return Ok(None);
            };
            let record = &mut s.records_mut()[index];
            patch.clone().apply(record, now);
            Ok(Some(record.clone()))
        })
        .await
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StoreError> {
        self.transact(&[Collection::Records, Collection::Comments], |s| {
            let Some(index) = s.records.iter().position(|r| r.id == id) else {
                return Ok(false);
            };
            s.records_mut().remove(index);
            remove_comments_of(s, RecordKind::Airdrop, id);
            Ok(true)
        })
        .await
    }

    async fn dog_records(&self) -> Result<Vec<DogRecord>, StoreError> {
        let mut records: Vec<DogRecord> = self.read(Collection::DogRecords).await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn dog_record(&self, id: i64) -> Result<Option<DogRecord>, StoreError> {
        let records: Vec<DogRecord> = self.read(Collection::DogRecords).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn create_dog_record(&self, new: NewDogRecord) -> Result<DogRecord, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::DogRecords], |s| {
            if s.dog_records.iter().any(|r| r.ca == new.ca) {
                return Err(StoreError::Conflict(format!(
                    "contract address {} already exists",
                    new.ca
                )));
            }
            let record = new.clone().into_record(next_id(&s.dog_records), now);
            s.dog_records_mut().push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn update_dog_record(
        &self,
        id: i64,
        patch: DogPatch,
    ) -> Result<Option<DogRecord>, StoreError> {
        let now = Utc::now();
        self.transact(&[Collection::DogRecords], |s| {
            let Some(index) = s.dog_records.iter().position(|r| r.id == id) else {
                return Ok(None);
            };
            let record = &mut s.dog_records_mut()[index];
            patch.clone().apply(record, now);
            Ok(Some(record.clone()))
        })
        .await
    }

    async fn delete_dog_record(&self, id: i64) -> Result<bool, StoreError> {
        self.transact(&[Collection::DogRecords, Collection::Comments], |s| {
            let Some(index) = s.dog_records.iter().position(|r| r.id == id) else {
                return Ok(false);
            };
            s.dog_records_mut().remove(index);
            remove_comments_of(s, RecordKind::Dog, id);
            Ok(true)
        })
        .await
    }

    async fn comments(&self) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self.read(Collection::Comments).await?;
        sort_newest_first(&mut comments);
        Ok(comments)
    }

    async fn comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self.read(Collection::Comments).await?;
        comments.retain(|c| c.record_id == record_id && c.record_type == kind);
        sort_newest_first(&mut comments);
        Ok(comments)
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment, StoreError> {
        let now = Utc::now();
        let parent = Collection::parent_of(new.record_type);
        self.transact(&[parent, Collection::Comments], |s| {
            if !s.update_parent_count(new.record_type, new.record_id, now, |n| {
                adjust_count(n, 1)
            }) {
                return Err(StoreError::NotFound(format!(
                    "{} record {}",
                    new.record_type.as_str(),
                    new.record_id
                )));
            }
            let comment = new.clone().into_comment(next_id(&s.comments), now);
            s.comments_mut().push(comment.clone());
            Ok(comment)
        })
        .await
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError> {
        let now = Utc::now();
        let collections = [
            Collection::Records,
            Collection::DogRecords,
            Collection::Comments,
        ];
        self.transact(&collections, |s| {
            let Some(index) = s.comments.iter().position(|c| c.id == id) else {
                return Ok(false);
            };
            let comment = s.comments_mut().remove(index);
            s.update_parent_count(comment.record_type, comment.record_id, now, |n| {
                adjust_count(n, -1)
            });
            Ok(true)
        })
        .await
    }

    async fn delete_comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let parent = Collection::parent_of(kind);
        self.transact(&[parent, Collection::Comments], |s| {
            let removed = remove_comments_of(s, kind, record_id);
            if removed > 0 && s.parent_exists(kind, record_id) {
                s.update_parent_count(kind, record_id, now, |_| 0);
            }
            Ok(removed)
        })
        .await
    }
}

fn remove_comments_of(s: &mut Snapshot, kind: RecordKind, record_id: i64) -> u64 {
    let belongs = |c: &Comment| c.record_id == record_id && c.record_type == kind;
    let removed = s.comments.iter().filter(|c| belongs(c)).count();
    if removed > 0 {
        s.comments_mut().retain(|c| !belongs(c));
    }
    removed as u64
}
