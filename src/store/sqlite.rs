use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{Store, StoreError};
use crate::db::models::*;
use crate::db::DbPool;

const RECORD_COLUMNS: &str = "id, user_id, username, project, platform, status, reward, \
     difficulty, description, final_reward, funding, comment_count, created_at, updated_at";

const DOG_COLUMNS: &str = "id, user_id, username, name, ca, narrative, time, \
     current_market_cap, status, reason, comment_count, last_updated, created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, record_id, record_type, username, content, created_at, updated_at";

// Enums are stored as the same strings they serialize to in JSON.
macro_rules! text_column {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                <$ty>::parse(text).ok_or_else(|| {
                    FromSqlError::Other(
                        format!("unknown {} value: {}", stringify!($ty), text).into(),
                    )
                })
            }
        }
    )*};
}

text_column!(AirdropStatus, Difficulty, TokenStatus, RecordKind);

fn record_from_row(row: &Row) -> rusqlite::Result<AirdropRecord> {
    Ok(AirdropRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        project: row.get(3)?,
        platform: row.get(4)?,
        status: row.get(5)?,
        reward: row.get(6)?,
        difficulty: row.get(7)?,
        description: row.get(8)?,
        final_reward: row.get(9)?,
        funding: row.get(10)?,
        comment_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn dog_from_row(row: &Row) -> rusqlite::Result<DogRecord> {
    Ok(DogRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        ca: row.get(4)?,
        narrative: row.get(5)?,
        time: row.get(6)?,
        current_market_cap: row.get(7)?,
        status: row.get(8)?,
        reason: row.get(9)?,
        comment_count: row.get(10)?,
        last_updated: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        record_id: row.get(1)?,
        record_type: row.get(2)?,
        username: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parent_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Airdrop => "records",
        RecordKind::Dog => "dog_records",
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Relational backend. Record and counter changes share one transaction.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Expects a pool that has already been through `db::run_migrations`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn admin_config(&self) -> Result<AdminConfig, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO admin_config (id, username, password, last_updated)
             VALUES (1, ?1, ?2, ?3)",
            params![DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD, Utc::now()],
        )?;
        let config = conn.query_row(
            "SELECT username, password, last_updated FROM admin_config WHERE id = 1",
            [],
            |row| {
                Ok(AdminConfig {
                    username: row.get(0)?,
                    password: row.get(1)?,
                    last_updated: row.get(2)?,
                })
            },
        )?;
        Ok(config)
    }

    async fn update_admin_password(
        &self,
        current: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        // Make sure the singleton exists before the compare-and-update.
        self.admin_config().await?;
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE admin_config SET password = ?1, last_updated = ?2
             WHERE id = 1 AND password = ?3",
            params![new, Utc::now(), current],
        )?;
        Ok(rows > 0)
    }

    async fn records(&self) -> Result<Vec<AirdropRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records ORDER BY created_at DESC, id DESC"
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn record(&self, id: i64) -> Result<Option<AirdropRecord>, StoreError> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn create_record(&self, new: NewAirdropRecord) -> Result<AirdropRecord, StoreError> {
        let now = Utc::now();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO records (user_id, username, project, platform, status, reward,
                difficulty, description, final_reward, funding, comment_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?11)",
            params![
                new.user_id,
                new.username,
                new.project,
                new.platform,
                new.status,
                new.reward,
                new.difficulty,
                new.description,
                new.final_reward,
                new.funding,
                now,
            ],
        )?;
        Ok(new.into_record(conn.last_insert_rowid(), now))
    }

    async fn update_record(
        &self,
        id: i64,
        patch: AirdropPatch,
    ) -> Result<Option<AirdropRecord>, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()?;
        let Some(mut record) = existing else {
            return Ok(None);
        };

        patch.apply(&mut record, Utc::now());
        tx.execute(
            "UPDATE records SET project = ?1, platform = ?2, status = ?3, reward = ?4,
                difficulty = ?5, description = ?6, final_reward = ?7, funding = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                record.project,
                record.platform,
                record.status,
                record.reward,
                record.difficulty,
                record.description,
                record.final_reward,
                record.funding,
                record.updated_at,
                id,
            ],
        )?;
        tx.commit()?;
        Ok(Some(record))
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM comments WHERE record_type = ?1 AND record_id = ?2",
            params![RecordKind::Airdrop, id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    async fn dog_records(&self) -> Result<Vec<DogRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOG_COLUMNS} FROM dog_records ORDER BY created_at DESC, id DESC"
        ))?;
        let records = stmt
            .query_map([], dog_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn dog_record(&self, id: i64) -> Result<Option<DogRecord>, StoreError> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                &format!("SELECT {DOG_COLUMNS} FROM dog_records WHERE id = ?1"),
                params![id],
                dog_from_row,
            )
            .optional()?;
        Ok(record)
    }

    async fn create_dog_record(&self, new: NewDogRecord) -> Result<DogRecord, StoreError> {
        let now = Utc::now();
        let conflict = || StoreError::Conflict(format!("contract address {} already exists", new.ca));

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM dog_records WHERE ca = ?1",
            params![new.ca],
            |row| row.get(0),
        )?;
        if taken {
            return Err(conflict());
        }

        let inserted = tx.execute(
            "INSERT INTO dog_records (user_id, username, name, ca, narrative, time,
                current_market_cap, status, reason, comment_count, last_updated, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)",
            params![
                new.user_id,
                new.username,
                new.name,
                new.ca,
                new.narrative,
                new.time,
                new.current_market_cap,
                new.status,
                new.reason,
                new.last_updated,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(conflict()),
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(new.into_record(id, now))
    }

    async fn update_dog_record(
        &self,
        id: i64,
        patch: DogPatch,
    ) -> Result<Option<DogRecord>, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!("SELECT {DOG_COLUMNS} FROM dog_records WHERE id = ?1"),
                params![id],
                dog_from_row,
            )
            .optional()?;
        let Some(mut record) = existing else {
            return Ok(None);
        };

        patch.apply(&mut record, Utc::now());
        tx.execute(
            "UPDATE dog_records SET name = ?1, narrative = ?2, current_market_cap = ?3,
                status = ?4, reason = ?5, last_updated = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                record.name,
                record.narrative,
                record.current_market_cap,
                record.status,
                record.reason,
                record.last_updated,
                record.updated_at,
                id,
            ],
        )?;
        tx.commit()?;
        Ok(Some(record))
    }

    async fn delete_dog_record(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = tx.execute("DELETE FROM dog_records WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Ok(false);
        }
        tx.execute(
            "DELETE FROM comments WHERE record_type = ?1 AND record_id = ?2",
            params![RecordKind::Dog, id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    async fn comments(&self) -> Result<Vec<Comment>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at DESC, id DESC"
        ))?;
        let comments = stmt
            .query_map([], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<Vec<Comment>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE record_id = ?1 AND record_type = ?2
             ORDER BY created_at DESC, id DESC"
        ))?;
        let comments = stmt
            .query_map(params![record_id, kind], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment, StoreError> {
        let now = Utc::now();
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bumped = tx.execute(
            &format!(
                "UPDATE {} SET comment_count = comment_count + 1, updated_at = ?1 WHERE id = ?2",
                parent_table(new.record_type)
            ),
            params![now, new.record_id],
        )?;
        if bumped == 0 {
            return Err(StoreError::NotFound(format!(
                "{} record {}",
                new.record_type.as_str(),
                new.record_id
            )));
        }

        tx.execute(
            "INSERT INTO comments (record_id, record_type, username, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![new.record_id, new.record_type, new.username, new.content, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(new.into_comment(id, now))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent: Option<(i64, RecordKind)> = tx
            .query_row(
                "SELECT record_id, record_type FROM comments WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((record_id, kind)) = parent else {
            return Ok(false);
        };

        tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        tx.execute(
            &format!(
                "UPDATE {} SET comment_count = MAX(comment_count - 1, 0), updated_at = ?1
                 WHERE id = ?2",
                parent_table(kind)
            ),
            params![Utc::now(), record_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    async fn delete_comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<u64, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM comments WHERE record_type = ?1 AND record_id = ?2",
            params![kind, record_id],
        )?;
        if removed > 0 {
            tx.execute(
                &format!(
                    "UPDATE {} SET comment_count = 0, updated_at = ?1 WHERE id = ?2",
                    parent_table(kind)
                ),
                params![Utc::now(), record_id],
            )?;
        }
        tx.commit()?;
        Ok(removed as u64)
    }
}
