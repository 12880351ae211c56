//! Version number allocation.
//!
//! The next number for a file is `max(version) + 1`. Two writers can compute the
//! same number; the unique index on `(file_id, version)` rejects the loser, which
//! re-reads the maximum and tries again after a short back-off. No locks are taken.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use stashes_shared::error::StashError;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::entity::file_version;

/// How a failed version insert should be treated by the retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertFailure {
    /// Another writer already holds this `(file_id, version)` pair
    UniqueViolation,
    Other,
}

/// Classify a store error using sea-orm's backend-neutral view of SQL errors.
pub fn classify_db_err(err: &DbErr) -> InsertFailure {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => InsertFailure::UniqueViolation,
        _ => InsertFailure::Other,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total insert attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Back-off slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Clone, Debug)]
pub struct NewVersion {
    pub file_id: Uuid,
    pub content: String,
    pub created_by: Uuid,
}

/// The slice of the relational store the allocator needs.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Highest version number recorded for the file, 0 when it has none.
    async fn latest_version(&self, file_id: Uuid) -> Result<i32, DbErr>;

    /// Insert one version row. A rejected insert must leave no trace.
    async fn insert_version(
        &self,
        version: file_version::ActiveModel,
    ) -> Result<file_version::Model, DbErr>;

    fn classify(&self, err: &DbErr) -> InsertFailure {
        classify_db_err(err)
    }
}

/// [`VersionStore`] backed by an open sea-orm transaction.
pub struct SeaVersionStore<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> SeaVersionStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }
}

#[async_trait]
impl VersionStore for SeaVersionStore<'_> {
    async fn latest_version(&self, file_id: Uuid) -> Result<i32, DbErr> {
        let latest = file_version::Entity::find()
            .select_only()
            .column(file_version::Column::Version)
            .filter(file_version::Column::FileId.eq(file_id))
            .order_by_desc(file_version::Column::Version)
            .limit(1)
            .into_tuple::<i32>()
            .one(self.txn)
            .await?;
        Ok(latest.unwrap_or(0))
    }

    async fn insert_version(
        &self,
        version: file_version::ActiveModel,
    ) -> Result<file_version::Model, DbErr> {
        // Each attempt runs in a savepoint: Postgres refuses further statements in a
        // transaction after any failed one, so a rejected insert is rolled back alone.
        let savepoint = self.txn.begin().await?;
        match version.insert(&savepoint).await {
            Ok(model) => {
                savepoint.commit().await?;
                Ok(model)
            }
            Err(err) => {
                if let Err(rollback_err) = savepoint.rollback().await {
                    warn!(error = ?rollback_err, "Failed to roll back version savepoint");
                }
                Err(err)
            }
        }
    }
}

/// Insert the next version of a file, retrying when a concurrent writer takes the number first.
#[instrument(level = "debug", skip_all, fields(file_id = %new.file_id))]
pub async fn allocate_version<S>(
    store: &S,
    policy: &RetryPolicy,
    new: &NewVersion,
) -> Result<file_version::Model, StashError>
where
    S: VersionStore + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let next = store.latest_version(new.file_id).await? + 1;
        let row = file_version::ActiveModel {
            id: Set(Uuid::new_v4()),
            file_id: Set(new.file_id),
            content: Set(new.content.clone()),
            version: Set(next),
            created_by: Set(new.created_by),
            created_at: Set(Utc::now()),
        };

        match store.insert_version(row).await {
            Ok(created) => {
                debug!(version = created.version, attempt, "Allocated file version");
                return Ok(created);
            }
            Err(err) if store.classify(&err) == InsertFailure::UniqueViolation => {
                warn!(version = next, attempt, "Version number taken by a concurrent writer");
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    error!(attempts, "Gave up allocating a file version");
    Err(StashError::Conflict(format!(
        "could not allocate a version for file {} after {attempts} attempts, please retry",
        new.file_id
    )))
}

/// Allocate a version in a transaction of its own.
pub async fn create_file_version(
    db: &DatabaseConnection,
    policy: &RetryPolicy,
    new: &NewVersion,
) -> Result<file_version::Model, StashError> {
    let txn = db.begin().await?;
    match create_file_version_in_transaction(&txn, policy, new).await {
        Ok(version) => {
            txn.commit().await?;
            Ok(version)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = ?rollback_err, "Failed to roll back version transaction");
            }
            Err(err)
        }
    }
}

/// Allocate a version as part of the caller's transaction; nothing is committed here.
pub async fn create_file_version_in_transaction(
    txn: &DatabaseTransaction,
    policy: &RetryPolicy,
    new: &NewVersion,
) -> Result<file_version::Model, StashError> {
    allocate_version(&SeaVersionStore::new(txn), policy, new).await
}
