//! File versioning: every content-changing write appends exactly one immutable,
//! sequentially numbered version in the same transaction as the file update.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use stashes_shared::error::StashError;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{file, file_version};

pub mod allocator;
pub mod coordinator;

pub use allocator::{
    allocate_version, create_file_version, create_file_version_in_transaction, InsertFailure,
    NewVersion, RetryPolicy, SeaVersionStore, VersionStore,
};
pub use coordinator::{create_file, revert_file, update_file};

/// Builds the [`VersionStore`] used inside a write transaction.
pub type StoreFor = for<'t> fn(&'t DatabaseTransaction) -> Box<dyn VersionStore + 't>;

fn sea_store(txn: &DatabaseTransaction) -> Box<dyn VersionStore + '_> {
    Box::new(SeaVersionStore::new(txn))
}

/// Settings and collaborators shared by every versioned write.
#[derive(Clone, Copy)]
pub struct Versioning {
    pub retry: RetryPolicy,
    /// Upper bound on one write transaction, connection wait included
    pub transaction_timeout: Duration,
    store_for: StoreFor,
}

impl Default for Versioning {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Duration::from_secs(10))
    }
}

impl fmt::Debug for Versioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Versioning")
            .field("retry", &self.retry)
            .field("transaction_timeout", &self.transaction_timeout)
            .finish_non_exhaustive()
    }
}

impl Versioning {
    pub fn new(retry: RetryPolicy, transaction_timeout: Duration) -> Self {
        Self {
            retry,
            transaction_timeout,
            store_for: sea_store,
        }
    }

    /// Swap the version store, used to inject faults.
    pub fn with_store(mut self, store_for: StoreFor) -> Self {
        self.store_for = store_for;
        self
    }

    pub(crate) fn store<'t>(&self, txn: &'t DatabaseTransaction) -> Box<dyn VersionStore + 't> {
        (self.store_for)(txn)
    }

    /// Run a transactional unit under the configured timeout. Dropping the unit
    /// drops its transaction, which rolls it back.
    pub(crate) async fn bounded<T, F>(&self, what: &str, unit: F) -> Result<T, StashError>
    where
        F: Future<Output = Result<T, StashError>>,
    {
        match tokio::time::timeout(self.transaction_timeout, unit).await {
            Ok(res) => res,
            Err(_) => {
                warn!(timeout = ?self.transaction_timeout, "{what} timed out");
                Err(StashError::Timeout(format!(
                    "{what} did not finish within {:?}",
                    self.transaction_timeout
                )))
            }
        }
    }
}

/// Result of a versioned write: the file as committed, plus the version it
/// produced when the content changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileWrite {
    pub file: file::Model,
    pub version: Option<file_version::Model>,
}

/// Version history of a file, newest first.
pub async fn list_versions<C: ConnectionTrait>(
    conn: &C,
    file_id: Uuid,
) -> Result<Vec<file_version::Model>, DbErr> {
    file_version::Entity::find()
        .filter(file_version::Column::FileId.eq(file_id))
        .order_by_desc(file_version::Column::Version)
        .all(conn)
        .await
}

pub async fn get_version<C: ConnectionTrait>(
    conn: &C,
    file_id: Uuid,
    version: i32,
) -> Result<Option<file_version::Model>, DbErr> {
    file_version::Entity::find()
        .filter(file_version::Column::FileId.eq(file_id))
        .filter(file_version::Column::Version.eq(version))
        .one(conn)
        .await
}

pub async fn latest_version<C: ConnectionTrait>(
    conn: &C,
    file_id: Uuid,
) -> Result<Option<file_version::Model>, DbErr> {
    file_version::Entity::find()
        .filter(file_version::Column::FileId.eq(file_id))
        .order_by_desc(file_version::Column::Version)
        .one(conn)
        .await
}
