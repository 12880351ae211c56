//! Transactional file writes.
//!
//! Each operation opens one transaction, reads the file inside it, applies the
//! row change and, when the content changed, allocates the next version through
//! the same transaction. Any failure rolls the whole unit back.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, QueryFilter, TransactionTrait,
};
use stashes_shared::error::StashError;
use stashes_shared::file::{FileChanges, NewFile};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{allocate_version, FileWrite, NewVersion, Versioning};
use crate::entity::{file, file_version, stash};

/// Commit on success, otherwise roll back and hand the original error back.
async fn finish<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, StashError>,
) -> Result<T, StashError> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "Rolling back file write");
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = ?rollback_err, "Failed to roll back file write");
            }
            Err(err)
        }
    }
}

/// Create a file together with its version 1.
#[instrument(level = "info", skip_all, fields(stash_id = %stash_id, author = %author))]
pub async fn create_file(
    db: &DatabaseConnection,
    versioning: &Versioning,
    stash_id: Uuid,
    new: NewFile,
    author: Uuid,
) -> Result<FileWrite, StashError> {
    new.validate()?;
    versioning
        .bounded("file creation", async {
            let txn = db.begin().await?;
            let outcome = insert_file(&txn, versioning, stash_id, new, author).await;
            finish(txn, outcome).await
        })
        .await
        .inspect(|write| info!(file_id = %write.file.id, "File created"))
}

async fn insert_file(
    txn: &DatabaseTransaction,
    versioning: &Versioning,
    stash_id: Uuid,
    new: NewFile,
    author: Uuid,
) -> Result<FileWrite, StashError> {
    if stash::Entity::find_by_id(stash_id).one(txn).await?.is_none() {
        return Err(StashError::NotFound(format!("Stash {stash_id} not found")));
    }

    let now = Utc::now();
    let file = file::ActiveModel {
        id: Set(Uuid::new_v4()),
        stash_id: Set(stash_id),
        name: Set(new.name),
        path: Set(new.path),
        content: Set(new.content.clone()),
        content_type: Set(new.content_type),
        tags: Set(new.tags),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    let store = versioning.store(txn);
    let version = allocate_version(
        store.as_ref(),
        &versioning.retry,
        &NewVersion {
            file_id: file.id,
            content: new.content,
            created_by: author,
        },
    )
    .await?;

    Ok(FileWrite {
        file,
        version: Some(version),
    })
}

/// Apply `changes` to a file. A version is appended only when the content differs
/// from what is stored; metadata-only changes never create one.
#[instrument(level = "info", skip_all, fields(file_id = %file_id, author = %author))]
pub async fn update_file(
    db: &DatabaseConnection,
    versioning: &Versioning,
    file_id: Uuid,
    changes: FileChanges,
    author: Uuid,
) -> Result<FileWrite, StashError> {
    versioning
        .bounded("file update", async {
            let txn = db.begin().await?;
            let outcome = apply_changes(&txn, versioning, file_id, changes, author, false).await;
            finish(txn, outcome).await
        })
        .await
        .inspect(log_write)
}

/// Make the content of version `target` current again by appending it as a new version.
/// History is never rewound.
#[instrument(level = "info", skip_all, fields(file_id = %file_id, target, author = %author))]
pub async fn revert_file(
    db: &DatabaseConnection,
    versioning: &Versioning,
    file_id: Uuid,
    target: i32,
    author: Uuid,
) -> Result<FileWrite, StashError> {
    versioning
        .bounded("file revert", async {
            let txn = db.begin().await?;
            let outcome = revert_in(&txn, versioning, file_id, target, author).await;
            finish(txn, outcome).await
        })
        .await
        .inspect(log_write)
}

async fn revert_in(
    txn: &DatabaseTransaction,
    versioning: &Versioning,
    file_id: Uuid,
    target: i32,
    author: Uuid,
) -> Result<FileWrite, StashError> {
    let old = file_version::Entity::find()
        .filter(file_version::Column::FileId.eq(file_id))
        .filter(file_version::Column::Version.eq(target))
        .one(txn)
        .await?
        .ok_or_else(|| {
            StashError::NotFound(format!("Version {target} of file {file_id} not found"))
        })?;

    apply_changes(
        txn,
        versioning,
        file_id,
        FileChanges::content(old.content),
        author,
        true,
    )
    .await
}

/// `always_version` appends a version even when the content is unchanged, which
/// reverts rely on.
async fn apply_changes(
    txn: &DatabaseTransaction,
    versioning: &Versioning,
    file_id: Uuid,
    changes: FileChanges,
    author: Uuid,
    always_version: bool,
) -> Result<FileWrite, StashError> {
    let current = file::Entity::find_by_id(file_id)
        .one(txn)
        .await?
        .ok_or_else(|| StashError::NotFound(format!("File {file_id} not found")))?;

    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(StashError::ValidationError(
                "file name cannot be empty".to_string(),
            ));
        }
    }

    // restored content is checked too, the file's type may have changed since
    let content_type = changes.content_type.unwrap_or(current.content_type);
    if changes.content.is_some() || changes.content_type.is_some() {
        content_type.check(changes.content.as_deref().unwrap_or(&current.content))?;
    }

    let new_content = changes
        .content
        .filter(|content| always_version || *content != current.content);

    let mut active = current.into_active_model();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(path) = changes.path {
        active.path = Set(path);
    }
    if let Some(tags) = changes.tags {
        active.tags = Set(tags);
    }
    if let Some(content) = &new_content {
        active.content = Set(content.clone());
    }
    active.content_type = Set(content_type);
    active.updated_at = Set(Utc::now());

    // zero rows updated means the file was deleted under us, which maps to NotFound
    let file = active.update(txn).await?;

    let version = match new_content {
        Some(content) => {
            let store = versioning.store(txn);
            Some(
                allocate_version(
                    store.as_ref(),
                    &versioning.retry,
                    &NewVersion {
                        file_id,
                        content,
                        created_by: author,
                    },
                )
                .await?,
            )
        }
        None => None,
    };

    Ok(FileWrite { file, version })
}

fn log_write(write: &FileWrite) {
    match &write.version {
        Some(version) => info!(version = version.version, "File write committed"),
        None => info!("File metadata updated, content unchanged"),
    }
}
