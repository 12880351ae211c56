use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FileVersion::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FileVersion::FileId).uuid().not_null())
                    .col(ColumnDef::new(FileVersion::Content).text().not_null())
                    .col(ColumnDef::new(FileVersion::Version).integer().not_null())
                    .col(ColumnDef::new(FileVersion::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(FileVersion::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_version_file")
                            .from(FileVersion::Table, FileVersion::FileId)
                            .to(File::Table, File::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The allocator relies on this to reject a duplicate version number
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-file-version-file-id-version")
                    .table(FileVersion::Table)
                    .col(FileVersion::FileId)
                    .col(FileVersion::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // "latest version of file X" lookups
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-file-version-file-id-version-desc")
                    .table(FileVersion::Table)
                    .col(FileVersion::FileId)
                    .col((FileVersion::Version, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileVersion::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum File {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum FileVersion {
    Table,
    Id,
    FileId,
    Content,
    Version,
    CreatedBy,
    CreatedAt,
}
