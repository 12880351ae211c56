use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create stash table
        manager
            .create_table(
                Table::create()
                    .table(Stash::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Stash::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Stash::UserId).uuid().not_null())
                    .col(ColumnDef::new(Stash::Name).string().not_null())
                    .col(ColumnDef::new(Stash::Description).string())
                    .col(
                        ColumnDef::new(Stash::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Stash::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-stash-user-id")
                    .table(Stash::Table)
                    .col(Stash::UserId)
                    .to_owned(),
            )
            .await?;

        // Create file table
        manager
            .create_table(
                Table::create()
                    .table(File::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(File::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(File::StashId).uuid().not_null())
                    .col(ColumnDef::new(File::Name).string().not_null())
                    .col(ColumnDef::new(File::Path).string().not_null())
                    .col(ColumnDef::new(File::Content).text().not_null())
                    .col(ColumnDef::new(File::ContentType).string().not_null())
                    .col(ColumnDef::new(File::Tags).json().not_null())
                    .col(
                        ColumnDef::new(File::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(File::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_stash")
                            .from(File::Table, File::StashId)
                            .to(Stash::Table, Stash::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-file-stash-id")
                    .table(File::Table)
                    .col(File::StashId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(File::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stash::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Stash {
    Table,
    Id,
    UserId,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum File {
    Table,
    Id,
    StashId,
    Name,
    Path,
    Content,
    ContentType,
    Tags,
    CreatedAt,
    UpdatedAt,
}
