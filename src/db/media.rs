use super::DBClient;
use crate::models::{Media, Owner};
use crate::storage::StoredFile;

const MEDIA_COLUMNS: &str =
    "id, url, media_type, filename, size, user_id, owner_id, owner_type, created_at";

pub trait MediaExt {
    async fn get_media(&self, media_id: i64) -> Result<Option<Media>, sqlx::Error>;

    async fn get_owned_media(&self, owner: Owner) -> Result<Vec<Media>, sqlx::Error>;

    /// Record a file uploaded by `user_id`, unattached when `owner` is None.
    async fn create_media(
        &self,
        file: &StoredFile,
        user_id: i64,
        owner: Option<Owner>,
    ) -> Result<Media, sqlx::Error>;

    /// Point an unattached media row uploaded by `user_id` at `owner`.
    /// RowNotFound if no such row exists.
    async fn attach_media(
        &self,
        media_id: i64,
        user_id: i64,
        owner: Owner,
    ) -> Result<Media, sqlx::Error>;

    /// Soft-deletes `media_id` if it belongs to `owner`.
    async fn delete_media(&self, owner: Owner, media_id: i64) -> Result<(), sqlx::Error>;
}

impl MediaExt for DBClient {
    async fn get_media(&self, media_id: i64) -> Result<Option<Media>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM medias WHERE id = $1 AND deleted_at IS NULL",
            MEDIA_COLUMNS
        );
        sqlx::query_as::<_, Media>(&query)
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_owned_media(&self, owner: Owner) -> Result<Vec<Media>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {} FROM medias
            WHERE owner_id = $1 AND owner_type = $2 AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
            MEDIA_COLUMNS
        );
        sqlx::query_as::<_, Media>(&query)
            .bind(owner.id)
            .bind(owner.kind)
            .fetch_all(&self.pool)
            .await
    }

    async fn create_media(
        &self,
        file: &StoredFile,
        user_id: i64,
        owner: Option<Owner>,
    ) -> Result<Media, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO medias (url, media_type, filename, size, user_id, owner_id, owner_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        );
        sqlx::query_as::<_, Media>(&query)
            .bind(&file.url)
            .bind(&file.media_type)
            .bind(&file.filename)
            .bind(file.size)
            .bind(user_id)
            .bind(owner.map(|o| o.id))
            .bind(owner.map(|o| o.kind))
            .fetch_one(&self.pool)
            .await
    }

    async fn attach_media(
        &self,
        media_id: i64,
        user_id: i64,
        owner: Owner,
    ) -> Result<Media, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE medias SET owner_id = $1, owner_type = $2, updated_at = NOW()
            WHERE id = $3 AND user_id = $4 AND owner_id IS NULL AND deleted_at IS NULL
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        );
        // fetch_one turns a missing row into RowNotFound
        sqlx::query_as::<_, Media>(&query)
            .bind(owner.id)
            .bind(owner.kind)
            .bind(media_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_media(&self, owner: Owner, media_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE medias SET deleted_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND owner_type = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(media_id)
        .bind(owner.id)
        .bind(owner.kind)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
