use super::DBClient;
use crate::models::{Like, Owner};

const LIKE_COLUMNS: &str = "id, user_id, likeable_id, likeable_type, created_at";

pub trait LikeExt {
    /// Whether the liked record exists (and is not soft-deleted)
    async fn likeable_exists(&self, target: Owner) -> Result<bool, sqlx::Error>;

    async fn get_like(&self, like_id: i64) -> Result<Option<Like>, sqlx::Error>;

    async fn find_like(&self, user_id: i64, target: Owner) -> Result<Option<Like>, sqlx::Error>;

    async fn create_like(&self, user_id: i64, target: Owner) -> Result<Like, sqlx::Error>;

    /// Hard delete; a like carries no history worth keeping.
    async fn delete_like(&self, like_id: i64) -> Result<(), sqlx::Error>;
}

impl LikeExt for DBClient {
    async fn likeable_exists(&self, target: Owner) -> Result<bool, sqlx::Error> {
        // Table name comes from the enum, never from the request
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND deleted_at IS NULL)",
            target.kind.table_name()
        );
        sqlx::query_scalar::<_, bool>(&query)
            .bind(target.id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_like(&self, like_id: i64) -> Result<Option<Like>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM likes WHERE id = $1 AND deleted_at IS NULL",
            LIKE_COLUMNS
        );
        sqlx::query_as::<_, Like>(&query)
            .bind(like_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_like(&self, user_id: i64, target: Owner) -> Result<Option<Like>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {} FROM likes
            WHERE user_id = $1 AND likeable_id = $2 AND likeable_type = $3 AND deleted_at IS NULL
            ORDER BY id ASC
            LIMIT 1
            "#,
            LIKE_COLUMNS
        );
        sqlx::query_as::<_, Like>(&query)
            .bind(user_id)
            .bind(target.id)
            .bind(target.kind)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_like(&self, user_id: i64, target: Owner) -> Result<Like, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO likes (user_id, likeable_id, likeable_type)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            LIKE_COLUMNS
        );
        sqlx::query_as::<_, Like>(&query)
            .bind(user_id)
            .bind(target.id)
            .bind(target.kind)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_like(&self, like_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(like_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
