use super::DBClient;
use crate::models::{Mention, Owner};

const MENTION_COLUMNS: &str = "id, user_id, owner_id, owner_type, position, created_at";

pub trait MentionExt {
    async fn get_mentions(&self, owner: Owner) -> Result<Vec<Mention>, sqlx::Error>;

    async fn create_mention(
        &self,
        owner: Owner,
        user_id: i64,
        position: i32,
    ) -> Result<Mention, sqlx::Error>;

    /// Soft-deletes the mention of `user_id` on `owner`.
    async fn delete_mention(&self, owner: Owner, user_id: i64) -> Result<(), sqlx::Error>;

    /// The subset of `user_ids` that belong to live accounts.
    async fn existing_user_ids(&self, user_ids: &[i64]) -> Result<Vec<i64>, sqlx::Error>;
}

impl MentionExt for DBClient {
    async fn get_mentions(&self, owner: Owner) -> Result<Vec<Mention>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {} FROM mentions
            WHERE owner_id = $1 AND owner_type = $2 AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
            MENTION_COLUMNS
        );
        sqlx::query_as::<_, Mention>(&query)
            .bind(owner.id)
            .bind(owner.kind)
            .fetch_all(&self.pool)
            .await
    }

    async fn create_mention(
        &self,
        owner: Owner,
        user_id: i64,
        position: i32,
    ) -> Result<Mention, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO mentions (user_id, owner_id, owner_type, position)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            MENTION_COLUMNS
        );
        sqlx::query_as::<_, Mention>(&query)
            .bind(user_id)
            .bind(owner.id)
            .bind(owner.kind)
            .bind(position)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_mention(&self, owner: Owner, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE mentions SET deleted_at = NOW()
            WHERE owner_id = $1 AND owner_type = $2 AND user_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(owner.id)
        .bind(owner.kind)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn existing_user_ids(&self, user_ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
    }
}
