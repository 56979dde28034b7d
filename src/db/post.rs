use super::DBClient;
use crate::models::{Post, Visibility};
use chrono::{DateTime, Utc};

const POST_COLUMNS: &str = "id, user_id, title, body, visibility, is_promoted, promotion_expiry, \
     is_featured, featured_expiry, like_count, comment_count, view_count, share_count, \
     created_at, updated_at";

/// Fields of a new post, minus its associations.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub settings: PostSettings,
}

/// Visibility and promotion flags, editable together.
#[derive(Debug, Clone, Default)]
pub struct PostSettings {
    pub visibility: Visibility,
    pub is_promoted: bool,
    pub promotion_expiry: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_expiry: Option<DateTime<Utc>>,
}

pub trait PostExt {
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error>;

    async fn create_post(&self, user_id: i64, post: &NewPost) -> Result<Post, sqlx::Error>;

    async fn update_post_title(&self, post_id: i64, title: &str) -> Result<Post, sqlx::Error>;

    async fn update_post_body(&self, post_id: i64, body: &str) -> Result<Post, sqlx::Error>;

    async fn update_post_settings(
        &self,
        post_id: i64,
        settings: &PostSettings,
    ) -> Result<Post, sqlx::Error>;

    /// Soft delete. RowNotFound if the post is missing or already deleted.
    async fn delete_post(&self, post_id: i64) -> Result<(), sqlx::Error>;

    async fn adjust_like_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error>;

    async fn adjust_comment_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error>;

    async fn increment_view_count(&self, post_id: i64) -> Result<(), sqlx::Error>;
}

impl PostExt for DBClient {
    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM posts WHERE id = $1 AND deleted_at IS NULL",
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_post(&self, user_id: i64, post: &NewPost) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO posts (user_id, title, body, visibility, is_promoted, promotion_expiry,
                               is_featured, featured_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(user_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.settings.visibility)
            .bind(post.settings.is_promoted)
            .bind(post.settings.promotion_expiry)
            .bind(post.settings.is_featured)
            .bind(post.settings.featured_expiry)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_post_title(&self, post_id: i64, title: &str) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE posts SET title = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(title)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_post_body(&self, post_id: i64, body: &str) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE posts SET body = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(body)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_post_settings(
        &self,
        post_id: i64,
        settings: &PostSettings,
    ) -> Result<Post, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE posts
            SET visibility = $1, is_promoted = $2, promotion_expiry = $3,
                is_featured = $4, featured_expiry = $5, updated_at = NOW()
            WHERE id = $6 AND deleted_at IS NULL
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(settings.visibility)
            .bind(settings.is_promoted)
            .bind(settings.promotion_expiry)
            .bind(settings.is_featured)
            .bind(settings.featured_expiry)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn adjust_like_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE posts SET like_count = GREATEST(like_count + $1, 0) WHERE id = $2")
            .bind(delta)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn adjust_comment_count(&self, post_id: i64, delta: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE posts SET comment_count = GREATEST(comment_count + $1, 0) WHERE id = $2",
        )
        .bind(delta)
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_view_count(&self, post_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
