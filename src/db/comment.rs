use super::DBClient;
use crate::dtos::CommentDto;
use crate::models::Comment;

const COMMENT_COLUMNS: &str = "id, post_id, user_id, parent_id, body, created_at, updated_at";

// Comment joined with its author and its like count
const COMMENT_DTO_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.user_id, c.parent_id, c.body,
           u.username AS user_username, u.avatar_url AS user_avatar_url,
           (SELECT COUNT(*) FROM likes l
             WHERE l.likeable_type = 'comments' AND l.likeable_id = c.id
               AND l.deleted_at IS NULL) AS like_count,
           c.created_at, c.updated_at
    FROM comments c
    INNER JOIN users u ON c.user_id = u.id
"#;

/// Comment database operations trait
pub trait CommentExt {
    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, sqlx::Error>;

    /// Single comment with author and like count
    async fn get_comment_dto(&self, comment_id: i64) -> Result<Option<CommentDto>, sqlx::Error>;

    /// Direct replies of a comment, oldest first
    async fn get_replies(&self, parent_id: i64) -> Result<Vec<CommentDto>, sqlx::Error>;

    /// Paginated root comments (no parent) of a post, oldest first
    async fn get_root_comments(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<CommentDto>, sqlx::Error>;

    async fn count_root_comments(&self, post_id: i64) -> Result<i64, sqlx::Error>;

    async fn create_comment(
        &self,
        user_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Comment, sqlx::Error>;

    async fn update_comment_body(
        &self,
        comment_id: i64,
        body: &str,
    ) -> Result<Comment, sqlx::Error>;

    /// Soft delete. RowNotFound if the comment is missing or already deleted.
    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error>;
}

impl CommentExt for DBClient {
    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM comments WHERE id = $1 AND deleted_at IS NULL",
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_comment_dto(&self, comment_id: i64) -> Result<Option<CommentDto>, sqlx::Error> {
        let query = format!(
            "{} WHERE c.id = $1 AND c.deleted_at IS NULL",
            COMMENT_DTO_SELECT
        );
        sqlx::query_as::<_, CommentDto>(&query)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_replies(&self, parent_id: i64) -> Result<Vec<CommentDto>, sqlx::Error> {
        // Explicit ordering keeps sibling order stable between loads
        let query = format!(
            "{} WHERE c.parent_id = $1 AND c.deleted_at IS NULL ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_DTO_SELECT
        );
        sqlx::query_as::<_, CommentDto>(&query)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_root_comments(
        &self,
        post_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<CommentDto>, sqlx::Error> {
        let offset = (page - 1).saturating_mul(per_page);

        let query = format!(
            r#"{}
            WHERE c.post_id = $1 AND c.parent_id IS NULL AND c.deleted_at IS NULL
            ORDER BY c.created_at ASC, c.id ASC
            LIMIT $2 OFFSET $3
            "#,
            COMMENT_DTO_SELECT
        );
        sqlx::query_as::<_, CommentDto>(&query)
            .bind(post_id)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn count_root_comments(&self, post_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM comments
            WHERE post_id = $1 AND parent_id IS NULL AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_comment(
        &self,
        user_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO comments (user_id, post_id, parent_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(user_id)
            .bind(post_id)
            .bind(parent_id)
            .bind(body)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_comment_body(
        &self,
        comment_id: i64,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE comments SET body = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(body)
            .bind(comment_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
